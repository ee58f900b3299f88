//! Resolution planning.
//!
//! [`ResolutionPlan`] orders the atoms of a query; [`ResolutionQueryPlan`]
//! turns that order into the sequence of sub-queries a cumulative state
//! resolves one after another.

mod atom_plan;
mod query_plan;

pub use atom_plan::ResolutionPlan;
pub use query_plan::ResolutionQueryPlan;

use crate::config::ReasonerConfig;
use crate::error::PlanError;
use crate::graph::Graph;
use crate::query::Query;
use crate::rule::{is_rule_resolvable, RuleRepository};

/// Both levels of the plan for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub atoms: ResolutionPlan,
    pub queries: ResolutionQueryPlan,
}

/// Plan `query` against `graph`'s join order oracle. Atoms count as rule
/// resolvable only when inference is enabled.
pub fn plan_query<G, R>(
    query: &Query,
    graph: &G,
    rules: &R,
    config: &ReasonerConfig,
) -> Result<Plan, PlanError>
where
    G: Graph + ?Sized,
    R: RuleRepository + ?Sized,
{
    let resolvable = |atom: &crate::atom::Atom| config.infer && is_rule_resolvable(atom, rules, graph);
    let atoms = ResolutionPlan::new(query, graph, resolvable, config.validate_plans)?;
    let queries = ResolutionQueryPlan::new(query, &atoms, resolvable);
    Ok(Plan { atoms, queries })
}

#[cfg(test)]
mod tests;
