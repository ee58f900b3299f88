pub mod answer;
pub mod atom;
pub mod cache;
pub mod concept;
pub mod config;
pub mod error;
pub mod graph;
pub mod key;
pub mod metrics;
pub mod planner;
pub mod query;
pub mod resolver;
pub mod rule;
pub mod state;
pub mod symbol;
pub mod trace;
pub mod unifier;

#[cfg(test)]
pub(crate) mod test_utils;

pub use answer::{Answer, Explanation};
pub use atom::{Atom, Role, RolePlayer, Var};
pub use cache::QueryCache;
pub use concept::{Comparator, ConceptId, Value};
pub use config::ReasonerConfig;
pub use error::{GraphError, PlanError, ResolveError, ResolveResult};
pub use graph::{Graph, JoinOrderOracle, MemoryGraph, Schema};
pub use planner::{Plan, ResolutionPlan, ResolutionQueryPlan};
pub use query::{AtomicQuery, Query};
pub use resolver::{ResolutionIterator, Session};
pub use rule::{InferenceRule, MaterialisationPolicy, RuleFlagPolicy, RuleId, RuleRepository, RuleStore};
pub use symbol::SymbolStore;
