//! Error types.
//!
//! Branch-local failures (a unification conflict, a pruned cycle) are not
//! errors: the state tree simply produces no answer for that branch. Only
//! failures that invalidate the whole resolution surface here.

use crate::rule::RuleId;
use thiserror::Error;

/// Failure reported by the graph layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown concept {0}")]
    UnknownConcept(u64),

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("cannot materialise non-ground fact: variable {0} is unbound")]
    NonGround(String),

    #[error("cannot materialise {0} atoms")]
    NotMaterialisable(&'static str),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// A query or plan the resolver cannot work with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("selected variable {0} does not occur in the query")]
    VariableNotInQuery(String),

    #[error("query has no selectable atoms")]
    EmptyQuery,

    #[error("plan covers {planned} of {expected} atoms")]
    Incomplete { planned: usize, expected: usize },

    #[error("inequality over {0}, which no atom binds")]
    UnboundNeq(String),

    #[error("rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// Error surfaced by planning or by the answer iterator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),

    #[error("graph match failed: {0}")]
    Graph(#[from] GraphError),

    #[error("materialising the head of rule {rule} failed: {source}")]
    Materialisation {
        rule: RuleId,
        #[source]
        source: GraphError,
    },

    #[error("query cache is inconsistent: {detail}")]
    CacheCorruption { detail: String },
}

pub type ResolveResult<T> = Result<T, ResolveError>;
