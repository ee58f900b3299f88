//! The graph layer the resolver runs against.
//!
//! The resolver never reads storage directly. It asks a [`Graph`] to match
//! conjunctions of atoms, to persist derived facts, and (through
//! [`JoinOrderOracle`]) for a cost-based atom order. [`MemoryGraph`] is a
//! complete in-memory implementation.

mod memory;

pub use memory::MemoryGraph;

use crate::answer::Answer;
use crate::atom::Atom;
use crate::concept::ConceptId;
use crate::error::GraphError;
use crate::query::Query;
use crate::symbol::Label;

/// Stream of base answers. Streams own their data so states can hold them
/// across resolution steps.
pub type AnswerStream = Box<dyn Iterator<Item = Result<Answer, GraphError>> + Send>;

/// Schema questions asked during unification and answer expansion.
pub trait Schema {
    /// Whether `sub` is `sup` or one of its (transitive) subtypes.
    /// Labels unknown to the schema are only subtypes of themselves.
    fn is_subtype(&self, sub: Label, sup: Label) -> bool;

    /// The concept representing a type or role label.
    fn schema_concept(&self, label: Label) -> Option<ConceptId>;

    /// A role concept followed by all its super-roles.
    fn role_hierarchy(&self, role: ConceptId) -> Vec<ConceptId>;
}

/// Cost-based ordering of a conjunction.
pub trait JoinOrderOracle {
    /// Order the selectable atoms of `conjunction`. `Id` predicates, including
    /// placeholder ones, mark variables as bound.
    fn estimate_join_order(&self, conjunction: &[Atom]) -> Vec<Atom>;
}

/// Pattern matching and fact persistence.
pub trait Graph: Schema + JoinOrderOracle + Send + Sync {
    /// All answers to `query` over stored facts, with no inference.
    fn match_conjunction(&self, query: &Query) -> AnswerStream;

    /// Persist the ground fact `atom` under `answer`. Idempotent: an existing
    /// identical fact is reused. Returns `answer` extended with the bindings
    /// of the stored fact (e.g. the relation variable).
    fn materialize(&self, atom: &Atom, answer: &Answer) -> Result<Answer, GraphError>;
}

#[cfg(test)]
mod tests;
