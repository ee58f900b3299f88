//! Concept handles and attribute values.
//!
//! The graph layer owns concepts; the resolver only ever stores their ids.

use std::fmt;

/// Stable identifier of a graph concept (entity, relation, attribute, type or role).
/// Concepts are compared by id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConceptId(u64);

impl ConceptId {
    /// Reserved id the planner uses to mark a variable as bound without
    /// knowing its concept.
    pub const PLACEHOLDER: ConceptId = ConceptId(u64::MAX);

    pub fn new(raw: u64) -> Self {
        ConceptId(raw)
    }

    /// Get the raw u64 value.
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_placeholder(self) -> bool {
        self == Self::PLACEHOLDER
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_placeholder() {
            write!(f, "#placeholder")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Attribute value carried by attribute concepts and value predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Long(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Comparison operator of a value predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

impl Comparator {
    /// Evaluate `left <cmp> right`. Values of different kinds never compare,
    /// except that `Neq` holds between them.
    pub fn test(self, left: &Value, right: &Value) -> bool {
        use std::cmp::Ordering;
        let ordering = match (left, right) {
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        };
        match self {
            Comparator::Eq => ordering == Some(Ordering::Equal),
            Comparator::Neq => ordering != Some(Ordering::Equal),
            Comparator::Gt => ordering == Some(Ordering::Greater),
            Comparator::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            Comparator::Lt => ordering == Some(Ordering::Less),
            Comparator::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Comparator::Contains => match (left, right) {
                (Value::Str(a), Value::Str(b)) => a.contains(b.as_str()),
                _ => false,
            },
        }
    }

    /// Whether the predicate pins its variable to a single value.
    pub fn is_equality(self) -> bool {
        matches!(self, Comparator::Eq)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparator::Eq => "==",
            Comparator::Neq => "!==",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Contains => "contains",
        };
        f.write_str(s)
    }
}
