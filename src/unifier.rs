//! Unifiers - variable renamings between atoms.
//!
//! A unifier translates an answer computed in the variable space of one atom
//! (for example a rule head, or the representative of a cache entry) into the
//! variable space of another.

use crate::answer::Answer;
use crate::atom::Var;
use crate::graph::Schema;
use crate::symbol::Label;
use smallvec::SmallVec;

#[cfg(feature = "tracing")]
use crate::trace::trace;

/// A finite multimap of `from -> to` variable pairs.
///
/// Pairs are kept sorted and deduplicated. A source variable may map to
/// several targets (its concept is copied to each) and several sources may
/// collapse onto one target (their concepts must then agree).
///
/// The empty unifier is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Unifier {
    pairs: SmallVec<[(Var, Var); 4]>,
}

impl Unifier {
    /// The identity unifier.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Var, Var)>) -> Self {
        let mut pairs: SmallVec<[(Var, Var); 4]> = pairs.into_iter().collect();
        pairs.sort_unstable();
        pairs.dedup();
        Self { pairs }
    }

    pub fn is_identity(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (Var, Var)> + '_ {
        self.pairs.iter().copied()
    }

    /// Targets of a source variable.
    pub fn targets(&self, from: Var) -> impl Iterator<Item = Var> + '_ {
        self.pairs
            .iter()
            .filter(move |(f, _)| *f == from)
            .map(|(_, t)| *t)
    }

    /// Source variables, deduplicated.
    pub fn sources(&self) -> SmallVec<[Var; 4]> {
        let mut vars: SmallVec<[Var; 4]> = self.pairs.iter().map(|(f, _)| *f).collect();
        vars.dedup();
        vars
    }

    /// Whether the mapping is one-to-one.
    pub fn is_bijective(&self) -> bool {
        let mut sources: SmallVec<[Var; 4]> = self.pairs.iter().map(|(f, _)| *f).collect();
        let mut targets: SmallVec<[Var; 4]> = self.pairs.iter().map(|(_, t)| *t).collect();
        sources.sort_unstable();
        targets.sort_unstable();
        let n = self.pairs.len();
        sources.dedup();
        targets.dedup();
        sources.len() == n && targets.len() == n
    }

    /// The inverse mapping (`to -> from`).
    pub fn inverse(&self) -> Unifier {
        Unifier::from_pairs(self.pairs.iter().map(|&(f, t)| (t, f)))
    }

    /// Compose `self` then `next`: `a -> c` for every `a -> b` in self and
    /// `b -> c` in next. The identity is neutral on either side.
    pub fn compose(&self, next: &Unifier) -> Unifier {
        if self.is_identity() {
            return next.clone();
        }
        if next.is_identity() {
            return self.clone();
        }
        Unifier::from_pairs(self.pairs.iter().flat_map(|&(a, b)| {
            next.pairs
                .iter()
                .filter(move |(b2, _)| *b2 == b)
                .map(move |&(_, c)| (a, c))
        }))
    }

    /// Translate an answer through the unifier.
    ///
    /// Only mapped variables survive; unmapped source variables belong to a
    /// different variable space and are dropped. Returns None when two source
    /// variables collapsing onto one target carry different concepts.
    pub fn apply(&self, answer: &Answer) -> Option<Answer> {
        if self.is_identity() {
            return Some(answer.clone());
        }
        let mut out = answer.filter(|_, _| false);
        for &(from, to) in self.pairs.iter() {
            if let Some(concept) = answer.get(from) {
                match out.with(to, concept) {
                    Some(next) => out = next,
                    None => {
                        #[cfg(feature = "tracing")]
                        trace!(?from, ?to, "unifier_conflict");
                        return None;
                    }
                }
            }
        }
        Some(out)
    }
}

/// Unifier of a query atom with a rule head.
///
/// Role variables of the query atom that meet explicit role labels in the
/// head cannot be renamed; they are bound to the head's role instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HeadUnifier {
    pub unifier: Unifier,
    pub role_bindings: SmallVec<[(Var, Label); 2]>,
}

impl HeadUnifier {
    pub fn new(unifier: Unifier) -> Self {
        Self {
            unifier,
            role_bindings: SmallVec::new(),
        }
    }

    /// Translate a head answer into query variables and bind the query's
    /// role variables to the concepts of the head's roles.
    pub fn apply<S: Schema + ?Sized>(&self, answer: &Answer, schema: &S) -> Option<Answer> {
        let mut out = self.unifier.apply(answer)?;
        for &(var, role) in self.role_bindings.iter() {
            out = out.with(var, schema.schema_concept(role)?)?;
        }
        Some(out)
    }
}

/// All the ways one atom unifies with another. Symmetric relations unify in
/// more than one way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiUnifier {
    unifiers: SmallVec<[HeadUnifier; 2]>,
}

impl MultiUnifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unifier unless an identical one is present.
    pub fn push(&mut self, unifier: HeadUnifier) {
        if !self.unifiers.contains(&unifier) {
            self.unifiers.push(unifier);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.unifiers.len()
    }

    /// The single unifier, if there is exactly one.
    pub fn unique(&self) -> Option<&HeadUnifier> {
        match self.unifiers.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeadUnifier> {
        self.unifiers.iter()
    }
}

impl FromIterator<HeadUnifier> for MultiUnifier {
    fn from_iter<I: IntoIterator<Item = HeadUnifier>>(iter: I) -> Self {
        let mut multi = MultiUnifier::new();
        for u in iter {
            multi.push(u);
        }
        multi
    }
}
