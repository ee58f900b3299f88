use crate::atom::Var;
use crate::concept::ConceptId;
use crate::rule::RuleId;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An answer (substitution) maps query variables to concepts.
///
/// Bindings are kept sorted by variable so equality and hashing are
/// order-independent. A variable maps to at most one concept. Answers are
/// immutable: every operation returns a new value.
///
/// The explanation records how the answer was derived and takes no part in
/// equality or hashing.
#[derive(Debug, Clone)]
pub struct Answer {
    bindings: SmallVec<[(Var, ConceptId); 4]>,
    explanation: Arc<Explanation>,
}

/// Provenance of an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Explanation {
    /// Found by base pattern matching or read from the cache.
    Lookup,
    /// Derived by applying a rule to the premise (the rule body answer).
    Rule { rule: RuleId, premise: Answer },
    /// Conjunction of partial answers.
    Join(Vec<Answer>),
}

impl Answer {
    /// The empty answer.
    pub fn new() -> Self {
        Self {
            bindings: SmallVec::new(),
            explanation: Arc::new(Explanation::Lookup),
        }
    }

    /// Build an answer from pairs. Returns None if a variable is given two
    /// different concepts.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Var, ConceptId)>) -> Option<Self> {
        let mut answer = Answer::new();
        for (var, concept) in pairs {
            answer = answer.with(var, concept)?;
        }
        Some(answer)
    }

    /// Get the concept bound to a variable.
    pub fn get(&self, var: Var) -> Option<ConceptId> {
        self.bindings
            .binary_search_by(|(v, _)| v.cmp(&var))
            .ok()
            .map(|idx| self.bindings[idx].1)
    }

    /// Check if a variable is bound.
    pub fn contains(&self, var: Var) -> bool {
        self.get(var).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Iterator over (var, concept) pairs in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (Var, ConceptId)> + '_ {
        self.bindings.iter().copied()
    }

    /// Bound variables in order.
    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.bindings.iter().map(|(v, _)| *v)
    }

    /// Bind one more variable. Rebinding to the same concept is a no-op;
    /// rebinding to a different concept is a conflict.
    pub fn with(&self, var: Var, concept: ConceptId) -> Option<Answer> {
        match self.bindings.binary_search_by(|(v, _)| v.cmp(&var)) {
            Ok(idx) => (self.bindings[idx].1 == concept).then(|| self.clone()),
            Err(idx) => {
                let mut bindings = self.bindings.clone();
                bindings.insert(idx, (var, concept));
                Some(Answer {
                    bindings,
                    explanation: Arc::clone(&self.explanation),
                })
            }
        }
    }

    /// Merge two answers. Returns None when they disagree on a shared variable.
    ///
    /// Merging is symmetric in its bindings. The explanation of the result
    /// joins both sides unless both are plain lookups.
    pub fn merge(&self, other: &Answer) -> Option<Answer> {
        let mut bindings: SmallVec<[(Var, ConceptId); 4]> =
            SmallVec::with_capacity(self.bindings.len() + other.bindings.len());
        let (mut i, mut j) = (0, 0);
        while i < self.bindings.len() && j < other.bindings.len() {
            let (va, ca) = self.bindings[i];
            let (vb, cb) = other.bindings[j];
            match va.cmp(&vb) {
                std::cmp::Ordering::Less => {
                    bindings.push((va, ca));
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    bindings.push((vb, cb));
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    if ca != cb {
                        return None;
                    }
                    bindings.push((va, ca));
                    i += 1;
                    j += 1;
                }
            }
        }
        bindings.extend_from_slice(&self.bindings[i..]);
        bindings.extend_from_slice(&other.bindings[j..]);

        let explanation = match (self.explanation.as_ref(), other.explanation.as_ref()) {
            (Explanation::Lookup, Explanation::Lookup) => Arc::clone(&self.explanation),
            _ => {
                let mut parts = Vec::new();
                for side in [self, other] {
                    match side.explanation.as_ref() {
                        Explanation::Join(children) => parts.extend(children.iter().cloned()),
                        _ => parts.push(side.clone()),
                    }
                }
                Arc::new(Explanation::Join(parts))
            }
        };
        Some(Answer {
            bindings,
            explanation,
        })
    }

    /// Restrict the answer to the given variables.
    pub fn project(&self, vars: &[Var]) -> Answer {
        self.filter(|v, _| vars.contains(&v))
    }

    /// Keep only the bindings satisfying the predicate.
    pub fn filter(&self, mut keep: impl FnMut(Var, ConceptId) -> bool) -> Answer {
        Answer {
            bindings: self
                .bindings
                .iter()
                .copied()
                .filter(|&(v, c)| keep(v, c))
                .collect(),
            explanation: Arc::clone(&self.explanation),
        }
    }

    /// Replace the explanation.
    pub fn explain(mut self, explanation: Explanation) -> Answer {
        self.explanation = Arc::new(explanation);
        self
    }

    /// How this answer was obtained.
    pub fn explanation(&self) -> &Explanation {
        &self.explanation
    }

    /// Rules used anywhere in this answer's derivation, outermost first.
    pub fn rules_used(&self) -> Vec<RuleId> {
        let mut rules = Vec::new();
        let mut stack: Vec<&Answer> = vec![self];
        while let Some(answer) = stack.pop() {
            match answer.explanation() {
                Explanation::Lookup => {}
                Explanation::Rule { rule, premise } => {
                    rules.push(*rule);
                    stack.push(premise);
                }
                Explanation::Join(children) => stack.extend(children.iter().rev()),
            }
        }
        rules
    }
}

impl Default for Answer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Answer {
    fn eq(&self, other: &Self) -> bool {
        self.bindings == other.bindings
    }
}

impl Eq for Answer {}

impl Hash for Answer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bindings.hash(state);
    }
}

#[cfg(test)]
#[path = "tests/answer.rs"]
mod tests;
