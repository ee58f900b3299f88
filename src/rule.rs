//! Inference rules and the repository the resolver reads them from.

use crate::atom::Atom;
use crate::error::PlanError;
use crate::graph::Schema;
use crate::query::Query;
use crate::symbol::SymbolStore;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Rule identifier - index into the RuleStore.
pub type RuleId = u32;

/// `when { body } then { head }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRule {
    pub id: RuleId,
    pub name: String,
    pub body: Query,
    pub head: Atom,
    /// Persist derived head facts instead of keeping them virtual.
    pub materialise: bool,
}

impl InferenceRule {
    /// A virtual rule. The id is assigned when the rule is added to a store.
    pub fn new(name: impl Into<String>, body: Query, head: Atom) -> Self {
        Self {
            id: 0,
            name: name.into(),
            body,
            head,
            materialise: false,
        }
    }

    pub fn materialised(mut self) -> Self {
        self.materialise = true;
        self
    }

    /// The head must be a selectable atom whose variables the body binds.
    /// A relation head may introduce its own relation variable.
    pub fn validate(&self, symbols: Option<&SymbolStore>) -> Result<(), PlanError> {
        let invalid = |reason: String| PlanError::InvalidRule {
            rule: self.name.clone(),
            reason,
        };
        if !self.head.is_selectable() {
            return Err(invalid("head is not a relation, isa or has atom".into()));
        }
        if self.body.selectable().next().is_none() {
            return Err(invalid("body has no selectable atoms".into()));
        }
        let body_vars = self.body.selectable_vars();
        let relation_var = match &self.head {
            Atom::Relation { var, .. } => *var,
            _ => None,
        };
        for v in self.head.vars() {
            if Some(v) != relation_var && !body_vars.contains(&v) {
                let name = match symbols {
                    Some(s) => v.display(s),
                    None => v.to_string(),
                };
                return Err(invalid(format!("head variable {} is not bound by the body", name)));
            }
        }
        Ok(())
    }
}

/// Read-only view of the rules in scope.
pub trait RuleRepository: Send + Sync {
    /// Rules whose head may conclude `atom`. Candidates are filtered by
    /// unification, so over-approximating is fine.
    fn rules_concluding(&self, atom: &Atom) -> Vec<Arc<InferenceRule>>;

    fn rule(&self, id: RuleId) -> Option<Arc<InferenceRule>>;
}

/// Vec-backed rule repository.
#[derive(Debug, Default, Clone)]
pub struct RuleStore {
    rules: Vec<Arc<InferenceRule>>,
}

impl RuleStore {
    /// Create a new empty rule store.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule and return its RuleId.
    pub fn add(&mut self, mut rule: InferenceRule) -> RuleId {
        let id = self.rules.len() as RuleId;
        rule.id = id;
        self.rules.push(Arc::new(rule));
        id
    }

    /// Add a rule after validating it.
    pub fn add_checked(
        &mut self,
        rule: InferenceRule,
        symbols: Option<&SymbolStore>,
    ) -> Result<RuleId, PlanError> {
        rule.validate(symbols)?;
        Ok(self.add(rule))
    }

    /// Get a rule by its ID.
    pub fn get(&self, id: RuleId) -> Option<&Arc<InferenceRule>> {
        self.rules.get(id as usize)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InferenceRule>> {
        self.rules.iter()
    }
}

impl RuleRepository for RuleStore {
    fn rules_concluding(&self, atom: &Atom) -> Vec<Arc<InferenceRule>> {
        self.rules
            .iter()
            .filter(|r| std::mem::discriminant(&r.head) == std::mem::discriminant(atom))
            .cloned()
            .collect()
    }

    fn rule(&self, id: RuleId) -> Option<Arc<InferenceRule>> {
        self.get(id).cloned()
    }
}

/// Whether some rule head unifies with `atom`.
pub fn is_rule_resolvable<R, S>(atom: &Atom, rules: &R, schema: &S) -> bool
where
    R: RuleRepository + ?Sized,
    S: Schema + ?Sized,
{
    atom.is_selectable()
        && rules
            .rules_concluding(atom)
            .iter()
            .any(|r| !atom.unify_with_head(&r.head, schema).is_empty())
}

/// Rules that can take part in answering `query`: those concluding one of
/// its atoms, then those concluding an atom of their bodies, and so on.
pub fn dependent_rules<R, S>(query: &Query, rules: &R, schema: &S) -> Vec<Arc<InferenceRule>>
where
    R: RuleRepository + ?Sized,
    S: Schema + ?Sized,
{
    let mut found: Vec<Arc<InferenceRule>> = Vec::new();
    let mut seen: FxHashSet<RuleId> = FxHashSet::default();
    let mut pending: Vec<Atom> = query.selectable().cloned().collect();
    while let Some(atom) = pending.pop() {
        for rule in rules.rules_concluding(&atom) {
            if seen.contains(&rule.id) || atom.unify_with_head(&rule.head, schema).is_empty() {
                continue;
            }
            seen.insert(rule.id);
            pending.extend(rule.body.selectable().cloned());
            found.push(rule);
        }
    }
    found
}

/// Whether the dependency graph among `rules` has a cycle. There is an edge
/// from `a` to `b` when `b`'s head unifies with an atom of `a`'s body.
pub fn has_cycle<S: Schema + ?Sized>(rules: &[Arc<InferenceRule>], schema: &S) -> bool {
    let edges: Vec<Vec<usize>> = rules
        .iter()
        .map(|from| {
            rules
                .iter()
                .enumerate()
                .filter(|(_, to)| {
                    from.body
                        .selectable()
                        .any(|atom| !atom.unify_with_head(&to.head, schema).is_empty())
                })
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Open,
        Done,
    }
    let mut marks = vec![Mark::New; rules.len()];
    for root in 0..rules.len() {
        if marks[root] != Mark::New {
            continue;
        }
        // (node, next edge index)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::Open;
        while let Some(top) = stack.last_mut() {
            let node = top.0;
            match edges[node].get(top.1).copied() {
                Some(succ) => {
                    top.1 += 1;
                    match marks[succ] {
                        Mark::Open => return true,
                        Mark::New => {
                            marks[succ] = Mark::Open;
                            stack.push((succ, 0));
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }
    false
}

/// Decides whether a rule's conclusions are persisted.
pub trait MaterialisationPolicy: Send + Sync {
    fn requires_materialisation(&self, rule: &InferenceRule, atom: &Atom) -> bool;
}

/// Follow each rule's own `materialise` flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleFlagPolicy;

impl MaterialisationPolicy for RuleFlagPolicy {
    fn requires_materialisation(&self, rule: &InferenceRule, _atom: &Atom) -> bool {
        rule.materialise
    }
}

impl<F> MaterialisationPolicy for F
where
    F: Fn(&InferenceRule, &Atom) -> bool + Send + Sync,
{
    fn requires_materialisation(&self, rule: &InferenceRule, atom: &Atom) -> bool {
        self(rule, atom)
    }
}

#[cfg(test)]
#[path = "tests/rule.rs"]
mod tests;
