//! Queries: conjunctions of atoms, and atomic queries keyed for the cache.

use crate::answer::Answer;
use crate::atom::{Atom, Var};
use crate::concept::ConceptId;
use crate::error::PlanError;
use crate::graph::Schema;
use crate::key::{AtomicKey, Canonical};
use crate::rule::RuleRepository;
use crate::symbol::SymbolStore;
use smallvec::SmallVec;

/// A conjunction of atoms with an optional explicit projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    atoms: Vec<Atom>,
    selected: Option<SmallVec<[Var; 8]>>,
}

impl Query {
    /// Build a query. Duplicate atoms are dropped, first occurrence wins.
    pub fn new(atoms: impl IntoIterator<Item = Atom>) -> Self {
        let mut deduped: Vec<Atom> = Vec::new();
        for atom in atoms {
            if !deduped.contains(&atom) {
                deduped.push(atom);
            }
        }
        Self {
            atoms: deduped,
            selected: None,
        }
    }

    /// Restrict answers to the given variables.
    pub fn select(mut self, vars: impl IntoIterator<Item = Var>) -> Self {
        self.selected = Some(vars.into_iter().collect());
        self
    }

    /// All atoms, predicates included.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Atoms matched against the graph: relations, `isa` and `has`.
    pub fn selectable(&self) -> impl Iterator<Item = &Atom> + '_ {
        self.atoms.iter().filter(|a| a.is_selectable())
    }

    /// Id, value and inequality constraints.
    pub fn predicates(&self) -> impl Iterator<Item = &Atom> + '_ {
        self.atoms.iter().filter(|a| a.is_predicate())
    }

    /// Inequality predicates as `(left, right)` pairs.
    pub fn neqs(&self) -> impl Iterator<Item = (Var, Var)> + '_ {
        self.atoms.iter().filter_map(|a| match a {
            Atom::Neq { left, right } => Some((*left, *right)),
            _ => None,
        })
    }

    /// Check for any inequality.
    pub fn has_neq(&self) -> bool {
        self.neqs().next().is_some()
    }

    /// All variables in order of first occurrence.
    pub fn vars(&self) -> SmallVec<[Var; 8]> {
        let mut vars: SmallVec<[Var; 8]> = SmallVec::new();
        for atom in &self.atoms {
            for v in atom.vars() {
                if !vars.contains(&v) {
                    vars.push(v);
                }
            }
        }
        vars
    }

    /// Variables that occur in a selectable atom.
    pub fn selectable_vars(&self) -> SmallVec<[Var; 8]> {
        let mut vars: SmallVec<[Var; 8]> = SmallVec::new();
        for atom in self.selectable() {
            for v in atom.vars() {
                if !vars.contains(&v) {
                    vars.push(v);
                }
            }
        }
        vars
    }

    /// Variables answers are projected onto: the explicit selection, or every
    /// named (non-anonymous) variable.
    pub fn selected_vars(&self) -> SmallVec<[Var; 8]> {
        match &self.selected {
            Some(vars) => vars.clone(),
            None => self
                .vars()
                .into_iter()
                .filter(|v| !v.is_anonymous())
                .collect(),
        }
    }

    /// Concept bindings imposed by non-placeholder `Id` predicates.
    /// Contradictory bindings keep the first one; such a query has no answers.
    /// Bindings fixed by `Id` predicates.
    pub fn substitution(&self) -> Answer {
        let mut sub = Answer::new();
        for atom in &self.atoms {
            if let Atom::Id { var, concept } = atom {
                if !concept.is_placeholder() {
                    if let Some(next) = sub.with(*var, *concept) {
                        sub = next;
                    }
                }
            }
        }
        sub
    }

    /// Variables bound by an `Id` predicate, placeholders included.
    pub fn bound_vars(&self) -> SmallVec<[Var; 8]> {
        let mut vars: SmallVec<[Var; 8]> = SmallVec::new();
        for atom in &self.atoms {
            if let Atom::Id { var, .. } = atom {
                if !vars.contains(var) {
                    vars.push(*var);
                }
            }
        }
        vars
    }

    /// The query with `Id` predicates added for every query variable `sub` binds.
    pub fn with_substitution(&self, sub: &Answer) -> Query {
        let mut atoms = self.atoms.clone();
        for var in self.vars() {
            if let Some(concept) = sub.get(var) {
                atoms.push(Atom::id(var, concept));
            }
        }
        Query {
            atoms: Query::new(atoms).atoms,
            selected: self.selected.clone(),
        }
    }

    /// The query with `Id` predicates marking `vars` as bound to unknown concepts.
    pub fn with_placeholders(&self, vars: impl IntoIterator<Item = Var>) -> Query {
        let mut atoms = self.atoms.clone();
        atoms.extend(
            vars.into_iter()
                .map(|v| Atom::id(v, ConceptId::PLACEHOLDER)),
        );
        Query {
            atoms: Query::new(atoms).atoms,
            selected: self.selected.clone(),
        }
    }

    /// Exactly one selectable atom.
    pub fn is_atomic(&self) -> bool {
        self.selectable().count() == 1
    }

    /// Every variable of every selectable atom is bound to a concept.
    /// Check if every variable of the atom is fixed.
    pub fn is_ground(&self) -> bool {
        let sub = self.substitution();
        self.selectable_vars().iter().all(|v| sub.contains(*v))
    }

    /// The query without its inequality predicates.
    pub fn positive(&self) -> Query {
        Query {
            atoms: self
                .atoms
                .iter()
                .filter(|a| !matches!(a, Atom::Neq { .. }))
                .cloned()
                .collect(),
            selected: self.selected.clone(),
        }
    }

    /// The query with `from` renamed to `into` everywhere.
    pub fn merge_vars(&self, from: Var, into: Var) -> Query {
        let rename = |v: Var| if v == from { into } else { v };
        Query {
            atoms: Query::new(self.atoms.iter().map(|a| a.rename(rename))).atoms,
            selected: self
                .selected
                .as_ref()
                .map(|vars| vars.iter().map(|&v| rename(v)).collect()),
        }
    }

    /// The sub-query made of `atoms` together with the `Id` and `Value`
    /// predicates of this query that touch their variables.
    pub fn restrict_to(&self, atoms: impl IntoIterator<Item = Atom>) -> Query {
        let atoms: Vec<Atom> = atoms.into_iter().collect();
        let mut vars: SmallVec<[Var; 8]> = SmallVec::new();
        for atom in &atoms {
            vars.extend(atom.vars());
        }
        let predicates = self
            .predicates()
            .filter(|p| matches!(p, Atom::Id { .. } | Atom::Value { .. }))
            .filter(|p| p.vars().iter().all(|v| vars.contains(v)))
            .cloned();
        Query::new(atoms.into_iter().chain(predicates))
    }

    /// Whether some rule could conclude one of the selectable atoms.
    pub fn is_rule_resolvable<R, S>(&self, rules: &R, schema: &S) -> bool
    where
        R: RuleRepository + ?Sized,
        S: Schema + ?Sized,
    {
        self.selectable()
            .any(|atom| crate::rule::is_rule_resolvable(atom, rules, schema))
    }

    /// Check the query is something the resolver can answer.
    pub fn validate(&self, symbols: Option<&SymbolStore>) -> Result<(), PlanError> {
        let name = |v: Var| match symbols {
            Some(s) => v.display(s),
            None => v.to_string(),
        };
        if self.selectable().next().is_none() {
            return Err(PlanError::EmptyQuery);
        }
        let vars = self.vars();
        if let Some(selected) = &self.selected {
            if let Some(missing) = selected.iter().find(|v| !vars.contains(v)) {
                return Err(PlanError::VariableNotInQuery(name(*missing)));
            }
        }
        let bound = self.selectable_vars();
        for (left, right) in self.neqs() {
            for v in [left, right] {
                if !bound.contains(&v) {
                    return Err(PlanError::UnboundNeq(name(v)));
                }
            }
        }
        Ok(())
    }

    /// One atomic query per selectable atom, carrying its predicates.
    pub fn split_atomic(&self, max_permutations: usize) -> Vec<AtomicQuery> {
        self.selectable()
            .map(|atom| AtomicQuery::from_parts(atom.clone(), self, max_permutations))
            .collect()
    }
}

/// A query with exactly one selectable atom, with its cache keys computed.
#[derive(Debug, Clone)]
pub struct AtomicQuery {
    query: Query,
    atom: Atom,
    canonical: Canonical,
    pattern: Canonical,
}

impl AtomicQuery {
    /// The atomic query of `atom` with the `Id`/`Value` predicates of
    /// `context` over its variables.
    pub fn from_parts(atom: Atom, context: &Query, max_permutations: usize) -> Self {
        let query = context.restrict_to([atom.clone()]);
        Self::build(atom, query, max_permutations)
    }

    /// Treat `query` as atomic. None unless it has exactly one selectable atom.
    pub fn from_query(query: &Query, max_permutations: usize) -> Option<Self> {
        if !query.is_atomic() {
            return None;
        }
        let atom = query.selectable().next()?.clone();
        Some(Self::build(atom, query.clone(), max_permutations))
    }

    fn build(atom: Atom, query: Query, max_permutations: usize) -> Self {
        let predicates: Vec<Atom> = query.predicates().cloned().collect();
        let unbound: Vec<Atom> = predicates
            .iter()
            .filter(|p| !matches!(p, Atom::Id { .. }))
            .cloned()
            .collect();
        let canonical = Canonical::of(&atom, &predicates, max_permutations);
        let pattern = Canonical::of(&atom, &unbound, max_permutations);
        Self {
            query,
            atom,
            canonical,
            pattern,
        }
    }

    /// The single selectable atom.
    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    /// The atom with its predicates, as a query.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Key of this query's equivalence class.
    pub fn key(&self) -> &AtomicKey {
        &self.canonical.key
    }

    /// Canonical form: the key and its variable order.
    pub fn canonical(&self) -> &Canonical {
        &self.canonical
    }

    /// Canonical form with the `Id` predicates left out.
    pub fn pattern(&self) -> &Canonical {
        &self.pattern
    }

    /// The same atom without its `Id` predicates.
    pub fn unbound(&self, max_permutations: usize) -> AtomicQuery {
        let query = Query::new(
            self.query
                .atoms()
                .iter()
                .filter(|a| !matches!(a, Atom::Id { .. }))
                .cloned(),
        );
        Self::build(self.atom.clone(), query, max_permutations)
    }

    pub fn substitution(&self) -> Answer {
        self.query.substitution()
    }

    /// Check if any variable is fixed to a concept.
    pub fn has_bindings(&self) -> bool {
        self.query
            .predicates()
            .any(|p| matches!(p, Atom::Id { .. }))
    }

    pub fn is_ground(&self) -> bool {
        self.query.is_ground()
    }

    /// Variables of the atom itself.
    pub fn vars(&self) -> SmallVec<[Var; 8]> {
        self.atom.vars()
    }
}

#[cfg(test)]
#[path = "tests/query.rs"]
mod tests;
