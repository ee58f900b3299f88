use crate::atom::{Atom, Var};
use crate::concept::{Comparator, ConceptId};
use crate::error::PlanError;
use crate::graph::JoinOrderOracle;
use crate::query::Query;
use crate::trace::{debug, warn};
use smallvec::SmallVec;

/// Atom-level resolution order.
///
/// Built greedily. At each step the candidates are the unplanned atoms
/// connected to the plan so far (every unplanned atom when nothing connects),
/// narrowed to those the local heuristic ranks highest: most equality value
/// predicates first, then other value predicates, then fully bound atoms,
/// then most bound variables. The join order oracle
/// is then asked to order what remains, with already planned variables
/// marked bound by placeholder ids. If the oracle's first atom is a
/// candidate, its whole order is taken. Otherwise the best local candidate
/// is placed and the process repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPlan {
    plan: Vec<Atom>,
    disconnections: Vec<usize>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    value_eq: usize,
    value_other: usize,
    grounded: bool,
    bound: usize,
}

impl ResolutionPlan {
    pub fn new<O, F>(
        query: &Query,
        oracle: &O,
        resolvable: F,
        validate: bool,
    ) -> Result<Self, PlanError>
    where
        O: JoinOrderOracle + ?Sized,
        F: Fn(&Atom) -> bool,
    {
        let atoms: Vec<Atom> = query.selectable().cloned().collect();
        if atoms.is_empty() {
            return Err(PlanError::EmptyQuery);
        }
        let predicates: Vec<Atom> = query.predicates().cloned().collect();
        let mut bound: SmallVec<[Var; 8]> = query.bound_vars();
        let mut placed_vars: SmallVec<[Var; 8]> = SmallVec::new();
        let mut remaining = atoms.clone();
        let mut plan: Vec<Atom> = Vec::with_capacity(atoms.len());

        while !remaining.is_empty() {
            let connected: Vec<usize> = (0..remaining.len())
                .filter(|&i| remaining[i].vars().iter().any(|v| placed_vars.contains(v)))
                .collect();
            let pool: Vec<usize> = if connected.is_empty() {
                (0..remaining.len()).collect()
            } else {
                connected
            };
            let scores: Vec<Score> = pool
                .iter()
                .map(|&i| score(&remaining[i], &predicates, &bound))
                .collect();
            let best = scores.iter().max().copied().unwrap_or_default();
            let candidates: Vec<usize> = if best == Score::default() {
                pool.clone()
            } else {
                pool.iter()
                    .zip(scores.iter())
                    .filter(|(_, s)| **s == best)
                    .map(|(i, _)| *i)
                    .collect()
            };

            let conjunction: Vec<Atom> = remaining
                .iter()
                .cloned()
                .chain(predicates.iter().cloned())
                .chain(bound.iter().map(|v| Atom::id(*v, ConceptId::PLACEHOLDER)))
                .collect();
            let order = oracle.estimate_join_order(&conjunction);
            let oracle_first = order
                .first()
                .and_then(|a| remaining.iter().position(|r| r == a));

            if oracle_first.map_or(false, |f| candidates.contains(&f)) {
                debug!(position = plan.len(), "plan_oracle_accepted");
                for atom in order {
                    if let Some(pos) = remaining.iter().position(|r| *r == atom) {
                        plan.push(remaining.remove(pos));
                    }
                }
                // atoms the oracle left out keep their query order
                plan.append(&mut remaining);
                break;
            }

            let rank = |i: usize| {
                order
                    .iter()
                    .position(|a| *a == remaining[i])
                    .unwrap_or(usize::MAX)
            };
            let chosen = candidates
                .iter()
                .copied()
                .min_by_key(|&i| (resolvable(&remaining[i]), rank(i), i))
                .unwrap_or(pool[0]);
            let atom = remaining.remove(chosen);
            for v in atom.vars() {
                if !bound.contains(&v) {
                    bound.push(v);
                }
                if !placed_vars.contains(&v) {
                    placed_vars.push(v);
                }
            }
            plan.push(atom);
        }

        if plan.len() != atoms.len() || !atoms.iter().all(|a| plan.contains(a)) {
            return Err(PlanError::Incomplete {
                planned: plan.iter().filter(|a| atoms.contains(a)).count(),
                expected: atoms.len(),
            });
        }

        let disconnections = disconnections(&plan);
        if validate {
            let components = components(&plan);
            for &i in disconnections.iter() {
                let genuine = (0..i).all(|j| components[j] != components[i]);
                if !genuine {
                    warn!(position = i, "plan_disconnected");
                }
            }
        }

        Ok(Self {
            plan,
            disconnections,
        })
    }

    /// Atoms in resolution order.
    pub fn plan(&self) -> &[Atom] {
        &self.plan
    }

    pub fn into_atoms(self) -> Vec<Atom> {
        self.plan
    }

    /// Positions of atoms sharing no variable with any earlier atom.
    pub fn disconnections(&self) -> &[usize] {
        &self.disconnections
    }
}

fn score(atom: &Atom, predicates: &[Atom], bound: &[Var]) -> Score {
    let vars = atom.vars();
    let bound_count = vars.iter().filter(|v| bound.contains(v)).count();
    let mut value_eq = 0;
    let mut value_other = 0;
    for p in predicates {
        if let Atom::Value { var, cmp, .. } = p {
            if vars.contains(var) {
                if *cmp == Comparator::Eq {
                    value_eq += 1;
                } else {
                    value_other += 1;
                }
            }
        }
    }
    Score {
        value_eq,
        value_other,
        grounded: !vars.is_empty() && bound_count == vars.len(),
        bound: bound_count,
    }
}

fn disconnections(plan: &[Atom]) -> Vec<usize> {
    let mut seen: SmallVec<[Var; 8]> = SmallVec::new();
    let mut out = Vec::new();
    for (i, atom) in plan.iter().enumerate() {
        let vars = atom.vars();
        if i > 0 && !vars.iter().any(|v| seen.contains(v)) {
            out.push(i);
        }
        seen.extend(vars);
    }
    out
}

/// Connected component index of every atom, atoms being linked by shared variables.
fn components(atoms: &[Atom]) -> Vec<usize> {
    let vars: Vec<SmallVec<[Var; 8]>> = atoms.iter().map(|a| a.vars()).collect();
    let mut component = vec![usize::MAX; atoms.len()];
    let mut next = 0;
    for root in 0..atoms.len() {
        if component[root] != usize::MAX {
            continue;
        }
        component[root] = next;
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            for j in 0..atoms.len() {
                if component[j] == usize::MAX && vars[i].iter().any(|v| vars[j].contains(v)) {
                    component[j] = next;
                    stack.push(j);
                }
            }
        }
        next += 1;
    }
    component
}
