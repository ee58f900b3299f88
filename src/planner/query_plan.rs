use super::ResolutionPlan;
use crate::atom::{Atom, Var};
use crate::query::Query;
use smallvec::SmallVec;

/// Query-level resolution order.
///
/// The atom plan is cut into fragments: every rule-resolvable atom becomes
/// an atomic query of its own, and runs of consecutive atoms no rule
/// concludes are kept together as one compound query answered by a single
/// graph match. Each fragment carries the `Id`/`Value` predicates over its
/// variables.
///
/// Fragments are then ordered over their neighbour graph: after the first,
/// only fragments adjacent to one already placed are eligible unless none
/// is. Among eligible fragments, those with bound variables come first, then
/// those no rule concludes, then atomic ones, then atom plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionQueryPlan {
    queries: Vec<Query>,
}

impl ResolutionQueryPlan {
    pub fn new<F>(query: &Query, plan: &ResolutionPlan, resolvable: F) -> Self
    where
        F: Fn(&Atom) -> bool,
    {
        let mut fragments: Vec<(Vec<Atom>, bool)> = Vec::new();
        for atom in plan.plan() {
            let rule_resolvable = resolvable(atom);
            match fragments.last_mut() {
                Some((atoms, false)) if !rule_resolvable => atoms.push(atom.clone()),
                _ => fragments.push((vec![atom.clone()], rule_resolvable)),
            }
        }

        let queries: Vec<Query> = fragments
            .iter()
            .map(|(atoms, _)| query.restrict_to(atoms.iter().cloned()))
            .collect();
        let n = queries.len();
        let vars: Vec<SmallVec<[Var; 8]>> = queries.iter().map(|q| q.selectable_vars()).collect();
        let neighbours: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| j != i && vars[i].iter().any(|v| vars[j].contains(v)))
                    .collect()
            })
            .collect();

        let mut placed = vec![false; n];
        let mut order: Vec<usize> = Vec::with_capacity(n);
        while order.len() < n {
            let frontier: Vec<usize> = (0..n)
                .filter(|&i| !placed[i] && order.iter().any(|&p| neighbours[p].contains(&i)))
                .collect();
            let pool: Vec<usize> = if frontier.is_empty() {
                (0..n).filter(|&i| !placed[i]).collect()
            } else {
                frontier
            };
            let next = pool.into_iter().min_by_key(|&i| {
                (
                    queries[i].substitution().is_empty(),
                    fragments[i].1,
                    !queries[i].is_atomic(),
                    i,
                )
            });
            match next {
                Some(i) => {
                    placed[i] = true;
                    order.push(i);
                }
                None => break,
            }
        }

        Self {
            queries: order.into_iter().map(|i| queries[i].clone()).collect(),
        }
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn into_queries(self) -> Vec<Query> {
        self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
