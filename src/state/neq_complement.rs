use super::{sub_goal, AnswerState, QueryStateBase, ResolutionContext, ResolutionState, StateRef};
use crate::answer::Answer;
use crate::atom::Var;
use crate::error::{PlanError, ResolveResult};
use crate::query::Query;
use crate::trace::trace;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::rc::Rc;

/// The query with one inequality's sides forced equal, and what it answered.
struct Complement {
    left: Var,
    right: Var,
    query: Query,
    vars: SmallVec<[Var; 8]>,
    answers: FxHashSet<Answer>,
}

impl Complement {
    /// A positive answer as the complement would state it: `right` folded
    /// into `left`. None when the two sides differ.
    fn lift(&self, answer: &Answer) -> Option<Answer> {
        let left = answer.get(self.left)?;
        (answer.get(self.right) == Some(left)).then(|| answer.project(&self.vars))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Complement(usize),
    Positive,
    Done,
}

/// Resolves a query with inequalities as a set difference.
///
/// Each `x != y` gets a complement query where `y` is renamed to `x`. The
/// complements are resolved first and their answers kept. The query without
/// its inequalities is resolved last; an answer to it is accepted only when
/// it is not an answer to any complement.
///
/// A positive answer with equal sides that a complement did not produce is
/// still one of its answers. It is added to that complement as a witness and
/// rejected.
pub struct NeqComplementState {
    base: QueryStateBase,
    positive: Query,
    complements: Vec<Complement>,
    witnesses: usize,
    /// Phase whose child is running, and the next phase to start.
    running: Option<Phase>,
    next: Phase,
}

impl NeqComplementState {
    pub fn new(query: Query, base: QueryStateBase) -> ResolveResult<Self> {
        let positive = query.positive();
        let bound = positive.selectable_vars();
        let mut complements = Vec::new();
        for (left, right) in query.neqs() {
            for v in [left, right] {
                if !bound.contains(&v) {
                    return Err(PlanError::UnboundNeq(v.to_string()).into());
                }
            }
            let forced = positive.merge_vars(right, left);
            complements.push(Complement {
                left,
                right,
                vars: forced.selectable_vars(),
                query: forced,
                answers: FxHashSet::default(),
            });
        }
        let next = if complements.is_empty() {
            Phase::Positive
        } else {
            Phase::Complement(0)
        };
        Ok(Self {
            base,
            positive,
            complements,
            witnesses: 0,
            running: None,
            next,
        })
    }

    pub fn base(&self) -> &QueryStateBase {
        &self.base
    }

    /// The query without its inequalities.
    pub fn positive(&self) -> &Query {
        &self.positive
    }

    /// Complement queries, one per inequality.
    pub fn complements(&self) -> impl Iterator<Item = &Query> + '_ {
        self.complements.iter().map(|c| &c.query)
    }

    /// Answers collected for the `i`th complement.
    pub fn complement_answers(&self, i: usize) -> impl Iterator<Item = &Answer> + '_ {
        self.complements.get(i).into_iter().flat_map(|c| c.answers.iter())
    }

    /// Positive answers rejected without the complement having produced them.
    pub fn witnesses(&self) -> usize {
        self.witnesses
    }

    pub(crate) fn generate_sub_goal(
        &mut self,
        this: &StateRef,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        let phase = self.next;
        let query = match phase {
            Phase::Complement(i) => {
                self.next = if i + 1 < self.complements.len() {
                    Phase::Complement(i + 1)
                } else {
                    Phase::Positive
                };
                &self.complements[i].query
            }
            Phase::Positive => {
                self.next = Phase::Done;
                &self.positive
            }
            Phase::Done => {
                self.running = None;
                return Ok(None);
            }
        };
        self.running = Some(phase);
        let child = sub_goal(
            query,
            &self.base.sub,
            Some(Rc::clone(this)),
            self.base.visited.clone(),
            ctx,
        )?;
        Ok(Some(child))
    }

    pub(crate) fn propagate_answer(
        &mut self,
        answer: AnswerState,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        let sub = match answer.translate(ctx.graph()) {
            Some(sub) => sub,
            None => {
                ctx.metrics().record_unification_conflict();
                return Ok(None);
            }
        };
        match self.running {
            Some(Phase::Complement(i)) => {
                let complement = &mut self.complements[i];
                complement.answers.insert(sub.project(&complement.vars));
                Ok(None)
            }
            Some(Phase::Positive) => {
                if !self.accepts(&sub) {
                    return Ok(None);
                }
                match sub.merge(&self.base.sub) {
                    Some(merged) => Ok(Some(self.base.answer_for_parent(merged))),
                    None => {
                        ctx.metrics().record_unification_conflict();
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    /// Whether a positive answer lies outside every complement.
    fn accepts(&mut self, answer: &Answer) -> bool {
        for c in &mut self.complements {
            let Some(lifted) = c.lift(answer) else {
                continue;
            };
            if !c.answers.contains(&lifted) {
                trace!(left = %c.left, right = %c.right, "neq_complement_witness");
                c.answers.insert(lifted);
                self.witnesses += 1;
            }
            return false;
        }
        true
    }
}
