use super::{sub_goal, AnswerState, QueryStateBase, ResolutionContext, ResolutionState, StateRef};
use super::QueryState;
use crate::error::ResolveResult;
use crate::query::Query;
use crate::trace::trace;
use std::rc::Rc;

/// Resolves planned sub-queries left to right.
///
/// The state at position `index` resolves one sub-query under the bindings
/// accumulated so far. Each answer it receives spawns the state for the next
/// position with the answer merged in; answers at the last position are
/// complete and go to the parent.
pub struct CumulativeState {
    base: QueryStateBase,
    queries: Rc<[Query]>,
    index: usize,
    started: bool,
}

impl CumulativeState {
    pub fn new(queries: Rc<[Query]>, index: usize, base: QueryStateBase) -> Self {
        Self {
            base,
            queries,
            index,
            started: false,
        }
    }

    pub fn base(&self) -> &QueryStateBase {
        &self.base
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub(crate) fn generate_sub_goal(
        &mut self,
        this: &StateRef,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        if self.started {
            return Ok(None);
        }
        self.started = true;
        let query = match self.queries.get(self.index) {
            Some(query) => query,
            None => return Ok(Some(self.base.answer_for_parent(self.base.sub.clone()))),
        };
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
        let merged = answer
            .translate(ctx.graph())
            .and_then(|sub| self.base.sub.merge(&sub));
        let merged = match merged {
            Some(merged) => merged,
            None => {
                ctx.metrics().record_unification_conflict();
                return Ok(None);
            }
        };
        if self.index + 1 >= self.queries.len() {
            return Ok(Some(self.base.answer_for_parent(merged)));
        }
        trace!(index = self.index + 1, of = self.queries.len(), "cumulative_step");
        let next = CumulativeState {
            base: QueryStateBase {
                sub: merged,
                parent: self.base.parent.clone(),
                visited: self.base.visited.clone(),
            },
            queries: Rc::clone(&self.queries),
            index: self.index + 1,
            started: false,
        };
        Ok(Some(ResolutionState::query(QueryState::Cumulative(next))))
    }
}
