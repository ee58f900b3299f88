use super::{
    AnswerState, CumulativeState, QueryState, QueryStateBase, ResolutionContext,
    ResolutionState, StateRef,
};
use crate::error::{ResolveError, ResolveResult};
use crate::graph::AnswerStream;
use crate::planner::plan_query;
use crate::query::Query;
use crate::unifier::HeadUnifier;
use std::rc::Rc;

enum Mode {
    /// No atom is rule resolvable: one graph match answers the query.
    Match(Option<AnswerStream>),
    /// Planned sub-queries, handed to a cumulative state once.
    Planned(Option<Rc<[Query]>>),
}

/// Resolves a conjunction of several atoms.
pub struct ConjunctiveState {
    base: QueryStateBase,
    query: Query,
    mode: Mode,
}

impl ConjunctiveState {
    pub fn new(
        query: Query,
        base: QueryStateBase,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Self> {
        let config = ctx.config();
        let resolvable = config.infer && query.is_rule_resolvable(ctx.rules(), ctx.graph());
        let mode = if resolvable {
            let plan = plan_query(&query, ctx.graph(), ctx.rules(), config)?;
            Mode::Planned(Some(plan.queries.into_queries().into()))
        } else {
            Mode::Match(None)
        };
        Ok(Self { base, query, mode })
    }

    pub fn base(&self) -> &QueryStateBase {
        &self.base
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub(crate) fn generate_sub_goal(
        &mut self,
        this: &StateRef,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        let query = &self.query;
        match &mut self.mode {
            Mode::Match(stream) => {
                let stream = stream.get_or_insert_with(|| ctx.graph().match_conjunction(query));
                match stream.next() {
                    Some(Ok(answer)) => Ok(Some(ResolutionState::Answer(AnswerState::new(
                        answer,
                        HeadUnifier::default(),
                        None,
                        Some(Rc::clone(this)),
                    )))),
                    Some(Err(e)) => Err(ResolveError::from(e)),
                    None => Ok(None),
                }
            }
            Mode::Planned(queries) => match queries.take() {
                Some(queries) => {
                    let base = self.base.child(this, self.base.sub.clone());
                    let state = CumulativeState::new(queries, 0, base);
                    Ok(Some(ResolutionState::query(QueryState::Cumulative(state))))
                }
                None => Ok(None),
            },
        }
    }

    pub(crate) fn propagate_answer(
        &mut self,
        answer: AnswerState,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        let merged = answer
            .translate(ctx.graph())
            .and_then(|sub| sub.merge(&self.base.sub));
        match merged {
            Some(sub) => Ok(Some(self.base.answer_for_parent(sub))),
            None => {
                ctx.metrics().record_unification_conflict();
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for ConjunctiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConjunctiveState")
            .field("query", &self.query)
            .field("planned", &matches!(self.mode, Mode::Planned(_)))
            .finish()
    }
}
