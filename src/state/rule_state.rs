use super::{
    sub_goal, AnswerState, MultiAnswerState, QueryStateBase, ResolutionContext, ResolutionState,
    StateRef,
};
use crate::answer::Answer;
use crate::atom::Atom;
use crate::error::ResolveResult;
use crate::query::{AtomicQuery, Query};
use crate::rule::InferenceRule;
use crate::unifier::{HeadUnifier, MultiUnifier};
use std::sync::Arc;

/// Resolves a rule body on behalf of an atomic query.
///
/// Body answers go back to the atomic state tagged with the rule and the
/// head unifier, so the atomic state can derive (and explain) the head
/// answer. When the head unifies in exactly one way, the query's bindings
/// and value predicates are pushed into the body before it is resolved.
pub struct RuleState {
    base: QueryStateBase,
    rule: Arc<InferenceRule>,
    unifiers: MultiUnifier,
    body: Query,
    started: bool,
}

impl RuleState {
    pub fn new(
        rule: Arc<InferenceRule>,
        unifiers: MultiUnifier,
        query: &AtomicQuery,
        base: QueryStateBase,
    ) -> Self {
        let body = match unifiers.unique() {
            Some(unifier) => push_down(&rule, unifier, query),
            None => rule.body.clone(),
        };
        Self {
            base,
            rule,
            unifiers,
            body,
            started: false,
        }
    }

    pub fn base(&self) -> &QueryStateBase {
        &self.base
    }

    pub fn rule(&self) -> &Arc<InferenceRule> {
        &self.rule
    }

    /// The body as resolved, constraints pushed down included.
    pub fn body(&self) -> &Query {
        &self.body
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
        let child = sub_goal(
            &self.body,
            &Answer::new(),
            Some(std::rc::Rc::clone(this)),
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
        let premise = match answer.translate(ctx.graph()) {
            Some(premise) => premise,
            None => {
                ctx.metrics().record_unification_conflict();
                return Ok(None);
            }
        };
        let parent = self.base.parent.clone();
        let state = match self.unifiers.unique() {
            Some(unifier) => ResolutionState::Answer(AnswerState::new(
                premise,
                unifier.clone(),
                Some(Arc::clone(&self.rule)),
                parent,
            )),
            None => ResolutionState::MultiAnswer(MultiAnswerState::new(
                premise,
                &self.unifiers,
                Arc::clone(&self.rule),
                parent,
            )),
        };
        Ok(Some(state))
    }
}

/// The rule body with `Id` and `Value` constraints on query variables
/// restated over the head variables they unify with.
fn push_down(rule: &InferenceRule, unifier: &HeadUnifier, query: &AtomicQuery) -> Query {
    let body_vars = rule.body.vars();
    let sub = query.substitution();
    let mut atoms: Vec<Atom> = rule.body.atoms().to_vec();
    for (head_var, query_var) in unifier.unifier.pairs() {
        if !body_vars.contains(&head_var) {
            continue;
        }
        if let Some(concept) = sub.get(query_var) {
            atoms.push(Atom::id(head_var, concept));
        }
        for predicate in query.query().predicates() {
            if let Atom::Value { var, cmp, value } = predicate {
                if *var == query_var {
                    atoms.push(Atom::value(head_var, *cmp, value.clone()));
                }
            }
        }
    }
    Query::new(atoms)
}
