use super::{ResolutionContext, ResolutionState, StateRef};
use crate::answer::Answer;
use crate::error::ResolveResult;
use crate::graph::Schema;
use crate::rule::InferenceRule;
use crate::unifier::HeadUnifier;
use std::sync::Arc;

/// A leaf carrying one answer to its parent.
///
/// The substitution is in the child's variables; the unifier translates it
/// into the parent's. Answers derived by a rule carry the rule, and their
/// substitution is the rule body answer.
pub struct AnswerState {
    sub: Answer,
    unifier: HeadUnifier,
    rule: Option<Arc<InferenceRule>>,
    parent: Option<StateRef>,
}

impl AnswerState {
    pub fn new(
        sub: Answer,
        unifier: HeadUnifier,
        rule: Option<Arc<InferenceRule>>,
        parent: Option<StateRef>,
    ) -> Self {
        Self {
            sub,
            unifier,
            rule,
            parent,
        }
    }

    pub fn substitution(&self) -> &Answer {
        &self.sub
    }

    pub fn into_substitution(self) -> Answer {
        self.sub
    }

    pub fn unifier(&self) -> &HeadUnifier {
        &self.unifier
    }

    pub fn rule(&self) -> Option<&Arc<InferenceRule>> {
        self.rule.as_ref()
    }

    pub fn is_top(&self) -> bool {
        self.parent.is_none()
    }

    /// The substitution in the parent's variables. None on a binding conflict.
    pub fn translate<S: Schema + ?Sized>(&self, schema: &S) -> Option<Answer> {
        self.unifier.apply(&self.sub, schema)
    }

    /// Hand the answer to the parent, once.
    pub fn generate_sub_goal(
        &mut self,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        let parent = match self.parent.take() {
            Some(parent) => parent,
            None => return Ok(None),
        };
        let answer = AnswerState {
            sub: self.sub.clone(),
            unifier: self.unifier.clone(),
            rule: self.rule.take(),
            parent: None,
        };
        let mut parent = parent.borrow_mut();
        parent.propagate_answer(answer, ctx)
    }
}
