use super::{AnswerState, ResolutionState, StateRef};
use crate::answer::Answer;
use crate::rule::InferenceRule;
use crate::unifier::{HeadUnifier, MultiUnifier};
use std::sync::Arc;

/// One rule body answer for a head that unifies with the query atom in
/// several ways. Yields one answer state per unifier.
pub struct MultiAnswerState {
    sub: Answer,
    unifiers: std::vec::IntoIter<HeadUnifier>,
    rule: Arc<InferenceRule>,
    parent: Option<StateRef>,
}

impl MultiAnswerState {
    pub fn new(
        sub: Answer,
        unifiers: &MultiUnifier,
        rule: Arc<InferenceRule>,
        parent: Option<StateRef>,
    ) -> Self {
        Self {
            sub,
            unifiers: unifiers.iter().cloned().collect::<Vec<_>>().into_iter(),
            rule,
            parent,
        }
    }

    pub fn generate_sub_goal(&mut self) -> Option<ResolutionState> {
        let unifier = self.unifiers.next()?;
        Some(ResolutionState::Answer(AnswerState::new(
            self.sub.clone(),
            unifier,
            Some(Arc::clone(&self.rule)),
            self.parent.clone(),
        )))
    }
}
