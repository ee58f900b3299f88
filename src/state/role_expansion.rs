use super::{AnswerState, ResolutionState, StateRef};
use crate::answer::Answer;
use crate::atom::Var;
use crate::concept::ConceptId;
use crate::graph::Schema;
use crate::unifier::HeadUnifier;
use smallvec::SmallVec;

/// Expands role variables over the role hierarchy.
///
/// A role variable matched against a specific role also plays every
/// super-role of it. One answer is yielded per combination of roles, the
/// matched ones first.
pub struct RoleExpansionState {
    sub: Answer,
    choices: Vec<(Var, Vec<ConceptId>)>,
    cursor: SmallVec<[usize; 2]>,
    done: bool,
    unifier: HeadUnifier,
    parent: Option<StateRef>,
}

impl RoleExpansionState {
    pub fn new<S: Schema + ?Sized>(
        sub: Answer,
        role_vars: &[Var],
        unifier: HeadUnifier,
        parent: Option<StateRef>,
        schema: &S,
    ) -> Self {
        let choices: Vec<(Var, Vec<ConceptId>)> = role_vars
            .iter()
            .filter_map(|&v| sub.get(v).map(|role| (v, schema.role_hierarchy(role))))
            .collect();
        let done = choices.iter().any(|(_, roles)| roles.is_empty());
        Self {
            cursor: SmallVec::from_elem(0, choices.len()),
            sub,
            choices,
            done,
            unifier,
            parent,
        }
    }

    pub fn generate_sub_goal(&mut self) -> Option<ResolutionState> {
        while !self.done {
            let answer = self.current();
            self.advance();
            if let Some(answer) = answer {
                return Some(ResolutionState::Answer(AnswerState::new(
                    answer,
                    self.unifier.clone(),
                    None,
                    self.parent.clone(),
                )));
            }
        }
        None
    }

    fn current(&self) -> Option<Answer> {
        let expanded: SmallVec<[Var; 2]> = self.choices.iter().map(|(v, _)| *v).collect();
        let mut answer = self.sub.filter(|v, _| !expanded.contains(&v));
        for ((var, roles), &i) in self.choices.iter().zip(self.cursor.iter()) {
            answer = answer.with(*var, roles[i])?;
        }
        Some(answer)
    }

    fn advance(&mut self) {
        for (i, (_, roles)) in self.choices.iter().enumerate() {
            self.cursor[i] += 1;
            if self.cursor[i] < roles.len() {
                return;
            }
            self.cursor[i] = 0;
        }
        self.done = true;
    }
}
