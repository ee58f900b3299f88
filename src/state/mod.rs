//! The resolution state tree.
//!
//! Resolution is a lazily built tree of states driven by an explicit stack
//! (see [`crate::resolver::ResolutionIterator`]). Every state answers
//! `generate_sub_goal`: the next child to push, or nothing once exhausted.
//! An [`AnswerState`] hands its substitution to its parent through
//! `propagate_answer`, which may in turn produce a new state for the
//! grandparent. Answer states without a parent are final answers.
//!
//! Query states are shared between the stack and their children's parent
//! links, so they live in `Rc<RefCell<_>>`. The tree is confined to one
//! thread; only the cache behind it is shared.

mod answer_state;
mod atomic;
mod conjunctive;
mod cumulative;
mod multi_answer;
mod neq_complement;
mod role_expansion;
mod rule_state;

pub use answer_state::AnswerState;
pub use atomic::{AtomicState, AtomicStateProducer, SubGoal};
pub use conjunctive::ConjunctiveState;
pub use cumulative::CumulativeState;
pub use multi_answer::MultiAnswerState;
pub use neq_complement::NeqComplementState;
pub use role_expansion::RoleExpansionState;
pub use rule_state::RuleState;

use crate::answer::Answer;
use crate::cache::QueryCache;
use crate::config::ReasonerConfig;
use crate::error::ResolveResult;
use crate::graph::Graph;
use crate::key::AtomicKey;
use crate::metrics::ResolutionMetrics;
use crate::query::{AtomicQuery, Query};
use crate::resolver::Session;
use crate::rule::{MaterialisationPolicy, RuleRepository};
use crate::unifier::HeadUnifier;
use std::cell::RefCell;
use std::rc::Rc;

pub type StateRef = Rc<RefCell<QueryState>>;

/// A node of the resolution tree.
pub enum ResolutionState {
    Answer(AnswerState),
    MultiAnswer(MultiAnswerState),
    RoleExpansion(RoleExpansionState),
    Query(StateRef),
}

impl ResolutionState {
    pub(crate) fn query(state: QueryState) -> Self {
        ResolutionState::Query(Rc::new(RefCell::new(state)))
    }

    pub fn is_answer_state(&self) -> bool {
        matches!(self, ResolutionState::Answer(_))
    }

    /// An answer with nowhere left to go: a final answer.
    pub fn is_top_state(&self) -> bool {
        matches!(self, ResolutionState::Answer(a) if a.is_top())
    }

    pub fn into_answer(self) -> Option<Answer> {
        match self {
            ResolutionState::Answer(a) => Some(a.into_substitution()),
            _ => None,
        }
    }

    pub fn generate_sub_goal(
        &mut self,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        match self {
            ResolutionState::Answer(s) => s.generate_sub_goal(ctx),
            ResolutionState::MultiAnswer(s) => Ok(s.generate_sub_goal()),
            ResolutionState::RoleExpansion(s) => Ok(s.generate_sub_goal()),
            ResolutionState::Query(s) => QueryState::generate_sub_goal(s, ctx),
        }
    }
}

/// States that resolve a query and receive answers from their children.
pub enum QueryState {
    Conjunctive(ConjunctiveState),
    Atomic(AtomicState),
    Cumulative(CumulativeState),
    NeqComplement(NeqComplementState),
    Rule(RuleState),
}

impl QueryState {
    pub fn base(&self) -> &QueryStateBase {
        match self {
            QueryState::Conjunctive(s) => s.base(),
            QueryState::Atomic(s) => s.base(),
            QueryState::Cumulative(s) => s.base(),
            QueryState::NeqComplement(s) => s.base(),
            QueryState::Rule(s) => s.base(),
        }
    }

    fn generate_sub_goal(
        this: &StateRef,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        let mut state = this.borrow_mut();
        match &mut *state {
            QueryState::Conjunctive(s) => s.generate_sub_goal(this, ctx),
            QueryState::Atomic(s) => s.generate_sub_goal(this, ctx),
            QueryState::Cumulative(s) => s.generate_sub_goal(this, ctx),
            QueryState::NeqComplement(s) => s.generate_sub_goal(this, ctx),
            QueryState::Rule(s) => s.generate_sub_goal(this, ctx),
        }
    }

    /// Receive an answer from a child. Returns the state that carries the
    /// answer further up, if any.
    pub fn propagate_answer(
        &mut self,
        answer: AnswerState,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        match self {
            QueryState::Conjunctive(s) => s.propagate_answer(answer, ctx),
            QueryState::Atomic(s) => s.propagate_answer(answer, ctx),
            QueryState::Cumulative(s) => s.propagate_answer(answer, ctx),
            QueryState::NeqComplement(s) => s.propagate_answer(answer, ctx),
            QueryState::Rule(s) => s.propagate_answer(answer, ctx),
        }
    }
}

/// Fields every query state has.
pub struct QueryStateBase {
    /// Bindings inherited from the parent.
    pub(crate) sub: Answer,
    pub(crate) parent: Option<StateRef>,
    /// Atomic queries being resolved on the path from the root.
    pub(crate) visited: VisitedGoals,
}

impl QueryStateBase {
    pub fn new(sub: Answer, parent: Option<StateRef>, visited: VisitedGoals) -> Self {
        Self {
            sub,
            parent,
            visited,
        }
    }

    pub fn substitution(&self) -> &Answer {
        &self.sub
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn visited(&self) -> &VisitedGoals {
        &self.visited
    }

    /// Base for a child of `this`.
    pub(crate) fn child(&self, this: &StateRef, sub: Answer) -> QueryStateBase {
        QueryStateBase::new(sub, Some(Rc::clone(this)), self.visited.clone())
    }

    /// Wrap `sub` as an answer for this state's parent. Query states share
    /// their parent's variables, so it passes up untranslated.
    pub(crate) fn answer_for_parent(&self, sub: Answer) -> ResolutionState {
        ResolutionState::Answer(AnswerState::new(
            sub,
            HeadUnifier::default(),
            None,
            self.parent.clone(),
        ))
    }
}

/// Persistent list of atomic query keys on one branch. Siblings share
/// their common prefix.
#[derive(Clone, Default)]
pub struct VisitedGoals(Option<Rc<VisitedNode>>);

struct VisitedNode {
    key: AtomicKey,
    rest: VisitedGoals,
}

impl VisitedGoals {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn contains(&self, key: &AtomicKey) -> bool {
        let mut current = &self.0;
        while let Some(node) = current {
            if node.key == *key {
                return true;
            }
            current = &node.rest.0;
        }
        false
    }

    pub fn with(&self, key: AtomicKey) -> VisitedGoals {
        VisitedGoals(Some(Rc::new(VisitedNode {
            key,
            rest: self.clone(),
        })))
    }

    pub fn len(&self) -> usize {
        let mut n = 0;
        let mut current = &self.0;
        while let Some(node) = current {
            n += 1;
            current = &node.rest.0;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// What happened during one resolution round.
#[derive(Debug, Default)]
pub struct RoundStats {
    /// Answers added to the cache.
    pub new_answers: usize,
    /// Whether the cycle guard cut a branch.
    pub pruned: bool,
    /// Atomic queries whose rule resolution ran to exhaustion.
    pub exhausted: Vec<AtomicKey>,
}

/// What states see of the running resolution.
pub struct ResolutionContext<'a> {
    session: &'a Session,
    round: &'a mut RoundStats,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(session: &'a Session, round: &'a mut RoundStats) -> Self {
        Self { session, round }
    }

    pub fn session(&self) -> &'a Session {
        self.session
    }

    pub fn graph(&self) -> &'a dyn Graph {
        self.session.graph()
    }

    pub fn rules(&self) -> &'a dyn RuleRepository {
        self.session.rules()
    }

    pub fn cache(&self) -> &'a QueryCache {
        self.session.cache()
    }

    pub fn policy(&self) -> &'a dyn MaterialisationPolicy {
        self.session.policy()
    }

    pub fn config(&self) -> &'a ReasonerConfig {
        self.session.config()
    }

    pub fn metrics(&self) -> &'a ResolutionMetrics {
        self.session.metrics()
    }

    pub fn round(&mut self) -> &mut RoundStats {
        &mut *self.round
    }
}

/// The state resolving `query` under `sub`: a complement state when the
/// query has inequalities, an atomic state for a single atom, a conjunctive
/// state otherwise.
pub(crate) fn sub_goal(
    query: &Query,
    sub: &Answer,
    parent: Option<StateRef>,
    visited: VisitedGoals,
    ctx: &mut ResolutionContext<'_>,
) -> ResolveResult<ResolutionState> {
    let query = query.with_substitution(sub);
    let base = QueryStateBase::new(sub.clone(), parent, visited);
    let state = if query.has_neq() {
        QueryState::NeqComplement(NeqComplementState::new(query, base)?)
    } else if let Some(atomic) = AtomicQuery::from_query(&query, ctx.config().max_key_permutations) {
        QueryState::Atomic(AtomicState::new(atomic, base, ctx)?)
    } else {
        QueryState::Conjunctive(ConjunctiveState::new(query, base, ctx)?)
    };
    Ok(ResolutionState::query(state))
}
