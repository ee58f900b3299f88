use super::{
    AnswerState, QueryStateBase, ResolutionContext, ResolutionState, RoleExpansionState, RuleState,
    QueryState, StateRef,
};
use crate::answer::{Answer, Explanation};
use crate::atom::{Atom, Var};
use crate::error::{ResolveError, ResolveResult};
use crate::query::{AtomicQuery, Query};
use crate::rule::InferenceRule;
use crate::trace::debug;
use crate::unifier::{HeadUnifier, MultiUnifier};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

/// One unit of work for an atomic query.
pub enum SubGoal {
    /// A known answer, from the graph or the cache.
    Answer(Answer),
    /// A rule whose head unifies with the atom.
    Rule {
        rule: Arc<InferenceRule>,
        unifiers: MultiUnifier,
    },
}

/// Hands out an atomic query's sub-goals: known answers first, then rules.
pub struct AtomicStateProducer {
    answers: std::vec::IntoIter<Answer>,
    rules: VecDeque<(Arc<InferenceRule>, MultiUnifier)>,
}

impl AtomicStateProducer {
    pub fn new(answers: Vec<Answer>, rules: Vec<(Arc<InferenceRule>, MultiUnifier)>) -> Self {
        Self {
            answers: answers.into_iter(),
            rules: rules.into(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.answers.len() == 0 && self.rules.is_empty()
    }
}

impl Iterator for AtomicStateProducer {
    type Item = SubGoal;

    fn next(&mut self) -> Option<SubGoal> {
        if let Some(answer) = self.answers.next() {
            return Some(SubGoal::Answer(answer));
        }
        self.rules
            .pop_front()
            .map(|(rule, unifiers)| SubGoal::Rule { rule, unifiers })
    }
}

/// Resolves a single atom.
///
/// Answers come from the cache (which fetches base facts from the graph on
/// first use) and from every rule whose head unifies with the atom. Rules
/// are skipped when the atom recurs on its own branch, when its cache entry
/// is complete, or when it is ground and already answered. Every answer that
/// passes through is recorded in the cache.
pub struct AtomicState {
    base: QueryStateBase,
    query: AtomicQuery,
    producer: AtomicStateProducer,
    emitted: FxHashSet<Answer>,
    resolving: bool,
    reported: bool,
}

impl AtomicState {
    pub fn new(
        query: AtomicQuery,
        mut base: QueryStateBase,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Self> {
        let graph = ctx.graph();
        let key = query.key().clone();
        let cached = ctx
            .cache()
            .lookup(&query, graph, ctx.config().max_key_permutations)?;
        if cached.hit {
            ctx.metrics().record_cache_hit();
        } else {
            ctx.metrics().record_cache_miss();
        }

        let recursive = base.visited.contains(&key);
        if recursive {
            ctx.metrics().record_cycle_prune();
            ctx.round().pruned = true;
            debug!(key = %key, depth = base.visited.len(), "cycle_pruned");
        }

        let mut complete = cached.complete;
        if !complete && query.is_ground() && !cached.answers.is_empty() {
            // a ground atom has at most one answer
            ctx.cache().mark_complete(&key);
            complete = true;
        }

        let resolving = ctx.config().infer && !recursive && !complete;
        let mut rules = Vec::new();
        if resolving {
            for rule in ctx.rules().rules_concluding(query.atom()) {
                let unifiers = query.atom().unify_with_head(&rule.head, graph);
                if !unifiers.is_empty() {
                    rules.push((rule, unifiers));
                }
            }
        }
        if !recursive {
            base.visited = base.visited.with(key);
        }

        Ok(Self {
            base,
            producer: AtomicStateProducer::new(cached.answers, rules),
            query,
            emitted: FxHashSet::default(),
            resolving,
            reported: false,
        })
    }

    pub fn base(&self) -> &QueryStateBase {
        &self.base
    }

    pub fn query(&self) -> &AtomicQuery {
        &self.query
    }

    pub(crate) fn generate_sub_goal(
        &mut self,
        this: &StateRef,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        match self.producer.next() {
            Some(SubGoal::Answer(answer)) => Ok(Some(ResolutionState::Answer(AnswerState::new(
                answer,
                HeadUnifier::default(),
                None,
                Some(Rc::clone(this)),
            )))),
            Some(SubGoal::Rule { rule, unifiers }) => {
                ctx.metrics().record_rule_applied();
                debug!(rule = rule.id, unifiers = unifiers.len(), "rule_applied");
                let base = self.base.child(this, Answer::new());
                let state = RuleState::new(rule, unifiers, &self.query, base);
                Ok(Some(ResolutionState::query(QueryState::Rule(state))))
            }
            None => {
                if self.resolving && !self.reported {
                    self.reported = true;
                    ctx.round().exhausted.push(self.query.key().clone());
                }
                Ok(None)
            }
        }
    }

    pub(crate) fn propagate_answer(
        &mut self,
        answer: AnswerState,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<ResolutionState>> {
        let derived = match self.consume_answer(answer, ctx)? {
            Some(derived) => derived,
            None => return Ok(None),
        };
        if !self.emitted.insert(derived.clone()) {
            return Ok(None);
        }
        let bound = self.query.substitution();
        let role_vars: SmallVec<[Var; 2]> = self
            .query
            .atom()
            .role_vars()
            .into_iter()
            .filter(|v| !bound.contains(*v))
            .collect();
        let unifier = HeadUnifier::default();
        if role_vars.is_empty() {
            return Ok(Some(ResolutionState::Answer(AnswerState::new(
                derived,
                unifier,
                None,
                self.base.parent.clone(),
            ))));
        }
        Ok(Some(ResolutionState::RoleExpansion(RoleExpansionState::new(
            derived,
            &role_vars,
            unifier,
            self.base.parent.clone(),
            ctx.graph(),
        ))))
    }

    /// Turn a child's answer into an answer to this atom and record it.
    /// None when the answer does not fit the query.
    pub(crate) fn consume_answer(
        &mut self,
        answer: AnswerState,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Option<Answer>> {
        let rule = match answer.rule().cloned() {
            Some(rule) => rule,
            None => {
                let sub = answer.into_substitution();
                if ctx.cache().record(&self.query, &sub)? {
                    ctx.round().new_answers += 1;
                }
                return Ok(Some(sub));
            }
        };

        let premise = answer.substitution().clone();
        let mut head_answer = premise.project(&rule.head.vars());
        if ctx
            .policy()
            .requires_materialisation(&rule, self.query.atom())
        {
            head_answer = self.materialise(&rule, head_answer, ctx)?;
        }

        let graph = ctx.graph();
        let translated = match answer.unifier().apply(&head_answer, graph) {
            Some(t) => t,
            None => {
                ctx.metrics().record_unification_conflict();
                return Ok(None);
            }
        };
        let derived = match translated.merge(&self.query.substitution()) {
            Some(d) => d.project(&self.query.vars()),
            None => {
                ctx.metrics().record_unification_conflict();
                return Ok(None);
            }
        };
        if !self.satisfies_values(&derived, ctx)? {
            return Ok(None);
        }
        let derived = derived.explain(Explanation::Rule {
            rule: rule.id,
            premise,
        });
        if ctx.cache().record(&self.query, &derived)? {
            ctx.round().new_answers += 1;
        }
        Ok(Some(derived))
    }

    /// Value predicates of the query hold for a rule-derived answer.
    fn satisfies_values(
        &self,
        answer: &Answer,
        ctx: &ResolutionContext<'_>,
    ) -> ResolveResult<bool> {
        let values: Vec<Atom> = self
            .query
            .query()
            .predicates()
            .filter(|p| matches!(p, Atom::Value { .. }))
            .cloned()
            .collect();
        if values.is_empty() {
            return Ok(true);
        }
        let check = Query::new(
            values
                .into_iter()
                .chain(answer.iter().map(|(v, c)| Atom::id(v, c))),
        );
        match ctx.graph().match_conjunction(&check).next() {
            Some(result) => result.map(|_| true).map_err(ResolveError::from),
            None => Ok(false),
        }
    }

    /// Persist the rule head for `head_answer` unless the fact is already
    /// known, and return the head answer with the stored fact's bindings.
    fn materialise(
        &self,
        rule: &InferenceRule,
        head_answer: Answer,
        ctx: &mut ResolutionContext<'_>,
    ) -> ResolveResult<Answer> {
        let bindings = Query::new(head_answer.iter().map(|(v, c)| Atom::id(v, c)));
        let head_query =
            AtomicQuery::from_parts(rule.head.clone(), &bindings, ctx.config().max_key_permutations);
        if let Some(cached) = ctx.cache().answers(&head_query)? {
            if let Some(existing) = cached
                .answers
                .into_iter()
                .find_map(|a| a.merge(&head_answer))
            {
                return Ok(existing.project(&rule.head.vars()));
            }
        }
        let stored = ctx
            .graph()
            .materialize(&rule.head, &head_answer)
            .map_err(|source| ResolveError::Materialisation {
                rule: rule.id,
                source,
            })?;
        ctx.metrics().record_materialisation();
        debug!(rule = rule.id, "materialised");
        ctx.cache().record(&head_query, &stored)?;
        Ok(stored)
    }
}
