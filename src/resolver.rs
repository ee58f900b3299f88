//! Resolver - the session context and the answer iterator.
//!
//! A [`Session`] bundles everything resolution reads: the graph, the rules,
//! the shared query cache, the materialisation policy and the config.
//! [`Session::resolve`] returns a [`ResolutionIterator`] that drives the
//! state tree with an explicit stack and yields answers as they are found.
//!
//! When the query depends on recursive rules, one pass over the tree may
//! miss answers whose derivation was cut by the cycle guard. The iterator
//! then reruns the tree, now seeded by the cache, until a round adds
//! nothing new.

use crate::answer::Answer;
use crate::atom::Var;
use crate::cache::QueryCache;
use crate::config::ReasonerConfig;
use crate::error::ResolveResult;
use crate::graph::Graph;
use crate::metrics::ResolutionMetrics;
use crate::planner::{plan_query, Plan};
use crate::query::{AtomicQuery, Query};
use crate::rule::{dependent_rules, has_cycle, MaterialisationPolicy, RuleFlagPolicy, RuleRepository};
use crate::state::{sub_goal, ResolutionContext, ResolutionState, RoundStats, VisitedGoals};
use crate::symbol::SymbolStore;
use crate::trace::{debug, debug_span};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::sync::Arc;

/// Everything a resolution needs, passed explicitly.
///
/// Cloning is cheap and shares the graph, rules, cache and metrics. Sessions
/// built over the same cache (see [`Session::with_cache`]) may resolve on
/// different threads at once.
#[derive(Clone)]
pub struct Session {
    graph: Arc<dyn Graph>,
    rules: Arc<dyn RuleRepository>,
    cache: Arc<QueryCache>,
    policy: Arc<dyn MaterialisationPolicy>,
    config: ReasonerConfig,
    metrics: Arc<ResolutionMetrics>,
    symbols: Option<Arc<SymbolStore>>,
}

impl Session {
    /// A session with a fresh cache, default config and rules
    /// materialised according to their own flag.
    pub fn new<G, R>(graph: Arc<G>, rules: Arc<R>) -> Self
    where
        G: Graph + 'static,
        R: RuleRepository + 'static,
    {
        Self {
            graph,
            rules,
            cache: Arc::new(QueryCache::new()),
            policy: Arc::new(RuleFlagPolicy),
            config: ReasonerConfig::default(),
            metrics: Arc::new(ResolutionMetrics::new()),
            symbols: None,
        }
    }

    pub fn with_config(mut self, config: ReasonerConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing cache.
    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_policy<P: MaterialisationPolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Symbols used to name variables in errors.
    pub fn with_symbols(mut self, symbols: Arc<SymbolStore>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Separate metrics for this session; everything else stays shared.
    pub fn with_fresh_metrics(mut self) -> Self {
        self.metrics = Arc::new(ResolutionMetrics::new());
        self
    }

    pub fn graph(&self) -> &dyn Graph {
        &*self.graph
    }

    pub fn rules(&self) -> &dyn RuleRepository {
        &*self.rules
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn shared_cache(&self) -> Arc<QueryCache> {
        Arc::clone(&self.cache)
    }

    pub fn policy(&self) -> &dyn MaterialisationPolicy {
        &*self.policy
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ResolutionMetrics {
        &self.metrics
    }

    pub fn symbols(&self) -> Option<&SymbolStore> {
        self.symbols.as_deref()
    }

    /// Both levels of the resolution plan for `query`.
    pub fn plan(&self, query: &Query) -> ResolveResult<Plan> {
        query.validate(self.symbols())?;
        Ok(plan_query(query, self.graph(), self.rules(), &self.config)?)
    }

    /// Lazily resolve `query`. Answers are projected onto the selected
    /// variables and never repeat.
    pub fn resolve(&self, query: &Query) -> ResolveResult<ResolutionIterator<'_>> {
        query.validate(self.symbols())?;
        ResolutionIterator::new(self, query.clone())
    }

    /// Resolve `query` to completion.
    pub fn resolve_all(&self, query: &Query) -> ResolveResult<Vec<Answer>> {
        self.resolve(query)?.collect()
    }

    /// Forget every cached answer.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Whether `query` needs rounds until fixpoint: inference is on and the
    /// rules it depends on are recursive. An atomic query whose cache entry
    /// is complete never does.
    pub fn requires_reiteration(&self, query: &Query) -> bool {
        if !(self.config.infer && self.config.reiterate) {
            return false;
        }
        if let Some(atomic) = AtomicQuery::from_query(query, self.config.max_key_permutations) {
            if self.cache.is_complete(&atomic) {
                return false;
            }
        }
        let rules = dependent_rules(query, self.rules(), self.graph());
        has_cycle(&rules, self.graph())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("cached_classes", &self.cache.len())
            .finish()
    }
}

/// Pull-based driver over the resolution state tree.
///
/// Each call to `next` pops states off the stack until a final answer comes
/// up. A state that produced a child goes back under it, so the stack holds
/// the path of pending work. After an error the iterator is fused.
pub struct ResolutionIterator<'s> {
    session: &'s Session,
    query: Query,
    selected: SmallVec<[Var; 8]>,
    stack: Vec<ResolutionState>,
    round: RoundStats,
    /// Rounds started so far.
    iteration: usize,
    reiterate: bool,
    seen: FxHashSet<Answer>,
    done: bool,
}

impl<'s> ResolutionIterator<'s> {
    fn new(session: &'s Session, query: Query) -> ResolveResult<Self> {
        let reiterate = session.requires_reiteration(&query);
        let mut iter = Self {
            session,
            selected: query.selected_vars(),
            query,
            stack: Vec::new(),
            round: RoundStats::default(),
            iteration: 0,
            reiterate,
            seen: FxHashSet::default(),
            done: false,
        };
        iter.start_round()?;
        Ok(iter)
    }

    /// Rounds run so far, the current one included.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    fn start_round(&mut self) -> ResolveResult<()> {
        self.iteration += 1;
        self.session.metrics().record_iteration();
        let _span = debug_span!("round", iteration = self.iteration).entered();
        let mut ctx = ResolutionContext::new(self.session, &mut self.round);
        let root = sub_goal(&self.query, &Answer::new(), None, VisitedGoals::new(), &mut ctx)?;
        self.stack.push(root);
        Ok(())
    }

    /// Close the round. Returns true if another one was started.
    fn finish_round(&mut self) -> ResolveResult<bool> {
        let round = std::mem::take(&mut self.round);
        if round.new_answers == 0 || !round.pruned {
            for key in &round.exhausted {
                self.session.cache().mark_complete(key);
            }
        }
        debug!(
            iteration = self.iteration,
            new_answers = round.new_answers,
            pruned = round.pruned,
            completed = round.exhausted.len(),
            "round_finished"
        );
        let again = self.reiterate
            && round.new_answers > 0
            && self.iteration < self.session.config().max_iterations;
        if again {
            self.start_round()?;
        }
        Ok(again)
    }

    fn step(&mut self) -> ResolveResult<Option<Answer>> {
        let session = self.session;
        let metrics = session.metrics();
        loop {
            let mut state = match self.stack.pop() {
                Some(state) => state,
                None => {
                    if self.finish_round()? {
                        continue;
                    }
                    return Ok(None);
                }
            };
            metrics.record_state_visited();

            if state.is_top_state() {
                if let Some(answer) = state.into_answer() {
                    let answer = answer.project(&self.selected);
                    if self.seen.insert(answer.clone()) {
                        metrics.record_answer_yielded();
                        return Ok(Some(answer));
                    }
                }
                continue;
            }

            let mut ctx = ResolutionContext::new(self.session, &mut self.round);
            if let Some(child) = state.generate_sub_goal(&mut ctx)? {
                if !state.is_answer_state() {
                    self.stack.push(state);
                }
                self.stack.push(child);
                metrics.update_max_stack_depth(self.stack.len() as u64);
            }
        }
    }
}

impl Iterator for ResolutionIterator<'_> {
    type Item = ResolveResult<Answer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(answer)) => Some(Ok(answer)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.stack.clear();
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for ResolutionIterator<'_> {}

#[cfg(test)]
#[path = "tests/resolver.rs"]
mod tests;
