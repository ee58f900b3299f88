//! Query cache: answers of atomic queries keyed by equivalence class.
//!
//! Each entry stores answers in the variable space of its representative,
//! the first query of the class that reached the cache. Queries of the same
//! class read and write through the unifier between their canonical forms.
//!
//! Entries only ever grow. An entry is `fetched` once the graph's base
//! answers are in, and `complete` once resolution has derived every answer.

use crate::answer::Answer;
use crate::error::{ResolveError, ResolveResult};
use crate::graph::Graph;
use crate::key::AtomicKey;
use crate::query::AtomicQuery;
use crate::trace::trace;
use crate::unifier::Unifier;
use dashmap::DashMap;
use hashbrown::HashSet;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Answers of one equivalence class.
pub struct CacheEntry {
    representative: AtomicQuery,
    answers: RwLock<EntryAnswers>,
    fetched: AtomicBool,
    complete: AtomicBool,
}

#[derive(Default)]
struct EntryAnswers {
    list: Vec<Answer>,
    index: HashSet<Answer>,
}

impl CacheEntry {
    fn new(representative: AtomicQuery) -> Self {
        Self {
            representative,
            answers: RwLock::new(EntryAnswers::default()),
            fetched: AtomicBool::new(false),
            complete: AtomicBool::new(false),
        }
    }

    /// The query whose variables the answers are stored in.
    pub fn representative(&self) -> &AtomicQuery {
        &self.representative
    }

    /// Get the number of answers.
    pub fn len(&self) -> usize {
        self.answers.read().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the graph's base answers have been recorded.
    pub fn is_fetched(&self) -> bool {
        self.fetched.load(Ordering::SeqCst)
    }

    /// Check if resolution has derived every answer.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Add an answer in the representative's variables.
    /// Returns true if the answer was new.
    fn insert(&self, answer: Answer) -> bool {
        let mut answers = self.answers.write();
        if answers.index.contains(&answer) {
            return false;
        }
        answers.index.insert(answer.clone());
        answers.list.push(answer);
        true
    }

    fn snapshot(&self) -> Vec<Answer> {
        self.answers.read().list.clone()
    }

    /// Unifier from the representative's variables to `query`'s.
    fn unifier_to(&self, query: &AtomicQuery) -> ResolveResult<Unifier> {
        self.representative
            .canonical()
            .unifier_to(query.canonical())
            .ok_or_else(|| ResolveError::CacheCorruption {
                detail: format!(
                    "entry {} holds an inequivalent representative",
                    query.key()
                ),
            })
    }

    /// All answers translated into `query`'s variables.
    fn answers_for(&self, query: &AtomicQuery) -> ResolveResult<Vec<Answer>> {
        let unifier = self.unifier_to(query)?;
        self.snapshot()
            .iter()
            .map(|a| {
                unifier.apply(a).ok_or_else(|| ResolveError::CacheCorruption {
                    detail: format!("answer of {} conflicts under renaming", query.key()),
                })
            })
            .collect()
    }
}

/// Answers found for an atomic query.
#[derive(Debug, Clone, Default)]
pub struct CachedAnswers {
    /// Answers in the query's variables.
    pub answers: Vec<Answer>,
    /// Every answer is present; rules need not be consulted.
    pub complete: bool,
    /// Served from a complete entry without touching the graph.
    pub hit: bool,
}

/// Concurrent cache shared by all sessions that hold it.
#[derive(Default)]
pub struct QueryCache {
    entries: DashMap<AtomicKey, Arc<CacheEntry>>,
}

impl QueryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of equivalence classes cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Check if `query`'s class has an entry.
    pub fn contains(&self, query: &AtomicQuery) -> bool {
        self.entries.contains_key(query.key())
    }

    /// The entry for `query`'s class, if any.
    pub fn get(&self, query: &AtomicQuery) -> Option<Arc<CacheEntry>> {
        self.entries.get(query.key()).map(|e| Arc::clone(e.value()))
    }

    /// The entry for `query`'s class, created with `query` as representative
    /// if absent.
    pub fn entry(&self, query: &AtomicQuery) -> Arc<CacheEntry> {
        let entry = self
            .entries
            .entry(query.key().clone())
            .or_insert_with(|| Arc::new(CacheEntry::new(query.clone())));
        Arc::clone(entry.value())
    }

    /// Record an answer to `query`. Bindings outside the atom are dropped.
    /// Returns true if the answer was new to the class.
    pub fn record(&self, query: &AtomicQuery, answer: &Answer) -> ResolveResult<bool> {
        let entry = self.entry(query);
        let to_representative = entry.unifier_to(query)?.inverse();
        let translated = to_representative
            .apply(&answer.project(&query.vars()))
            .ok_or_else(|| ResolveError::CacheCorruption {
                detail: format!("answer to {} conflicts under renaming", query.key()),
            })?;
        Ok(entry.insert(translated))
    }

    /// Answers of `query`'s own class, if cached.
    pub fn answers(&self, query: &AtomicQuery) -> ResolveResult<Option<CachedAnswers>> {
        match self.get(query) {
            Some(entry) => Ok(Some(CachedAnswers {
                answers: entry.answers_for(query)?,
                complete: entry.is_complete(),
                hit: entry.is_complete(),
            })),
            None => Ok(None),
        }
    }

    /// Answers to `query` from the cache, falling back to the graph.
    ///
    /// A complete entry for the query's class answers directly. A query with
    /// bound variables may also be answered by filtering the complete entry
    /// of its unbound form. Otherwise the graph's base answers are recorded
    /// (once per class) and everything cached so far is returned.
    pub fn lookup(
        &self,
        query: &AtomicQuery,
        graph: &dyn Graph,
        max_permutations: usize,
    ) -> ResolveResult<CachedAnswers> {
        if let Some(entry) = self.get(query) {
            if entry.is_complete() {
                trace!(key = %query.key(), "cache_hit");
                return Ok(CachedAnswers {
                    answers: entry.answers_for(query)?,
                    complete: true,
                    hit: true,
                });
            }
        }

        if query.has_bindings() {
            let general = query.unbound(max_permutations);
            if let Some(entry) = self.get(&general).filter(|e| e.is_complete()) {
                trace!(key = %general.key(), "cache_hit_generalised");
                let sub = query.substitution();
                let answers = entry
                    .answers_for(&general)?
                    .into_iter()
                    .filter(|a| sub.iter().all(|(v, c)| a.get(v) == Some(c)))
                    .collect();
                return Ok(CachedAnswers {
                    answers,
                    complete: true,
                    hit: true,
                });
            }
        }

        trace!(key = %query.key(), "cache_miss");
        let entry = self.entry(query);
        if !entry.is_fetched() {
            for answer in graph.match_conjunction(query.query()) {
                self.record(query, &answer?)?;
            }
            entry.fetched.store(true, Ordering::SeqCst);
        }
        Ok(CachedAnswers {
            answers: entry.answers_for(query)?,
            complete: entry.is_complete(),
            hit: false,
        })
    }

    /// Mark the class of `key` as fully resolved.
    pub fn mark_complete(&self, key: &AtomicKey) {
        if let Some(entry) = self.entries.get(key) {
            entry.complete.store(true, Ordering::SeqCst);
        }
    }

    /// Check if `query`'s class is fully resolved.
    pub fn is_complete(&self, query: &AtomicQuery) -> bool {
        self.get(query).map_or(false, |e| e.is_complete())
    }
}

#[cfg(test)]
#[path = "tests/cache.rs"]
mod tests;
