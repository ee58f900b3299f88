//! Resolution metrics for profiling and analysis.
//!
//! When the `tracing` feature is enabled, counters are updated as the
//! resolution iterator runs. When disabled, all operations are no-ops with
//! zero overhead.
//!
//! # Usage
//!
//! ```rust,ignore
//! let session = Session::new(graph, rules);
//! let answers: Vec<_> = session.resolve(&query)?.collect();
//! println!("{}", session.metrics().report());
//! ```

#[cfg(feature = "tracing")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counters for one session.
///
/// All counters use relaxed ordering. Cloned sessions update the same
/// counters unless one is given `Session::with_fresh_metrics`.
#[cfg(feature = "tracing")]
pub struct ResolutionMetrics {
    /// States popped off the resolution stack
    pub states_visited: AtomicU64,
    /// Distinct answers returned to the caller
    pub answers_yielded: AtomicU64,
    /// Lookups answered from a complete cache entry
    pub cache_hits: AtomicU64,
    /// Lookups that went to the graph
    pub cache_misses: AtomicU64,
    /// Rule states created
    pub rules_applied: AtomicU64,
    /// Atomic queries not expanded because they recur on their own branch
    pub cycle_prunes: AtomicU64,
    /// Answers dropped because two bindings disagreed
    pub unification_conflicts: AtomicU64,
    /// Facts written to the graph
    pub materialisations: AtomicU64,
    /// Resolution rounds run
    pub iterations: AtomicU64,
    /// Deepest resolution stack observed
    pub max_stack_depth: AtomicU64,
}

#[cfg(feature = "tracing")]
impl ResolutionMetrics {
    pub fn new() -> Self {
        Self {
            states_visited: AtomicU64::new(0),
            answers_yielded: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            rules_applied: AtomicU64::new(0),
            cycle_prunes: AtomicU64::new(0),
            unification_conflicts: AtomicU64::new(0),
            materialisations: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            max_stack_depth: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_state_visited(&self) {
        self.states_visited.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_answer_yielded(&self) {
        self.answers_yielded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rule_applied(&self) {
        self.rules_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cycle_prune(&self) {
        self.cycle_prunes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unification_conflict(&self) {
        self.unification_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_materialisation(&self) {
        self.materialisations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the maximum stack depth if `depth` exceeds it.
    #[inline]
    pub fn update_max_stack_depth(&self, depth: u64) {
        let mut current = self.max_stack_depth.load(Ordering::Relaxed);
        while depth > current {
            match self.max_stack_depth.compare_exchange_weak(
                current,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(c) => current = c,
            }
        }
    }

    /// Snapshot of all counters.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            states_visited: self.states_visited.load(Ordering::Relaxed),
            answers_yielded: self.answers_yielded.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            rules_applied: self.rules_applied.load(Ordering::Relaxed),
            cycle_prunes: self.cycle_prunes.load(Ordering::Relaxed),
            unification_conflicts: self.unification_conflicts.load(Ordering::Relaxed),
            materialisations: self.materialisations.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            max_stack_depth: self.max_stack_depth.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.states_visited,
            &self.answers_yielded,
            &self.cache_hits,
            &self.cache_misses,
            &self.rules_applied,
            &self.cycle_prunes,
            &self.unification_conflicts,
            &self.materialisations,
            &self.iterations,
            &self.max_stack_depth,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(feature = "tracing")]
impl Default for ResolutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsReport {
    pub states_visited: u64,
    pub answers_yielded: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rules_applied: u64,
    pub cycle_prunes: u64,
    pub unification_conflicts: u64,
    pub materialisations: u64,
    pub iterations: u64,
    pub max_stack_depth: u64,
}

impl MetricsReport {
    /// Fraction of cache lookups served from complete entries.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Resolution Metrics ===")?;
        writeln!(f, "States visited:     {}", self.states_visited)?;
        writeln!(f, "Answers yielded:    {}", self.answers_yielded)?;
        writeln!(
            f,
            "Cache:              {} hits, {} misses ({:.1}% hit rate)",
            self.cache_hits,
            self.cache_misses,
            self.cache_hit_rate() * 100.0
        )?;
        writeln!(f, "Rules applied:      {}", self.rules_applied)?;
        writeln!(f, "Cycle prunes:       {}", self.cycle_prunes)?;
        writeln!(f, "Conflicts:          {}", self.unification_conflicts)?;
        writeln!(f, "Materialisations:   {}", self.materialisations)?;
        writeln!(
            f,
            "Iterations:         {} (max stack depth {})",
            self.iterations, self.max_stack_depth
        )?;
        Ok(())
    }
}

// No-op implementation when tracing is disabled
#[cfg(not(feature = "tracing"))]
pub struct ResolutionMetrics;

#[cfg(not(feature = "tracing"))]
impl ResolutionMetrics {
    #[inline]
    pub fn new() -> Self {
        ResolutionMetrics
    }
    #[inline]
    pub fn record_state_visited(&self) {}
    #[inline]
    pub fn record_answer_yielded(&self) {}
    #[inline]
    pub fn record_cache_hit(&self) {}
    #[inline]
    pub fn record_cache_miss(&self) {}
    #[inline]
    pub fn record_rule_applied(&self) {}
    #[inline]
    pub fn record_cycle_prune(&self) {}
    #[inline]
    pub fn record_unification_conflict(&self) {}
    #[inline]
    pub fn record_materialisation(&self) {}
    #[inline]
    pub fn record_iteration(&self) {}
    #[inline]
    pub fn update_max_stack_depth(&self, _depth: u64) {}
    #[inline]
    pub fn report(&self) -> MetricsReport {
        MetricsReport::default()
    }
    #[inline]
    pub fn reset(&self) {}
}

#[cfg(not(feature = "tracing"))]
impl Default for ResolutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
