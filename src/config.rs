/// Configuration for a resolution session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonerConfig {
    /// Consult rules. When false, queries are answered by pattern matching only.
    pub infer: bool,
    /// Rerun resolution to a fixpoint when the query depends on recursive rules.
    pub reiterate: bool,
    /// Upper bound on resolution rounds for a single query.
    pub max_iterations: usize,
    /// Check plan connectivity and log disconnected atoms.
    pub validate_plans: bool,
    /// Upper bound on role-player orders tried when computing a cache key.
    pub max_key_permutations: usize,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            infer: true,
            reiterate: true,
            max_iterations: 64,
            validate_plans: true,
            max_key_permutations: 720,
        }
    }
}

impl ReasonerConfig {
    /// Pattern matching only.
    pub fn without_inference() -> Self {
        Self {
            infer: false,
            ..Self::default()
        }
    }
}
