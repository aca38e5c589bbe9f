use crate::types::MAX_THREADS;

/// How node values are oriented inside a search tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scoring {
    /// Every node stores values from the maximizing player's point of view;
    /// maximizing nodes raise their value, minimizing nodes lower it.
    Minimax,
    /// Every node stores values relative to its own side and maximizes.
    /// Required for the transposition table.
    #[default]
    Negamax,
}

/// Walk strategy used below each work order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverKind {
    /// Native recursion; reference implementation.
    Recursive,
    /// Explicit stack of choice rounds.
    #[default]
    Iterative,
}

/// Options of a search, passed explicitly to every tree and driver.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    pub scoring: Scoring,
    pub driver: DriverKind,
    /// Memoize node values per tree. Only honoured with [`Scoring::Negamax`].
    pub transposition_table: bool,
    /// Transposition table size in megabytes.
    pub tt_mb_size: usize,
    /// Alpha-beta cut-offs. Disabling them gives the full reference search.
    pub pruning: bool,
    /// Build a textual trace of every tree operation.
    pub capture_trace: bool,
    pub n_threads: usize,
}

impl SearchConfig {
    #[must_use]
    pub fn new(scoring: Scoring) -> Self {
        SearchConfig {
            scoring,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_driver(mut self, driver: DriverKind) -> Self {
        self.driver = driver;
        self
    }

    /// Enable or disable the transposition table. `tt_mb_size` keeps the
    /// current value when `None`.
    #[must_use]
    pub fn with_transposition_table(mut self, enabled: bool, tt_mb_size: Option<usize>) -> Self {
        self.transposition_table = enabled;
        if let Some(value) = tt_mb_size {
            self.tt_mb_size = value;
        }
        self
    }

    #[must_use]
    pub fn with_pruning(mut self, pruning: bool) -> Self {
        self.pruning = pruning;
        self
    }

    #[must_use]
    pub fn with_trace(mut self, capture_trace: bool) -> Self {
        self.capture_trace = capture_trace;
        self
    }

    /// Override the number of worker threads when the default CPU count is
    /// not appropriate for the caller.
    #[must_use]
    pub fn with_threads(mut self, n_threads: Option<usize>) -> Self {
        if let Some(value) = n_threads {
            self.n_threads = value;
        }
        self
    }

    /// Worker count actually used by a dispatch pool.
    pub fn effective_threads(&self) -> usize {
        self.n_threads.clamp(1, MAX_THREADS)
    }

    /// `true` if trees built from this config own a transposition table.
    pub fn uses_transposition_table(&self) -> bool {
        self.transposition_table && self.pruning && self.scoring == Scoring::Negamax
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            scoring: Scoring::Negamax,
            driver: DriverKind::Iterative,
            transposition_table: true,
            tt_mb_size: 1,
            pruning: true,
            capture_trace: false,
            n_threads: num_cpus::get(),
        }
    }
}
