//! Run-wide comparison settings.
//!
//! A [`CompareConfig`] is built once at start-up and handed to every
//! comparison by reference; nothing in the library reads global state.

// Defaults for parameters
const STRATEGY_DEFAULT: MatchingStrategy = MatchingStrategy::Exact;
const ROOTED_DEFAULT: bool = false;
const ALIGNMENTS_DEFAULT: bool = false;
const PRUNE_DEFAULT: bool = false;

/// How the matching metrics compute their assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchingStrategy {
    /// Full intersection matrix over all non-root internal nodes. The only
    /// strategy that can report an alignment.
    #[default]
    Exact,
    /// Bitset partitions with the shared ones removed before the solve.
    RfPruned,
    /// Tolerates different leaf sets; leaves take part as size-1 clusters.
    FreeLeafSet,
}

/// Settings shared by all comparisons of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareConfig {
    pub(crate) strategy: MatchingStrategy,
    pub(crate) rooted: bool,
    pub(crate) alignments: bool,
    pub(crate) prune: bool,
}

/// Builder object to set custom comparison settings.
#[derive(Debug, Clone, Default)]
pub struct CompareConfigBuilder {
    strategy: Option<MatchingStrategy>,
    rooted: Option<bool>,
    alignments: Option<bool>,
    prune: Option<bool>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CompareConfig {
    /// Enters the builder pattern, allowing custom settings to be set using
    /// various setter methods.
    pub fn builder() -> CompareConfigBuilder {
        CompareConfigBuilder::default()
    }

    pub fn strategy(&self) -> MatchingStrategy {
        self.strategy
    }

    /// When set, split metrics keep a bifurcating root as given instead of
    /// collapsing it.
    pub fn rooted(&self) -> bool {
        self.rooted
    }

    pub fn prune(&self) -> bool {
        self.prune
    }

    /// Alignments are only produced by the exact strategy.
    pub fn emits_alignments(&self) -> bool {
        self.alignments && self.strategy == MatchingStrategy::Exact
    }
}

impl CompareConfigBuilder {
    /// Sets the matching strategy. Defaults to `Exact`.
    pub fn strategy(mut self, strategy: MatchingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Treat input trees as rooted for split metrics. Defaults to false.
    pub fn rooted(mut self, rooted: bool) -> Self {
        self.rooted = Some(rooted);
        self
    }

    /// Request node-to-node alignments from matching metrics. Ignored (with
    /// a warning at build time) unless the strategy is `Exact`.
    pub fn alignments(mut self, alignments: bool) -> Self {
        self.alignments = Some(alignments);
        self
    }

    /// Restrict both trees of a pair to their common leaves before comparing.
    /// Defaults to false.
    pub fn prune(mut self, prune: bool) -> Self {
        self.prune = Some(prune);
        self
    }

    /// Finishes the building of the configuration.
    pub fn build(self) -> CompareConfig {
        let strategy = self.strategy.unwrap_or(STRATEGY_DEFAULT);
        let alignments = self.alignments.unwrap_or(ALIGNMENTS_DEFAULT);
        if alignments && strategy != MatchingStrategy::Exact {
            log::warn!("alignments are only available with the exact strategy, {strategy:?} produces none");
        }
        CompareConfig {
            strategy,
            rooted: self.rooted.unwrap_or(ROOTED_DEFAULT),
            alignments,
            prune: self.prune.unwrap_or(PRUNE_DEFAULT),
        }
    }
}
