//! The fusion engine: current weights plus the pure ranking functions.

use crate::candidate::SourceLists;
use crate::error::Result;
use crate::fusion::{Explanation, FusedResult, explain, fuse, single_source};
use crate::strategy::Strategy;
use crate::weights::{SharedWeights, WeightConfig};

/// Owns the active [`WeightConfig`] and ranks already-gathered lists.
///
/// Cloning an engine shares its weights.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    weights: SharedWeights,
}

impl FusionEngine {
    /// Start from `weights` as given. An all-zero config is accepted here and
    /// rejected when a hybrid ranking is requested.
    #[must_use]
    pub fn new(weights: WeightConfig) -> Self {
        Self::with_shared(SharedWeights::new(weights))
    }

    #[must_use]
    pub const fn with_shared(weights: SharedWeights) -> Self {
        Self { weights }
    }

    /// Snapshot of the current weights.
    #[must_use]
    pub fn weights(&self) -> WeightConfig {
        self.weights.snapshot()
    }

    #[must_use]
    pub const fn shared_weights(&self) -> &SharedWeights {
        &self.weights
    }

    /// Replace the active weights; in-flight rankings keep their snapshot.
    ///
    /// # Errors
    ///
    /// Rejects all-zero, negative, or non-finite weights without changing
    /// the current config.
    pub fn set_weights(&self, vector: f64, fulltext: f64, semantic: f64) -> Result<WeightConfig> {
        self.weights.set(vector, fulltext, semantic)
    }

    /// Rank gathered lists under `strategy`.
    ///
    /// Single-source strategies ignore weights and read only their own slot.
    ///
    /// # Errors
    ///
    /// See [`fuse`] and [`single_source`].
    pub fn rank(
        &self,
        lists: &SourceLists,
        strategy: Strategy,
        top_k: usize,
    ) -> Result<Vec<FusedResult>> {
        match strategy.single_source() {
            Some(kind) => single_source(lists.get(kind), top_k),
            None => {
                let snapshot = self.weights.snapshot();
                fuse(lists, &snapshot, top_k)
            }
        }
    }

    /// Hybrid ranking plus the per-source intermediates.
    ///
    /// # Errors
    ///
    /// See [`fuse`].
    pub fn explain(&self, query: &str, lists: &SourceLists, top_k: usize) -> Result<Explanation> {
        let snapshot = self.weights.snapshot();
        explain(query, lists, &snapshot, top_k)
    }
}
