//! Fusion weights and the shared, swappable weight handle.
//!
//! A [`WeightConfig`] is plain data. [`SharedWeights`] wraps one in an
//! `Arc<RwLock<_>>` so `set_weights` can replace it while searches are in
//! flight; each search copies out a single snapshot before scoring and never
//! looks at the lock again.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::candidate::SourceKind;
use crate::error::{FusionError, Result};

/// Non-negative multipliers applied to each source's normalized score.
///
/// Weights need not sum to 1; they are used as raw multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default = "default_vector_weight")]
    pub vector: f64,
    #[serde(default = "default_fulltext_weight")]
    pub fulltext: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            vector: default_vector_weight(),
            fulltext: default_fulltext_weight(),
            semantic: default_semantic_weight(),
        }
    }
}

const fn default_vector_weight() -> f64 {
    0.4
}

const fn default_fulltext_weight() -> f64 {
    0.3
}

const fn default_semantic_weight() -> f64 {
    0.3
}

impl WeightConfig {
    /// Build a validated config.
    ///
    /// # Errors
    ///
    /// [`FusionError::InvalidArgument`] for a negative or non-finite weight,
    /// [`FusionError::Configuration`] when all three are zero.
    pub fn new(vector: f64, fulltext: f64, semantic: f64) -> Result<Self> {
        let config = Self {
            vector,
            fulltext,
            semantic,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the weight invariants without constructing anything.
    ///
    /// # Errors
    ///
    /// Same as [`WeightConfig::new`].
    pub fn validate(&self) -> Result<()> {
        for kind in SourceKind::ALL {
            let weight = self.get(kind);
            if !weight.is_finite() {
                return Err(FusionError::invalid_weight(format!(
                    "{kind} weight must be finite, got {weight}"
                )));
            }
            if weight < 0.0 {
                return Err(FusionError::invalid_weight(format!(
                    "{kind} weight must be >= 0, got {weight}"
                )));
            }
        }

        if self.is_all_zero() {
            return Err(FusionError::zero_weights());
        }
        Ok(())
    }

    #[must_use]
    pub const fn get(&self, kind: SourceKind) -> f64 {
        match kind {
            SourceKind::Vector => self.vector,
            SourceKind::Fulltext => self.fulltext,
            SourceKind::Semantic => self.semantic,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.vector + self.fulltext + self.semantic
    }

    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        SourceKind::ALL.iter().all(|kind| self.get(*kind) == 0.0)
    }

    /// Each weight's share of the total, for display. All zeros when the
    /// total is zero.
    #[must_use]
    pub fn shares(&self) -> Self {
        let total = self.total();
        if total <= 0.0 || !total.is_finite() {
            return Self {
                vector: 0.0,
                fulltext: 0.0,
                semantic: 0.0,
            };
        }
        Self {
            vector: self.vector / total,
            fulltext: self.fulltext / total,
            semantic: self.semantic / total,
        }
    }
}

/// Cloneable handle to the engine's current weights.
///
/// Clones share state: a `set` through one handle is seen by every other.
#[derive(Debug, Clone, Default)]
pub struct SharedWeights {
    inner: Arc<RwLock<WeightConfig>>,
}

impl SharedWeights {
    /// Wrap an existing config as-is.
    ///
    /// The config is not validated here; an all-zero config is reported as a
    /// configuration error when a fusion tries to use it.
    #[must_use]
    pub fn new(config: WeightConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy out the current weights.
    #[must_use]
    pub fn snapshot(&self) -> WeightConfig {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and replace the current weights. Last writer wins.
    ///
    /// # Errors
    ///
    /// Same as [`WeightConfig::new`]; on error the current weights are kept.
    pub fn set(&self, vector: f64, fulltext: f64, semantic: f64) -> Result<WeightConfig> {
        let config = WeightConfig::new(vector, fulltext, semantic)?;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn defaults_match_documented_values() {
        let w = WeightConfig::default();
        assert!((w.vector - 0.4).abs() < f64::EPSILON);
        assert!((w.fulltext - 0.3).abs() < f64::EPSILON);
        assert!((w.semantic - 0.3).abs() < f64::EPSILON);
        assert!(w.validate().is_ok());
    }

    #[test]
    fn all_zero_is_configuration_error() {
        let err = WeightConfig::new(0.0, 0.0, 0.0).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.code(), ErrorCode::ZeroWeights);
    }

    #[test]
    fn negative_and_non_finite_are_invalid_arguments() {
        for bad in [-0.1, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = WeightConfig::new(bad, 1.0, 1.0).unwrap_err();
            assert!(err.is_invalid_argument(), "{bad} should be rejected");
            assert_eq!(err.code(), ErrorCode::InvalidWeight);
        }
    }

    #[test]
    fn single_positive_weight_is_enough() {
        assert!(WeightConfig::new(0.0, 0.0, 2.5).is_ok());
    }

    #[test]
    fn shares_sum_to_one() {
        let s = WeightConfig::new(2.0, 1.0, 1.0).unwrap().shares();
        assert!((s.vector - 0.5).abs() < 1e-12);
        assert!((s.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn shared_set_is_visible_through_clones() {
        let shared = SharedWeights::default();
        let other = shared.clone();
        other.set(1.0, 0.0, 0.0).unwrap();
        assert!((shared.snapshot().vector - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejected_set_keeps_previous_weights() {
        let shared = SharedWeights::default();
        assert!(shared.set(0.0, 0.0, 0.0).is_err());
        assert_eq!(shared.snapshot(), WeightConfig::default());
    }

    #[test]
    fn snapshot_is_detached_from_later_sets() {
        let shared = SharedWeights::default();
        let before = shared.snapshot();
        shared.set(0.1, 0.2, 0.7).unwrap();
        assert_eq!(before, WeightConfig::default());
    }

    #[test]
    fn deserializes_partial_tables_with_defaults() {
        let w: WeightConfig = toml::from_str("vector = 0.9").unwrap();
        assert!((w.vector - 0.9).abs() < f64::EPSILON);
        assert!((w.fulltext - 0.3).abs() < f64::EPSILON);
    }
}
