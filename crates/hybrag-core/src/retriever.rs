//! Retrieval orchestration: query sources concurrently, then fuse.
//!
//! The retriever owns one [`CandidateSource`] per kind and a
//! [`FusionEngine`]. For each call it:
//!
//! 1. validates `top_k` before touching any source,
//! 2. queries every source the strategy needs on its own scoped thread,
//! 3. waits for all of them, applying the [`DegradePolicy`] to failures,
//! 4. ranks the gathered lists with one weight snapshot.

use std::fmt;
use std::str::FromStr;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::candidate::{CandidateList, SourceKind, SourceLists};
use crate::engine::FusionEngine;
use crate::error::{FusionError, Result};
use crate::fusion::{Explanation, FusedResult};
use crate::source::CandidateSource;
use crate::strategy::Strategy;
use crate::weights::WeightConfig;

/// Default hybrid pool size is `top_k * DEFAULT_POOL_MULTIPLIER`.
pub const DEFAULT_POOL_MULTIPLIER: usize = 2;

/// What to do when a source reports [`FusionError::SourceUnavailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradePolicy {
    /// Log a warning and treat the source as having returned nothing.
    #[default]
    Graceful,
    /// Fail the whole call.
    Strict,
}

impl fmt::Display for DegradePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Graceful => "graceful",
            Self::Strict => "strict",
        })
    }
}

impl FromStr for DegradePolicy {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graceful" => Ok(Self::Graceful),
            "strict" => Ok(Self::Strict),
            other => Err(FusionError::invalid_config(format!(
                "unknown degrade policy '{other}' (expected graceful or strict)"
            ))),
        }
    }
}

/// Sources plus engine, ready to answer queries.
pub struct Retriever {
    engine: FusionEngine,
    sources: Vec<Box<dyn CandidateSource>>,
    policy: DegradePolicy,
    pool_multiplier: usize,
}

impl fmt::Debug for Retriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retriever")
            .field("engine", &self.engine)
            .field(
                "sources",
                &self.sources.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            )
            .field("policy", &self.policy)
            .field("pool_multiplier", &self.pool_multiplier)
            .finish()
    }
}

impl Retriever {
    /// Build a retriever over at most one source per kind.
    ///
    /// A kind with no source behaves like an unavailable source.
    ///
    /// # Errors
    ///
    /// [`FusionError::Configuration`] if two sources share a kind.
    pub fn new(engine: FusionEngine, sources: Vec<Box<dyn CandidateSource>>) -> Result<Self> {
        for (idx, source) in sources.iter().enumerate() {
            if sources[..idx].iter().any(|s| s.kind() == source.kind()) {
                return Err(FusionError::invalid_config(format!(
                    "more than one {} source registered",
                    source.kind()
                )));
            }
        }

        Ok(Self {
            engine,
            sources,
            policy: DegradePolicy::default(),
            pool_multiplier: DEFAULT_POOL_MULTIPLIER,
        })
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: DegradePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Values below 1 are raised to 1.
    #[must_use]
    pub fn with_pool_multiplier(mut self, multiplier: usize) -> Self {
        self.pool_multiplier = multiplier.max(1);
        self
    }

    #[must_use]
    pub const fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    #[must_use]
    pub const fn policy(&self) -> DegradePolicy {
        self.policy
    }

    /// Replace the engine's weights. See [`FusionEngine::set_weights`].
    ///
    /// # Errors
    ///
    /// Rejects all-zero, negative, or non-finite weights.
    pub fn set_weights(&self, vector: f64, fulltext: f64, semantic: f64) -> Result<WeightConfig> {
        self.engine.set_weights(vector, fulltext, semantic)
    }

    /// Candidate pool requested from each source.
    #[must_use]
    pub const fn pool_size(&self, strategy: Strategy, top_k: usize) -> usize {
        match strategy {
            Strategy::Hybrid => top_k.saturating_mul(self.pool_multiplier),
            _ => top_k,
        }
    }

    /// Retrieve the top `top_k` documents for `query`.
    ///
    /// # Errors
    ///
    /// - [`FusionError::InvalidArgument`] if `top_k == 0`.
    /// - [`FusionError::Configuration`] for a hybrid call with all-zero weights.
    /// - [`FusionError::SourceUnavailable`] under [`DegradePolicy::Strict`].
    #[instrument(skip(self), fields(policy = %self.policy))]
    pub fn retrieve(&self, query: &str, top_k: usize, strategy: Strategy) -> Result<Vec<FusedResult>> {
        if top_k == 0 {
            return Err(FusionError::invalid_top_k(top_k));
        }

        let lists = self.gather(query, strategy, self.pool_size(strategy, top_k))?;
        let results = self.engine.rank(&lists, strategy, top_k)?;
        debug!(
            results = results.len(),
            distinct = lists.distinct_doc_count(),
            "retrieval complete"
        );
        Ok(results)
    }

    /// Hybrid retrieval with a full per-source report.
    ///
    /// # Errors
    ///
    /// Same as [`Retriever::retrieve`] with [`Strategy::Hybrid`].
    #[instrument(skip(self), fields(policy = %self.policy))]
    pub fn explain(&self, query: &str, top_k: usize) -> Result<Explanation> {
        if top_k == 0 {
            return Err(FusionError::invalid_top_k(top_k));
        }

        let lists = self.gather(query, Strategy::Hybrid, self.pool_size(Strategy::Hybrid, top_k))?;
        self.engine.explain(query, &lists, top_k)
    }

    /// Query every source `strategy` needs, concurrently, and collect their
    /// lists. Returns only once all of them have answered.
    ///
    /// # Errors
    ///
    /// [`FusionError::SourceUnavailable`] under [`DegradePolicy::Strict`];
    /// any other source error always propagates.
    pub fn gather(&self, query: &str, strategy: Strategy, pool_size: usize) -> Result<SourceLists> {
        let wanted = strategy.sources();

        let outcomes: Vec<(SourceKind, Result<CandidateList>)> = thread::scope(|scope| {
            let handles: Vec<_> = wanted
                .iter()
                .map(|&kind| {
                    let source = self.source(kind);
                    (
                        kind,
                        scope.spawn(move || match source {
                            Some(source) => source.search(query, pool_size),
                            None => Err(FusionError::source_unavailable(
                                kind,
                                "no source configured",
                            )),
                        }),
                    )
                })
                .collect();

            handles
                .into_iter()
                .map(|(kind, handle)| {
                    let outcome = handle.join().unwrap_or_else(|_| {
                        Err(FusionError::source_unavailable(kind, "source panicked"))
                    });
                    (kind, outcome)
                })
                .collect()
        });

        let mut lists = SourceLists::new();
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(list) if list.kind() == kind => {
                    debug!(source = %kind, candidates = list.len(), "source answered");
                    lists.insert(list);
                }
                Ok(list) => {
                    return Err(FusionError::malformed_candidates(format!(
                        "{kind} source returned a {} list",
                        list.kind()
                    )));
                }
                Err(err) if err.is_source_unavailable() && self.policy == DegradePolicy::Graceful => {
                    warn!(source = %kind, "degrading to empty list: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(lists)
    }

    fn source(&self, kind: SourceKind) -> Option<&dyn CandidateSource> {
        self.sources
            .iter()
            .find(|source| source.kind() == kind)
            .map(|source| &**source)
    }
}
