//! The candidate-source seam.
//!
//! Vector, fulltext, and semantic retrievers all implement
//! [`CandidateSource`]. The core never knows how a source produces its list,
//! only that it answers `search(query, pool_size)` with a validated
//! [`CandidateList`] or a [`FusionError::SourceUnavailable`].

use crate::candidate::{CandidateList, SourceKind};
use crate::error::{FusionError, Result};

/// One retrieval signal.
///
/// Implementations must be safe to call from several threads at once; the
/// retriever queries all sources concurrently.
pub trait CandidateSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Return up to `pool_size` candidates for `query`.
    ///
    /// # Errors
    ///
    /// [`FusionError::SourceUnavailable`] when the backing index is missing
    /// or cannot be read.
    fn search(&self, query: &str, pool_size: usize) -> Result<CandidateList>;
}

/// A source that always answers with the same list, truncated to the pool
/// size. Useful for wiring precomputed rankings into a retriever.
#[derive(Debug, Clone)]
pub struct StaticSource {
    list: CandidateList,
}

impl StaticSource {
    #[must_use]
    pub const fn new(list: CandidateList) -> Self {
        Self { list }
    }

    /// # Errors
    ///
    /// Same as [`CandidateList::from_pairs`].
    pub fn from_pairs<I, S>(kind: SourceKind, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        CandidateList::from_pairs(kind, pairs).map(Self::new)
    }
}

impl CandidateSource for StaticSource {
    fn kind(&self) -> SourceKind {
        self.list.kind()
    }

    fn search(&self, _query: &str, pool_size: usize) -> Result<CandidateList> {
        let candidates = self.list.iter().take(pool_size).cloned().collect();
        CandidateList::new(self.list.kind(), candidates)
    }
}

/// A source that is known to be down, reporting the same reason every call.
///
/// Stands in for a source whose index could not be opened at all.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    kind: SourceKind,
    reason: String,
}

impl UnavailableSource {
    pub fn new(kind: SourceKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl CandidateSource for UnavailableSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn search(&self, _query: &str, _pool_size: usize) -> Result<CandidateList> {
        Err(FusionError::source_unavailable(self.kind, self.reason.clone()))
    }
}
