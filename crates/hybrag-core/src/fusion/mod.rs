//! Fusion of vector, fulltext, and semantic signals into one ranking.
//!
//! Raw scores are normalized per query, combined with a weight snapshot, and
//! ordered with a deterministic tie-break. The explainer reports the same
//! computation without influencing it.

pub mod explain;
pub mod normalize;
pub mod scoring;

pub use explain::{ExplainedResult, Explanation, SourceReport, explain};
pub use normalize::{NormalizedCandidate, normalize};
pub use scoring::{Breakdown, FusedResult, SourceContribution, fuse, single_source};
