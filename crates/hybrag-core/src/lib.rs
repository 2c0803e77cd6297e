#![forbid(unsafe_code)]
//! hybrag-core library.
//!
//! Deterministic weighted fusion of three retrieval signals (vector,
//! fulltext, lexical overlap) into a single top-K ranking.
//!
//! # Conventions
//!
//! - **Errors**: Fusion and source paths return [`error::FusionError`];
//!   configuration loading uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Determinism**: Identical lists and weights always produce identical
//!   ordered output. No hashing-order dependence reaches the ranking.

pub mod candidate;
pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod retriever;
pub mod source;
pub mod strategy;
pub mod weights;

pub use candidate::{Candidate, CandidateList, SourceKind, SourceLists};
pub use engine::FusionEngine;
pub use error::{ErrorCode, FusionError};
pub use fusion::{Breakdown, Explanation, FusedResult, SourceContribution};
pub use retriever::{DegradePolicy, Retriever};
pub use source::CandidateSource;
pub use strategy::Strategy;
pub use weights::{SharedWeights, WeightConfig};
