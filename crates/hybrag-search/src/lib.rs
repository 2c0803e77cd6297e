#![deny(unsafe_code)]
//! hybrag-search library.
//!
//! SQLite document store, the three candidate sources that feed
//! `hybrag-core`'s fusion engine, embedders, JSONL ingestion, and the
//! retrieve-then-generate answer pipeline.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types; candidate sources map
//!   failures to `FusionError::SourceUnavailable`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Unsafe**: Only `vec_ext` registers the `sqlite-vec` extension.

pub mod embed;
pub mod ingest;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod vec_ext;

pub use embed::{Embedder, HashEmbedder, embedder_from_config};
pub use ingest::{IngestReport, embed_pending, ingest_file, load_jsonl};
pub use pipeline::{Answer, Pipeline, PipelineStats};
pub use sources::{FulltextSource, SemanticSource, VectorSource, build_retriever};
pub use store::{Document, DocumentStore, NewDocument};
