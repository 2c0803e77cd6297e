pub mod ask;
pub mod compare;
pub mod completions;
pub mod config;
pub mod explain;
pub mod ingest;
pub mod init;
pub mod search;
pub mod weights;
