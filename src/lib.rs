//! Catalog enrichment: ingest identity rows, fill configured fields from a
//! completion service, and keep a library, history and value dictionary.
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod export;
pub mod ingest;
pub mod model;
pub mod orchestrator;
pub mod standardize;
pub mod store;
