//! Collection tree engine
//!
//! Hierarchical classification trees ("collections") grouped under roles,
//! document membership over whole subtrees, OAI set aggregation, and cache
//! invalidation for documents whose rendering depends on the tree.

pub mod config;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod ops;

pub use config::EngineConfig;
pub use engine::Engine;
pub use infra::cache::{CacheError, DocumentCache, InMemoryDocumentCache};
pub use infra::db::Database;
pub use ops::collections::{CollectionError, CollectionResult, DeleteReport, OaiSet};
