//! Document rendering cache interface
//!
//! The rendered-document cache lives outside the engine. The engine only ever
//! purges entries; it never reads or fills them.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::DocumentId;

#[derive(Debug, Error)]
pub enum CacheError {
	#[error("cache backend unavailable: {0}")]
	Unavailable(String),

	#[error("cache operation failed: {0}")]
	Backend(String),
}

/// Cache of rendered documents keyed by (document id, version)
#[async_trait]
pub trait DocumentCache: Send + Sync {
	/// Drops every cached version of a document
	async fn invalidate(&self, document_id: DocumentId) -> Result<(), CacheError>;

	async fn has_entry(&self, document_id: DocumentId, version: &str) -> Result<bool, CacheError>;
}

/// Process-local cache, used by embedders without an external cache and by tests
#[derive(Debug, Default)]
pub struct InMemoryDocumentCache {
	entries: RwLock<HashMap<DocumentId, HashMap<String, String>>>,
	purges: RwLock<HashMap<DocumentId, u64>>,
}

impl InMemoryDocumentCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn put(&self, document_id: DocumentId, version: impl Into<String>, rendered: String) {
		self.entries
			.write()
			.await
			.entry(document_id)
			.or_default()
			.insert(version.into(), rendered);
	}

	/// How many times a document has been purged since creation
	pub async fn purge_count(&self, document_id: DocumentId) -> u64 {
		self.purges
			.read()
			.await
			.get(&document_id)
			.copied()
			.unwrap_or(0)
	}
}

#[async_trait]
impl DocumentCache for InMemoryDocumentCache {
	async fn invalidate(&self, document_id: DocumentId) -> Result<(), CacheError> {
		self.entries.write().await.remove(&document_id);
		*self.purges.write().await.entry(document_id).or_insert(0) += 1;
		Ok(())
	}

	async fn has_entry(&self, document_id: DocumentId, version: &str) -> Result<bool, CacheError> {
		Ok(self
			.entries
			.read()
			.await
			.get(&document_id)
			.is_some_and(|versions| versions.contains_key(version)))
	}
}
