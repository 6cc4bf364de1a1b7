//! Cache invalidation for documents whose rendering depends on the tree

use std::collections::BTreeSet;
use std::sync::Arc;

use sea_orm::ConnectionTrait;
use tracing::{debug, warn};

use super::error::CollectionResult;
use super::links::DocumentLinkIndex;
use crate::domain::{CollectionId, DocumentId};
use crate::infra::cache::DocumentCache;

/// Forwards purges to the external document cache.
///
/// A failed purge is logged and skipped; the structural change that caused it
/// has already been committed and is never rolled back for the cache's sake.
#[derive(Clone)]
pub struct CacheInvalidationBroker {
	cache: Arc<dyn DocumentCache>,
}

impl CacheInvalidationBroker {
	pub fn new(cache: Arc<dyn DocumentCache>) -> Self {
		Self { cache }
	}

	/// Purges one document. Returns whether the cache accepted the purge.
	pub async fn invalidate(&self, document_id: DocumentId) -> bool {
		match self.cache.invalidate(document_id).await {
			Ok(()) => true,
			Err(e) => {
				warn!(document_id, error = %e, "Failed to invalidate document cache");
				false
			}
		}
	}

	/// Purges each distinct document once. Returns how many purges succeeded.
	pub async fn invalidate_documents<I>(&self, document_ids: I) -> usize
	where
		I: IntoIterator<Item = DocumentId>,
	{
		let unique: BTreeSet<DocumentId> = document_ids.into_iter().collect();
		let mut invalidated = 0;
		for document_id in &unique {
			if self.invalidate(*document_id).await {
				invalidated += 1;
			}
		}

		if !unique.is_empty() {
			debug!(
				requested = unique.len(),
				invalidated,
				"Invalidated cached documents"
			);
		}

		invalidated
	}

	/// Purges every document linked anywhere in the subtree of `collection_id`.
	pub async fn invalidate_subtree<C: ConnectionTrait>(
		&self,
		db: &C,
		collection_id: CollectionId,
	) -> CollectionResult<usize> {
		let documents = DocumentLinkIndex::subtree_documents_in(db, collection_id, false).await?;
		Ok(self.invalidate_documents(documents).await)
	}
}
