//! Minimal document registry
//!
//! Documents belong to the embedding framework; the tree only records their
//! id and publication state so published-only queries can filter on it.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, IntoActiveModel,
	TransactionTrait,
};
use tracing::debug;

use super::cache_broker::CacheInvalidationBroker;
use super::error::{CollectionError, CollectionResult};
use super::links::DocumentLinkIndex;
use crate::domain::{DocumentId, DocumentRecord, ServerState};
use crate::infra::db::entities::document;
use crate::infra::db::RetryPolicy;

#[derive(Clone)]
pub struct DocumentStore {
	db: Arc<DatabaseConnection>,
	broker: CacheInvalidationBroker,
	retry: RetryPolicy,
}

impl DocumentStore {
	pub fn new(db: Arc<DatabaseConnection>, broker: CacheInvalidationBroker, retry: RetryPolicy) -> Self {
		Self { db, broker, retry }
	}

	pub async fn create(&self, server_state: ServerState) -> CollectionResult<DocumentId> {
		let now = Utc::now();
		let model = document::ActiveModel {
			server_state: Set(server_state.to_string()),
			created_at: Set(now),
			updated_at: Set(now),
			..Default::default()
		}
		.insert(self.db.as_ref())
		.await?;

		debug!(document_id = model.id, %server_state, "Registered document");

		Ok(model.id)
	}

	pub async fn get(&self, id: DocumentId) -> CollectionResult<DocumentRecord> {
		document::Entity::find_by_id(id)
			.one(self.db.as_ref())
			.await?
			.map(DocumentRecord::from)
			.ok_or_else(|| CollectionError::document_not_found(id))
	}

	/// Changes the publication state and purges the cached rendering.
	pub async fn set_server_state(
		&self,
		id: DocumentId,
		server_state: ServerState,
	) -> CollectionResult<DocumentRecord> {
		let updated = self.retry.run("set_document_state", move || async move {
			let model = document::Entity::find_by_id(id)
				.one(self.db.as_ref())
				.await?
				.ok_or_else(|| CollectionError::document_not_found(id))?;

			let mut active = model.into_active_model();
			active.server_state = Set(server_state.to_string());
			active.updated_at = Set(Utc::now());
			Ok::<_, CollectionError>(active.update(self.db.as_ref()).await?)
		})
		.await?;

		self.broker.invalidate(id).await;

		Ok(updated.into())
	}

	/// Removes the document and all of its links.
	pub async fn delete(&self, id: DocumentId) -> CollectionResult<()> {
		self.retry.run("delete_document", move || async move {
			let txn = self.db.begin().await?;
			DocumentLinkIndex::unlink_document_in(&txn, id).await?;
			let result = document::Entity::delete_by_id(id).exec(&txn).await?;
			if result.rows_affected == 0 {
				return Err(CollectionError::document_not_found(id));
			}
			txn.commit().await?;
			Ok::<_, CollectionError>(())
		})
		.await?;

		self.broker.invalidate(id).await;

		Ok(())
	}
}
