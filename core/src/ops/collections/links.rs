//! # Document Link Index
//!
//! Many-to-many links between documents and collection nodes. Reads against a
//! subtree resolve the subtree through the closure table in the same
//! statement, so a concurrent move is seen either entirely or not at all.
//!
//! Every mutation purges the cached rendering of the documents it touched,
//! after the transaction committed.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
	sea_query::{OnConflict, SelectStatement},
	ActiveValue::Set,
	ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
	QueryOrder, QuerySelect, QueryTrait, TransactionTrait,
};
use tracing::debug;

use super::cache_broker::CacheInvalidationBroker;
use super::error::{CollectionError, CollectionResult};
use super::hierarchy::HierarchyQuery;
use super::node_store::{NodeStore, CHUNK_SIZE};
use crate::domain::{CollectionId, DocumentId, ServerState};
use crate::infra::db::entities::{collection_role, document, link_document_collection};
use crate::infra::db::RetryPolicy;

/// Links documents to collections and answers subtree membership queries.
#[derive(Clone)]
pub struct DocumentLinkIndex {
	db: Arc<DatabaseConnection>,
	broker: CacheInvalidationBroker,
	retry: RetryPolicy,
}

impl DocumentLinkIndex {
	pub fn new(db: Arc<DatabaseConnection>, broker: CacheInvalidationBroker, retry: RetryPolicy) -> Self {
		Self { db, broker, retry }
	}

	/// Links a document to a collection. Linking twice is a no-op.
	///
	/// Returns whether a new link was created.
	pub async fn link(
		&self,
		document_id: DocumentId,
		collection_id: CollectionId,
	) -> CollectionResult<bool> {
		let created = self.retry.run("link_document", move || async move {
			let txn = self.db.begin().await?;
			let created = Self::link_in(&txn, document_id, collection_id).await?;
			txn.commit().await?;
			Ok::<_, CollectionError>(created)
		})
		.await?;

		if created {
			self.broker.invalidate(document_id).await;
		}

		Ok(created)
	}

	/// Removes one link. Returns whether a link existed.
	pub async fn unlink(
		&self,
		document_id: DocumentId,
		collection_id: CollectionId,
	) -> CollectionResult<bool> {
		let removed = self.retry.run("unlink_document", move || async move {
			let result = link_document_collection::Entity::delete_many()
				.filter(link_document_collection::Column::DocumentId.eq(document_id))
				.filter(link_document_collection::Column::CollectionId.eq(collection_id))
				.exec(self.db.as_ref())
				.await?;
			Ok::<_, CollectionError>(result.rows_affected > 0)
		})
		.await?;

		if removed {
			debug!(document_id, collection_id, "Unlinked document");
			self.broker.invalidate(document_id).await;
		}

		Ok(removed)
	}

	/// Removes every link of a document. Returns the number of links removed.
	pub async fn unlink_all(&self, document_id: DocumentId) -> CollectionResult<u64> {
		let removed = self.retry.run("unlink_document_everywhere", move || async move {
			Self::unlink_document_in(self.db.as_ref(), document_id).await
		})
		.await?;

		if removed > 0 {
			self.broker.invalidate(document_id).await;
		}

		Ok(removed)
	}

	/// Removes every link into the given collections. Returns the documents
	/// that lost at least one link.
	pub async fn unlink_subtree(
		&self,
		collection_ids: &BTreeSet<CollectionId>,
	) -> CollectionResult<BTreeSet<DocumentId>> {
		let ids: Vec<CollectionId> = collection_ids.iter().copied().collect();
		let ids = &ids;

		let affected = self.retry.run("unlink_collections", move || async move {
			let txn = self.db.begin().await?;
			let affected = Self::remove_links_in(&txn, ids).await?;
			txn.commit().await?;
			Ok::<_, CollectionError>(affected)
		})
		.await?;

		self.broker.invalidate_documents(affected.iter().copied()).await;

		Ok(affected)
	}

	/// Documents linked directly to the collection.
	pub async fn documents_of(&self, collection_id: CollectionId) -> CollectionResult<BTreeSet<DocumentId>> {
		let db = self.db.as_ref();
		NodeStore::find(db, collection_id).await?;

		let ids: Vec<DocumentId> = link_document_collection::Entity::find()
			.select_only()
			.column(link_document_collection::Column::DocumentId)
			.filter(link_document_collection::Column::CollectionId.eq(collection_id))
			.into_tuple()
			.all(db)
			.await?;

		Ok(ids.into_iter().collect())
	}

	/// Documents linked anywhere in the subtree, the collection itself included.
	pub async fn documents_of_subtree(
		&self,
		collection_id: CollectionId,
	) -> CollectionResult<BTreeSet<DocumentId>> {
		Self::subtree_documents_in(self.db.as_ref(), collection_id, false).await
	}

	/// Like `documents_of_subtree`, restricted to published documents.
	pub async fn published_documents_of_subtree(
		&self,
		collection_id: CollectionId,
	) -> CollectionResult<BTreeSet<DocumentId>> {
		Self::subtree_documents_in(self.db.as_ref(), collection_id, true).await
	}

	/// Number of distinct documents linked into the subtree.
	pub async fn count_subtree_entries(
		&self,
		collection_id: CollectionId,
		published_only: bool,
	) -> CollectionResult<u64> {
		Self::count_subtree_entries_in(self.db.as_ref(), collection_id, published_only).await
	}

	/// Collections a document is linked to, in id order.
	pub async fn collections_of(&self, document_id: DocumentId) -> CollectionResult<Vec<CollectionId>> {
		Ok(link_document_collection::Entity::find()
			.select_only()
			.column(link_document_collection::Column::CollectionId)
			.filter(link_document_collection::Column::DocumentId.eq(document_id))
			.order_by_asc(link_document_collection::Column::CollectionId)
			.into_tuple()
			.all(self.db.as_ref())
			.await?)
	}

	/// Inserts a link after checking the role's assignment rules.
	pub async fn link_in<C: ConnectionTrait>(
		db: &C,
		document_id: DocumentId,
		collection_id: CollectionId,
	) -> CollectionResult<bool> {
		let node = NodeStore::find(db, collection_id).await?;
		document::Entity::find_by_id(document_id)
			.one(db)
			.await?
			.ok_or_else(|| CollectionError::document_not_found(document_id))?;

		let role = collection_role::Entity::find_by_id(node.role_id)
			.one(db)
			.await?
			.ok_or_else(|| CollectionError::role_not_found(node.role_id))?;

		if node.is_root() && !role.assign_root {
			return Err(CollectionError::AssignmentNotAllowed {
				document: document_id,
				collection: collection_id,
				reason: "the role does not accept documents on its root",
			});
		}
		if role.assign_leaves_only && NodeStore::has_children(db, collection_id).await? {
			return Err(CollectionError::AssignmentNotAllowed {
				document: document_id,
				collection: collection_id,
				reason: "the role only accepts documents on leaf collections",
			});
		}

		let link = link_document_collection::ActiveModel {
			document_id: Set(document_id),
			collection_id: Set(collection_id),
			added_at: Set(Utc::now()),
		};
		let inserted = link_document_collection::Entity::insert(link)
			.on_conflict(
				OnConflict::columns([
					link_document_collection::Column::DocumentId,
					link_document_collection::Column::CollectionId,
				])
				.do_nothing()
				.to_owned(),
			)
			.exec_without_returning(db)
			.await?;

		if inserted > 0 {
			debug!(document_id, collection_id, "Linked document");
		}

		Ok(inserted > 0)
	}

	/// Deletes every link into `collection_ids` and returns the documents that
	/// were linked there.
	pub async fn remove_links_in<C: ConnectionTrait>(
		db: &C,
		collection_ids: &[CollectionId],
	) -> CollectionResult<BTreeSet<DocumentId>> {
		let mut affected = BTreeSet::new();
		for chunk in collection_ids.chunks(CHUNK_SIZE) {
			let documents: Vec<DocumentId> = link_document_collection::Entity::find()
				.select_only()
				.column(link_document_collection::Column::DocumentId)
				.distinct()
				.filter(link_document_collection::Column::CollectionId.is_in(chunk.to_vec()))
				.into_tuple()
				.all(db)
				.await?;
			affected.extend(documents);

			link_document_collection::Entity::delete_many()
				.filter(link_document_collection::Column::CollectionId.is_in(chunk.to_vec()))
				.exec(db)
				.await?;
		}

		Ok(affected)
	}

	pub async fn unlink_document_in<C: ConnectionTrait>(
		db: &C,
		document_id: DocumentId,
	) -> CollectionResult<u64> {
		let result = link_document_collection::Entity::delete_many()
			.filter(link_document_collection::Column::DocumentId.eq(document_id))
			.exec(db)
			.await?;
		Ok(result.rows_affected)
	}

	/// Distinct documents linked into the subtree of `collection_id`.
	pub async fn subtree_documents_in<C: ConnectionTrait>(
		db: &C,
		collection_id: CollectionId,
		published_only: bool,
	) -> CollectionResult<BTreeSet<DocumentId>> {
		NodeStore::find(db, collection_id).await?;

		let ids: Vec<DocumentId> = Self::subtree_links_query(collection_id, published_only)
			.select_only()
			.column(link_document_collection::Column::DocumentId)
			.distinct()
			.into_tuple()
			.all(db)
			.await?;

		Ok(ids.into_iter().collect())
	}

	pub async fn count_subtree_entries_in<C: ConnectionTrait>(
		db: &C,
		collection_id: CollectionId,
		published_only: bool,
	) -> CollectionResult<u64> {
		NodeStore::find(db, collection_id).await?;

		Ok(Self::subtree_links_query(collection_id, published_only)
			.select_only()
			.column(link_document_collection::Column::DocumentId)
			.distinct()
			.count(db)
			.await?)
	}

	fn subtree_links_query(
		collection_id: CollectionId,
		published_only: bool,
	) -> sea_orm::Select<link_document_collection::Entity> {
		link_document_collection::Entity::find()
			.filter(
				link_document_collection::Column::CollectionId
					.in_subquery(HierarchyQuery::subtree_ids_query(collection_id)),
			)
			.apply_if(published_only.then_some(()), |query, ()| {
				query.filter(
					link_document_collection::Column::DocumentId
						.in_subquery(Self::published_documents_query()),
				)
			})
	}

	fn published_documents_query() -> SelectStatement {
		document::Entity::find()
			.select_only()
			.column(document::Column::Id)
			.filter(document::Column::ServerState.eq(ServerState::Published.as_ref()))
			.into_query()
	}
}
