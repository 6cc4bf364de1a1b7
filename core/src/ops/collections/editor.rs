//! # Tree Editor
//!
//! Transactional entry point for every structural change to roles and their
//! collection trees. Each operation runs in one database transaction that is
//! repeated under the retry policy when SQLite reports contention. Cached
//! documents are purged only after the transaction committed.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
	sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
	TransactionTrait,
};
use serde::Serialize;
use tracing::info;

use super::cache_broker::CacheInvalidationBroker;
use super::error::{CollectionError, CollectionResult};
use super::hierarchy::HierarchyQuery;
use super::links::DocumentLinkIndex;
use super::node_store::{NodeStore, CHUNK_SIZE};
use super::roles::RoleStore;
use crate::config::EngineConfig;
use crate::domain::{
	ChildPosition, Collection, CollectionAttributes, CollectionId, CollectionRole, DocumentId,
	NewCollection, NewCollectionRole, RoleAttributes, RoleId,
};
use crate::infra::db::entities::document;
use crate::infra::db::RetryPolicy;

/// Outcome of a delete, reported after the cache has been purged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
	/// Removed collection ids, shallowest first
	pub removed_collections: Vec<CollectionId>,
	/// Documents that lost at least one link
	pub affected_documents: BTreeSet<DocumentId>,
	/// Purges the cache accepted
	pub invalidated: usize,
}

#[derive(Clone)]
pub struct TreeEditor {
	db: Arc<DatabaseConnection>,
	config: Arc<EngineConfig>,
	broker: CacheInvalidationBroker,
	retry: RetryPolicy,
}

impl TreeEditor {
	pub fn new(
		db: Arc<DatabaseConnection>,
		config: Arc<EngineConfig>,
		broker: CacheInvalidationBroker,
	) -> Self {
		let retry = RetryPolicy::from(&config.retry);
		Self {
			db,
			config,
			broker,
			retry,
		}
	}

	// Roles

	pub async fn create_role(&self, new_role: NewCollectionRole) -> CollectionResult<CollectionRole> {
		let new_role = &new_role;
		let role = self.retry.run("create_role", move || async move {
			let txn = self.db.begin().await?;
			let role = RoleStore::create(&txn, new_role).await?;
			txn.commit().await?;
			Ok::<_, CollectionError>(role)
		})
		.await?;

		info!(role_id = role.id, name = %role.name, "Created collection role");

		Ok(CollectionRole::from_model(role, None))
	}

	/// Updates role attributes. Documents linked into the role are purged when
	/// the change is visible in their rendering.
	pub async fn update_role(
		&self,
		role_id: RoleId,
		attrs: RoleAttributes,
	) -> CollectionResult<CollectionRole> {
		let attrs = &attrs;
		let (role, affected) = self.retry.run("update_role", move || async move {
			let txn = self.db.begin().await?;
			let current = RoleStore::view(&txn, RoleStore::get(&txn, role_id).await?).await?;
			let updated = RoleStore::update(&txn, role_id, attrs).await?;

			let affected = match current.root_id {
				Some(root_id) if attrs.changes_display_of(&current) => {
					DocumentLinkIndex::subtree_documents_in(&txn, root_id, false).await?
				}
				_ => BTreeSet::new(),
			};

			txn.commit().await?;
			Ok::<_, CollectionError>((CollectionRole::from_model(updated, current.root_id), affected))
		})
		.await?;

		self.broker.invalidate_documents(affected).await;

		Ok(role)
	}

	/// Deletes a role together with its whole tree and every link into it.
	pub async fn delete_role(&self, role_id: RoleId) -> CollectionResult<DeleteReport> {
		let (removed, affected) = self.retry.run("delete_role", move || async move {
			let txn = self.db.begin().await?;
			RoleStore::get(&txn, role_id).await?;

			let affected = match NodeStore::find_root(&txn, role_id).await? {
				Some(root) => {
					let ids = HierarchyQuery::subtree_ids(&txn, root.id).await?;
					DocumentLinkIndex::remove_links_in(&txn, &ids).await?
				}
				None => BTreeSet::new(),
			};
			let removed = NodeStore::delete_tree(&txn, role_id).await?;
			RoleStore::delete(&txn, role_id).await?;

			txn.commit().await?;
			Ok::<_, CollectionError>((removed, affected))
		})
		.await?;

		let invalidated = self.broker.invalidate_documents(affected.iter().copied()).await;

		info!(
			role_id,
			removed = removed.len(),
			documents = affected.len(),
			"Deleted collection role"
		);

		Ok(DeleteReport {
			removed_collections: removed,
			affected_documents: affected,
			invalidated,
		})
	}

	pub async fn get_role(&self, role_id: RoleId) -> CollectionResult<CollectionRole> {
		let db = self.db.as_ref();
		RoleStore::view(db, RoleStore::get(db, role_id).await?).await
	}

	pub async fn find_role_by_name(&self, name: &str) -> CollectionResult<Option<CollectionRole>> {
		let db = self.db.as_ref();
		match RoleStore::find_by_name(db, name).await? {
			Some(model) => Ok(Some(RoleStore::view(db, model).await?)),
			None => Ok(None),
		}
	}

	pub async fn find_role_by_oai_name(&self, oai_name: &str) -> CollectionResult<Option<CollectionRole>> {
		let db = self.db.as_ref();
		match RoleStore::find_by_oai_name(db, oai_name).await? {
			Some(model) => Ok(Some(RoleStore::view(db, model).await?)),
			None => Ok(None),
		}
	}

	/// Roles ordered by position.
	pub async fn list_roles(&self) -> CollectionResult<Vec<CollectionRole>> {
		let db = self.db.as_ref();
		let mut roles = Vec::new();
		for model in RoleStore::list(db).await? {
			roles.push(RoleStore::view(db, model).await?);
		}
		Ok(roles)
	}

	// Tree edits

	pub async fn add_root_collection(&self, role_id: RoleId) -> CollectionResult<Collection> {
		self.attach_root(role_id, NewCollection::new()).await
	}

	/// Stores `draft` as the root of the role's tree.
	pub async fn attach_root(&self, role_id: RoleId, draft: NewCollection) -> CollectionResult<Collection> {
		let draft = &draft;
		let root = self.retry.run("add_root_collection", move || async move {
			let txn = self.db.begin().await?;
			let root = NodeStore::create_root(&txn, role_id, draft).await?;
			txn.commit().await?;
			Ok::<_, CollectionError>(root)
		})
		.await?;

		info!(collection_id = root.id, role_id, "Added root collection");

		Ok(root.into())
	}

	pub async fn add_first_child(&self, parent_id: CollectionId) -> CollectionResult<Collection> {
		self.insert_child(parent_id, ChildPosition::First, NewCollection::new())
			.await
	}

	pub async fn add_last_child(&self, parent_id: CollectionId) -> CollectionResult<Collection> {
		self.insert_child(parent_id, ChildPosition::Last, NewCollection::new())
			.await
	}

	/// Attaches a prepared node under `parent_id`.
	pub async fn insert_child(
		&self,
		parent_id: CollectionId,
		position: ChildPosition,
		draft: NewCollection,
	) -> CollectionResult<Collection> {
		let draft = &draft;
		let gap = self.config.sibling_gap;
		let node = self.retry.run("add_child_collection", move || async move {
			let txn = self.db.begin().await?;
			let node = NodeStore::create_node(&txn, parent_id, position, draft, gap).await?;
			txn.commit().await?;
			Ok::<_, CollectionError>(node)
		})
		.await?;

		Ok(node.into())
	}

	/// Moves a subtree under a new parent of the same role. Documents linked
	/// anywhere in the moved subtree are purged.
	pub async fn move_node(
		&self,
		node_id: CollectionId,
		new_parent_id: CollectionId,
		position: ChildPosition,
	) -> CollectionResult<Collection> {
		let gap = self.config.sibling_gap;
		let (moved, affected) = self.retry.run("move_collection", move || async move {
			let txn = self.db.begin().await?;
			let moved = NodeStore::move_subtree(&txn, node_id, new_parent_id, position, gap).await?;
			let affected = DocumentLinkIndex::subtree_documents_in(&txn, node_id, false).await?;
			txn.commit().await?;
			Ok::<_, CollectionError>((moved, affected))
		})
		.await?;

		self.broker.invalidate_documents(affected).await;

		Ok(moved.into())
	}

	/// Deletes a non-root node and its subtree.
	///
	/// Links into the subtree are always removed and the linked documents
	/// purged. With `cascade_to_documents` the modification date of those
	/// documents is bumped too, so incremental harvesters pick them up again.
	pub async fn delete_node(
		&self,
		node_id: CollectionId,
		cascade_to_documents: bool,
	) -> CollectionResult<DeleteReport> {
		let (removed, affected) = self.retry.run("delete_collection", move || async move {
			let txn = self.db.begin().await?;
			let node = NodeStore::find(&txn, node_id).await?;
			if node.is_root() {
				return Err(CollectionError::RootDeletion(node_id));
			}

			let ids = HierarchyQuery::subtree_ids(&txn, node_id).await?;
			let affected = DocumentLinkIndex::remove_links_in(&txn, &ids).await?;
			if cascade_to_documents {
				touch_documents(&txn, &affected).await?;
			}
			let removed = NodeStore::delete_subtree(&txn, node_id).await?;

			txn.commit().await?;
			Ok::<_, CollectionError>((removed, affected))
		})
		.await?;

		let invalidated = self.broker.invalidate_documents(affected.iter().copied()).await;

		info!(
			collection_id = node_id,
			removed = removed.len(),
			documents = affected.len(),
			"Deleted collection"
		);

		Ok(DeleteReport {
			removed_collections: removed,
			affected_documents: affected,
			invalidated,
		})
	}

	/// Updates display attributes. Documents in the subtree are purged when
	/// something visible changed.
	pub async fn set_attributes(
		&self,
		node_id: CollectionId,
		attrs: CollectionAttributes,
	) -> CollectionResult<Collection> {
		let attrs = &attrs;
		let (updated, affected) = self.retry.run("set_collection_attributes", move || async move {
			let txn = self.db.begin().await?;
			let current = Collection::from(NodeStore::find(&txn, node_id).await?);
			let updated = NodeStore::set_attributes(&txn, node_id, attrs).await?;
			let affected = if attrs.changes_display_of(&current) {
				DocumentLinkIndex::subtree_documents_in(&txn, node_id, false).await?
			} else {
				BTreeSet::new()
			};
			txn.commit().await?;
			Ok::<_, CollectionError>((updated, affected))
		})
		.await?;

		self.broker.invalidate_documents(affected).await;

		Ok(updated.into())
	}

	// Navigation

	pub async fn get_collection(&self, id: CollectionId) -> CollectionResult<Collection> {
		Ok(NodeStore::find(self.db.as_ref(), id).await?.into())
	}

	pub async fn get_parent(&self, id: CollectionId) -> CollectionResult<Option<CollectionId>> {
		NodeStore::get_parent(self.db.as_ref(), id).await
	}

	/// Direct children in sibling order.
	pub async fn get_children(&self, id: CollectionId) -> CollectionResult<Vec<Collection>> {
		Ok(NodeStore::get_children(self.db.as_ref(), id)
			.await?
			.into_iter()
			.map(Collection::from)
			.collect())
	}

	/// Direct children with the `visible` flag set, in sibling order.
	pub async fn visible_children(&self, id: CollectionId) -> CollectionResult<Vec<Collection>> {
		Ok(self
			.get_children(id)
			.await?
			.into_iter()
			.filter(|child| child.visible)
			.collect())
	}

	pub async fn get_root(&self, role_id: RoleId) -> CollectionResult<Collection> {
		let db = self.db.as_ref();
		RoleStore::get(db, role_id).await?;
		Ok(NodeStore::get_root(db, role_id).await?.into())
	}

	/// Path from the root down to the node's parent.
	pub async fn ancestors(&self, id: CollectionId) -> CollectionResult<Vec<Collection>> {
		let txn = self.db.begin().await?;
		NodeStore::find(&txn, id).await?;

		let mut path = Vec::new();
		for ancestor_id in HierarchyQuery::ancestor_ids(&txn, id).await? {
			path.push(NodeStore::find(&txn, ancestor_id).await?.into());
		}
		txn.commit().await?;

		Ok(path)
	}

	/// Every node below `id` in pre-order, `id` itself excluded.
	pub async fn descendants(&self, id: CollectionId) -> CollectionResult<Vec<Collection>> {
		let db = self.db.as_ref();
		NodeStore::find(db, id).await?;

		Ok(HierarchyQuery::preorder(db, id)
			.await?
			.into_iter()
			.skip(1)
			.map(Collection::from)
			.collect())
	}

	/// Whether `node_id` lies strictly below `ancestor_id`.
	pub async fn is_descendant(
		&self,
		ancestor_id: CollectionId,
		node_id: CollectionId,
	) -> CollectionResult<bool> {
		Ok(HierarchyQuery::is_ancestor_of(self.db.as_ref(), ancestor_id, node_id).await?)
	}

	pub async fn find_by_number(&self, role_id: RoleId, number: &str) -> CollectionResult<Vec<Collection>> {
		Ok(NodeStore::find_by_number(self.db.as_ref(), role_id, number)
			.await?
			.into_iter()
			.map(Collection::from)
			.collect())
	}

	/// Theme used to render a node: its own, or the configured default.
	pub async fn effective_theme(&self, id: CollectionId) -> CollectionResult<String> {
		let node = self.get_collection(id).await?;
		Ok(node.effective_theme(&self.config.default_theme).to_string())
	}
}

/// Bumps the modification date of documents whose collections changed.
async fn touch_documents<C: ConnectionTrait>(
	db: &C,
	document_ids: &BTreeSet<DocumentId>,
) -> CollectionResult<()> {
	let ids: Vec<DocumentId> = document_ids.iter().copied().collect();
	let now = Utc::now();
	for chunk in ids.chunks(CHUNK_SIZE) {
		document::Entity::update_many()
			.col_expr(document::Column::UpdatedAt, Expr::value(now))
			.filter(document::Column::Id.is_in(chunk.to_vec()))
			.exec(db)
			.await?;
	}
	Ok(())
}
