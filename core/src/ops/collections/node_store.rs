//! # Collection Node Storage
//!
//! All writes to `collections` and `collection_closure` go through this module.
//! Functions take any `ConnectionTrait`, so callers decide the transaction
//! boundary and can compose node writes with link writes atomically.
//!
//! ## Sibling order
//!
//! Each node carries a `sort_key`. Inserting first takes `min - gap`, inserting
//! last takes `max + gap`; no sibling is ever renumbered. The unique
//! `(parent_id, sort_key)` index turns a concurrent collision into a
//! constraint error that the transaction retry repeats.
//!
//! ## Closure table
//!
//! Every node has a depth 0 row. Inserting copies the parent's ancestor rows
//! with `depth + 1`; moving disconnects the subtree from its old ancestors and
//! reconnects it under the new parent in two statements.

use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
	IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, SqlErr, Statement,
};
use tracing::debug;

use super::error::{CollectionError, CollectionResult};
use super::hierarchy::HierarchyQuery;
use crate::domain::{
	ChildPosition, CollectionAttributes, CollectionId, NewCollection, RoleId,
};
use crate::infra::db::entities::{collection, collection_closure, collection_role};

/// Keeps IN lists under SQLite's bound parameter limit.
pub(crate) const CHUNK_SIZE: usize = 900;

/// Storage of collection nodes and their parent/child structure.
pub struct NodeStore;

impl NodeStore {
	/// Loads a live node or fails with `NotFound`.
	pub async fn find<C: ConnectionTrait>(
		db: &C,
		id: CollectionId,
	) -> CollectionResult<collection::Model> {
		collection::Entity::find_by_id(id)
			.one(db)
			.await?
			.ok_or_else(|| CollectionError::collection_not_found(id))
	}

	/// Creates the root node of a role.
	pub async fn create_root<C: ConnectionTrait>(
		db: &C,
		role_id: RoleId,
		draft: &NewCollection,
	) -> CollectionResult<collection::Model> {
		collection_role::Entity::find_by_id(role_id)
			.one(db)
			.await?
			.ok_or_else(|| CollectionError::role_not_found(role_id))?;

		Self::check_draft_role(draft, role_id)?;

		if Self::find_root(db, role_id).await?.is_some() {
			return Err(CollectionError::DuplicateRoot(role_id));
		}

		let root = Self::active_model(role_id, None, 0, draft)
			.insert(db)
			.await
			.map_err(|e| match e.sql_err() {
				// Lost a race against another root insert for the same role
				Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("role_id") => {
					CollectionError::DuplicateRoot(role_id)
				}
				_ => CollectionError::Storage(e),
			})?;

		Self::insert_self_closure(db, root.id).await?;

		debug!(collection_id = root.id, role_id, "Created root collection");

		Ok(root)
	}

	/// Inserts a new child before or after all existing children of `parent_id`.
	pub async fn create_node<C: ConnectionTrait>(
		db: &C,
		parent_id: CollectionId,
		position: ChildPosition,
		draft: &NewCollection,
		gap: i64,
	) -> CollectionResult<collection::Model> {
		let parent = Self::find(db, parent_id).await?;
		Self::check_draft_role(draft, parent.role_id)?;

		let sort_key = Self::next_sort_key(db, parent_id, position, gap).await?;
		let node = Self::active_model(parent.role_id, Some(parent_id), sort_key, draft)
			.insert(db)
			.await?;

		Self::insert_self_closure(db, node.id).await?;

		// Copy all of the parent's ancestor rows to build this node's transitive closure
		db.execute(Statement::from_sql_and_values(
			db.get_database_backend(),
			"INSERT INTO collection_closure (ancestor_id, descendant_id, depth) \
			 SELECT ancestor_id, ?, depth + 1 \
			 FROM collection_closure \
			 WHERE descendant_id = ?",
			[node.id.into(), parent_id.into()],
		))
		.await?;

		debug!(
			collection_id = node.id,
			parent_id,
			sort_key,
			?position,
			"Inserted collection"
		);

		Ok(node)
	}

	/// Parent id, or `None` for a root.
	pub async fn get_parent<C: ConnectionTrait>(
		db: &C,
		id: CollectionId,
	) -> CollectionResult<Option<CollectionId>> {
		Ok(Self::find(db, id).await?.parent_id)
	}

	/// Direct children in sibling order.
	pub async fn get_children<C: ConnectionTrait>(
		db: &C,
		id: CollectionId,
	) -> CollectionResult<Vec<collection::Model>> {
		Self::find(db, id).await?;

		Ok(collection::Entity::find()
			.filter(collection::Column::ParentId.eq(id))
			.order_by_asc(collection::Column::SortKey)
			.order_by_asc(collection::Column::Id)
			.all(db)
			.await?)
	}

	pub async fn has_children<C: ConnectionTrait>(
		db: &C,
		id: CollectionId,
	) -> CollectionResult<bool> {
		let child = collection::Entity::find()
			.select_only()
			.column(collection::Column::Id)
			.filter(collection::Column::ParentId.eq(id))
			.into_tuple::<CollectionId>()
			.one(db)
			.await?;
		Ok(child.is_some())
	}

	pub async fn find_root<C: ConnectionTrait>(
		db: &C,
		role_id: RoleId,
	) -> CollectionResult<Option<collection::Model>> {
		Ok(collection::Entity::find()
			.filter(collection::Column::RoleId.eq(role_id))
			.filter(collection::Column::ParentId.is_null())
			.one(db)
			.await?)
	}

	/// Root of a role; `NotFound` when the role has no tree yet.
	pub async fn get_root<C: ConnectionTrait>(
		db: &C,
		role_id: RoleId,
	) -> CollectionResult<collection::Model> {
		Self::find_root(db, role_id).await?.ok_or(CollectionError::NotFound {
			kind: "root collection of role",
			id: role_id,
		})
	}

	/// Nodes of a role carrying the given number, in id order.
	pub async fn find_by_number<C: ConnectionTrait>(
		db: &C,
		role_id: RoleId,
		number: &str,
	) -> CollectionResult<Vec<collection::Model>> {
		Ok(collection::Entity::find()
			.filter(collection::Column::RoleId.eq(role_id))
			.filter(collection::Column::Number.eq(number))
			.order_by_asc(collection::Column::Id)
			.all(db)
			.await?)
	}

	/// Re-parents `id` under `new_parent_id`, first or last among its new siblings.
	pub async fn move_subtree<C: ConnectionTrait>(
		db: &C,
		id: CollectionId,
		new_parent_id: CollectionId,
		position: ChildPosition,
		gap: i64,
	) -> CollectionResult<collection::Model> {
		let node = Self::find(db, id).await?;
		let target = Self::find(db, new_parent_id).await?;

		if target.role_id != node.role_id {
			return Err(CollectionError::CrossRoleMove {
				node: id,
				target: new_parent_id,
			});
		}
		if id == new_parent_id || HierarchyQuery::is_ancestor_of(db, id, new_parent_id).await? {
			return Err(CollectionError::CyclicMove {
				node: id,
				target: new_parent_id,
			});
		}

		let sort_key = Self::next_sort_key(db, new_parent_id, position, gap).await?;
		let old_parent_id = node.parent_id;

		let mut active = node.into_active_model();
		active.parent_id = Set(Some(new_parent_id));
		active.sort_key = Set(sort_key);
		active.updated_at = Set(Utc::now());
		let moved = active.update(db).await?;

		// Step 1: drop every ancestor row of the moved subtree that points
		// outside of it. Rows internal to the subtree stay valid.
		db.execute(Statement::from_sql_and_values(
			db.get_database_backend(),
			"DELETE FROM collection_closure \
			 WHERE descendant_id IN (SELECT descendant_id FROM collection_closure WHERE ancestor_id = ?) \
			 AND ancestor_id NOT IN (SELECT descendant_id FROM collection_closure WHERE ancestor_id = ?)",
			[id.into(), id.into()],
		))
		.await?;

		// Step 2: pair every ancestor of the new parent with every node of the
		// subtree. Depth is parent_depth + child_depth + 1.
		db.execute(Statement::from_sql_and_values(
			db.get_database_backend(),
			"INSERT INTO collection_closure (ancestor_id, descendant_id, depth) \
			 SELECT p.ancestor_id, c.descendant_id, p.depth + c.depth + 1 \
			 FROM collection_closure p, collection_closure c \
			 WHERE p.descendant_id = ? AND c.ancestor_id = ?",
			[new_parent_id.into(), id.into()],
		))
		.await?;

		debug!(
			collection_id = id,
			?old_parent_id,
			new_parent_id,
			sort_key,
			"Moved collection"
		);

		Ok(moved)
	}

	/// Removes a non-root node and all of its descendants. Returns the removed ids.
	///
	/// Links into the subtree must already be gone; see `DocumentLinkIndex`.
	pub async fn delete_subtree<C: ConnectionTrait>(
		db: &C,
		id: CollectionId,
	) -> CollectionResult<Vec<CollectionId>> {
		let node = Self::find(db, id).await?;
		if node.is_root() {
			return Err(CollectionError::RootDeletion(id));
		}

		let ids = HierarchyQuery::subtree_ids(db, id).await?;
		Self::delete_nodes(db, &ids).await?;

		debug!(collection_id = id, removed = ids.len(), "Deleted collection subtree");

		Ok(ids)
	}

	/// Removes every node of a role, root included. Returns the removed ids.
	pub async fn delete_tree<C: ConnectionTrait>(
		db: &C,
		role_id: RoleId,
	) -> CollectionResult<Vec<CollectionId>> {
		let ids: Vec<CollectionId> = collection::Entity::find()
			.select_only()
			.column(collection::Column::Id)
			.filter(collection::Column::RoleId.eq(role_id))
			.into_tuple()
			.all(db)
			.await?;

		Self::delete_nodes(db, &ids).await?;

		Ok(ids)
	}

	async fn delete_nodes<C: ConnectionTrait>(db: &C, ids: &[CollectionId]) -> CollectionResult<()> {
		for chunk in ids.chunks(CHUNK_SIZE) {
			collection_closure::Entity::delete_many()
				.filter(collection_closure::Column::DescendantId.is_in(chunk.to_vec()))
				.exec(db)
				.await?;
			collection_closure::Entity::delete_many()
				.filter(collection_closure::Column::AncestorId.is_in(chunk.to_vec()))
				.exec(db)
				.await?;
		}

		// Deepest chunk first; the parent_id cascade takes care of the rest
		for chunk in ids.rchunks(CHUNK_SIZE) {
			collection::Entity::delete_many()
				.filter(collection::Column::Id.is_in(chunk.to_vec()))
				.exec(db)
				.await?;
		}

		Ok(())
	}

	/// Pure attribute update; the node's position in the tree is untouched.
	pub async fn set_attributes<C: ConnectionTrait>(
		db: &C,
		id: CollectionId,
		attrs: &CollectionAttributes,
	) -> CollectionResult<collection::Model> {
		let node = Self::find(db, id).await?;
		if attrs.is_empty() {
			return Ok(node);
		}

		let mut active = node.into_active_model();
		if let Some(name) = &attrs.name {
			active.name = Set(name.clone());
		}
		if let Some(number) = &attrs.number {
			active.number = Set(number.clone());
		}
		if let Some(oai_subset) = &attrs.oai_subset {
			active.oai_subset = Set(oai_subset.clone());
		}
		if let Some(theme) = &attrs.theme {
			active.theme = Set(theme.clone());
		}
		if let Some(visible) = attrs.visible {
			active.visible = Set(visible);
		}
		if let Some(visible_publish) = attrs.visible_publish {
			active.visible_publish = Set(visible_publish);
		}
		active.updated_at = Set(Utc::now());

		Ok(active.update(db).await?)
	}

	async fn next_sort_key<C: ConnectionTrait>(
		db: &C,
		parent_id: CollectionId,
		position: ChildPosition,
		gap: i64,
	) -> CollectionResult<i64> {
		let (min, max): (Option<i64>, Option<i64>) = collection::Entity::find()
			.select_only()
			.column_as(collection::Column::SortKey.min(), "min_key")
			.column_as(collection::Column::SortKey.max(), "max_key")
			.filter(collection::Column::ParentId.eq(parent_id))
			.into_tuple()
			.one(db)
			.await?
			.unwrap_or((None, None));

		Ok(match position {
			ChildPosition::First => min.map_or(0, |key| key - gap),
			ChildPosition::Last => max.map_or(0, |key| key + gap),
		})
	}

	async fn insert_self_closure<C: ConnectionTrait>(
		db: &C,
		id: CollectionId,
	) -> CollectionResult<()> {
		let self_closure = collection_closure::ActiveModel {
			ancestor_id: Set(id),
			descendant_id: Set(id),
			depth: Set(0),
		};
		collection_closure::Entity::insert(self_closure)
			.exec_without_returning(db)
			.await?;
		Ok(())
	}

	fn check_draft_role(draft: &NewCollection, role_id: RoleId) -> CollectionResult<()> {
		match draft.role_id {
			Some(found) if found != role_id => Err(CollectionError::RoleMismatch {
				expected: role_id,
				found,
			}),
			_ => Ok(()),
		}
	}

	fn active_model(
		role_id: RoleId,
		parent_id: Option<CollectionId>,
		sort_key: i64,
		draft: &NewCollection,
	) -> collection::ActiveModel {
		let now = Utc::now();
		collection::ActiveModel {
			role_id: Set(role_id),
			parent_id: Set(parent_id),
			sort_key: Set(sort_key),
			name: Set(draft.name.clone()),
			number: Set(draft.number.clone()),
			oai_subset: Set(draft.oai_subset.clone()),
			theme: Set(draft.theme.clone()),
			visible: Set(draft.visible),
			visible_publish: Set(draft.visible_publish),
			created_at: Set(now),
			updated_at: Set(now),
			..Default::default()
		}
	}
}
