//! # Closure Table Query Helpers
//!
//! Tree traversal for collections using the precomputed `collection_closure`
//! table. Every ancestor/descendant pair is stored with its depth, so subtree
//! membership is a single indexed lookup and whole subtrees load in one query
//! instead of a walk over parent pointers.

use std::collections::HashMap;

use sea_orm::{
	sea_query::SelectStatement, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
	QueryFilter, QueryOrder, QuerySelect, QueryTrait,
};

use crate::domain::CollectionId;
use crate::infra::db::entities::{collection, collection_closure};

/// Namespace for closure table queries that avoid recursive database operations.
pub struct HierarchyQuery;

impl HierarchyQuery {
	/// Sub-select of every collection id in the subtree rooted at `ancestor_id`,
	/// the root included. Meant for `in_subquery` filters.
	pub fn subtree_ids_query(ancestor_id: CollectionId) -> SelectStatement {
		collection_closure::Entity::find()
			.select_only()
			.column(collection_closure::Column::DescendantId)
			.filter(collection_closure::Column::AncestorId.eq(ancestor_id))
			.into_query()
	}

	/// Every collection id in the subtree, shallowest first, the root included.
	pub async fn subtree_ids<C: ConnectionTrait>(
		db: &C,
		ancestor_id: CollectionId,
	) -> Result<Vec<CollectionId>, sea_orm::DbErr> {
		collection_closure::Entity::find()
			.select_only()
			.column(collection_closure::Column::DescendantId)
			.filter(collection_closure::Column::AncestorId.eq(ancestor_id))
			.order_by_asc(collection_closure::Column::Depth)
			.order_by_asc(collection_closure::Column::DescendantId)
			.into_tuple()
			.all(db)
			.await
	}

	/// Ancestor ids from the root down to the immediate parent.
	///
	/// Excludes the node itself; an empty result means the node is a root.
	pub async fn ancestor_ids<C: ConnectionTrait>(
		db: &C,
		descendant_id: CollectionId,
	) -> Result<Vec<CollectionId>, sea_orm::DbErr> {
		collection_closure::Entity::find()
			.select_only()
			.column(collection_closure::Column::AncestorId)
			.filter(collection_closure::Column::DescendantId.eq(descendant_id))
			.filter(collection_closure::Column::Depth.gt(0))
			.order_by_desc(collection_closure::Column::Depth)
			.into_tuple()
			.all(db)
			.await
	}

	/// Checks if `potential_ancestor_id` is anywhere above `potential_descendant_id`.
	pub async fn is_ancestor_of<C: ConnectionTrait>(
		db: &C,
		potential_ancestor_id: CollectionId,
		potential_descendant_id: CollectionId,
	) -> Result<bool, sea_orm::DbErr> {
		let count = collection_closure::Entity::find()
			.filter(collection_closure::Column::AncestorId.eq(potential_ancestor_id))
			.filter(collection_closure::Column::DescendantId.eq(potential_descendant_id))
			.filter(collection_closure::Column::Depth.gt(0))
			.count(db)
			.await?;

		Ok(count > 0)
	}

	/// Loads the subtree in one query and returns it in pre-order, siblings
	/// ordered by sort key. The root comes first.
	pub async fn preorder<C: ConnectionTrait>(
		db: &C,
		root_id: CollectionId,
	) -> Result<Vec<collection::Model>, sea_orm::DbErr> {
		let nodes = collection::Entity::find()
			.filter(collection::Column::Id.in_subquery(Self::subtree_ids_query(root_id)))
			.order_by_asc(collection::Column::SortKey)
			.order_by_asc(collection::Column::Id)
			.all(db)
			.await?;

		Ok(preorder_from_rows(root_id, nodes))
	}
}

/// Orders already-sorted rows of one subtree depth-first.
fn preorder_from_rows(root_id: CollectionId, nodes: Vec<collection::Model>) -> Vec<collection::Model> {
	let mut root = None;
	let mut children: HashMap<CollectionId, Vec<collection::Model>> = HashMap::new();
	for node in nodes {
		if node.id == root_id {
			root = Some(node);
		} else if let Some(parent_id) = node.parent_id {
			children.entry(parent_id).or_default().push(node);
		}
	}

	let Some(root) = root else {
		return Vec::new();
	};

	let mut ordered = Vec::with_capacity(children.values().map(Vec::len).sum::<usize>() + 1);
	let mut stack = vec![root];
	while let Some(node) = stack.pop() {
		if let Some(mut kids) = children.remove(&node.id) {
			// Reverse so the first sibling is popped first
			kids.reverse();
			stack.extend(kids);
		}
		ordered.push(node);
	}

	ordered
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	fn node(id: i32, parent_id: Option<i32>, sort_key: i64) -> collection::Model {
		collection::Model {
			id,
			role_id: 1,
			parent_id,
			sort_key,
			name: None,
			number: None,
			oai_subset: None,
			theme: None,
			visible: true,
			visible_publish: true,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		}
	}

	#[test]
	fn test_preorder_follows_sibling_order() {
		// rows arrive sorted by sort key, as the query returns them
		let rows = vec![
			node(4, Some(2), -1024),
			node(1, None, 0),
			node(2, Some(1), 0),
			node(5, Some(2), 0),
			node(3, Some(1), 1024),
		];

		let ids: Vec<i32> = preorder_from_rows(1, rows).into_iter().map(|n| n.id).collect();
		assert_eq!(ids, vec![1, 2, 4, 5, 3]);
	}

	#[test]
	fn test_preorder_of_missing_root_is_empty() {
		assert!(preorder_from_rows(9, vec![node(1, None, 0)]).is_empty());
	}
}
