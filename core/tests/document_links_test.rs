//! Document membership and the cache purges it triggers

mod helpers;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use helpers::*;
use mdr_core::{
	domain::{ChildPosition, CollectionAttributes, DocumentId, NewCollectionRole, RoleAttributes, ServerState},
	CacheError, CollectionError, DocumentCache, Engine,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn open_role(name: &str) -> NewCollectionRole {
	NewCollectionRole::new(name).assign_root(true)
}

#[tokio::test]
async fn test_link_is_idempotent() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let node = t.tree.add_last_child(root.id).await.unwrap();
	let doc = t.documents.create(ServerState::Published).await.unwrap();

	assert!(t.links.link(doc, node.id).await.unwrap());
	assert!(!t.links.link(doc, node.id).await.unwrap());

	assert_eq!(t.links.documents_of(node.id).await.unwrap(), BTreeSet::from([doc]));
	assert_eq!(t.links.collections_of(doc).await.unwrap(), vec![node.id]);
	assert_eq!(t.cache.purge_count(doc).await, 1);
}

#[tokio::test]
async fn test_link_requires_live_endpoints() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let doc = t.documents.create(ServerState::Published).await.unwrap();

	let missing_doc = t.links.link(doc + 100, root.id).await.unwrap_err();
	assert!(matches!(missing_doc, CollectionError::NotFound { kind: "document", .. }));

	let missing_node = t.links.link(doc, root.id + 100).await.unwrap_err();
	assert!(matches!(missing_node, CollectionError::NotFound { kind: "collection", .. }));
}

#[tokio::test]
async fn test_assignment_rules_of_role() {
	let t = setup().await;
	let (_, root) = role_with_root(
		&t,
		NewCollectionRole::new("ddc").assign_leaves_only(true),
	)
	.await;
	let inner = t.tree.add_last_child(root.id).await.unwrap();
	let leaf = t.tree.add_last_child(inner.id).await.unwrap();
	let doc = t.documents.create(ServerState::Published).await.unwrap();

	assert!(matches!(
		t.links.link(doc, root.id).await,
		Err(CollectionError::AssignmentNotAllowed { .. })
	));
	assert!(matches!(
		t.links.link(doc, inner.id).await,
		Err(CollectionError::AssignmentNotAllowed { .. })
	));
	assert!(t.links.link(doc, leaf.id).await.unwrap());
}

#[tokio::test]
async fn test_unlink_variants() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let a = t.tree.add_last_child(root.id).await.unwrap();
	let b = t.tree.add_last_child(root.id).await.unwrap();
	let doc = t.documents.create(ServerState::Published).await.unwrap();
	let other = t.documents.create(ServerState::Published).await.unwrap();

	t.links.link(doc, a.id).await.unwrap();
	t.links.link(doc, b.id).await.unwrap();
	t.links.link(other, b.id).await.unwrap();

	assert!(t.links.unlink(doc, a.id).await.unwrap());
	assert!(!t.links.unlink(doc, a.id).await.unwrap());
	assert!(t.links.documents_of(a.id).await.unwrap().is_empty());

	assert_eq!(t.links.unlink_all(doc).await.unwrap(), 1);
	assert_eq!(t.links.documents_of(b.id).await.unwrap(), BTreeSet::from([other]));

	let affected = t
		.links
		.unlink_subtree(&BTreeSet::from([a.id, b.id]))
		.await
		.unwrap();
	assert_eq!(affected, BTreeSet::from([other]));
	assert!(t.links.documents_of_subtree(root.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_subtree_membership_is_union_of_direct_links() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;

	// A chain five levels deep with a side branch at every level
	let mut nodes = vec![root.id];
	let mut parent = root.id;
	for _ in 0..5 {
		let next = t.tree.add_last_child(parent).await.unwrap();
		let side = t.tree.add_first_child(parent).await.unwrap();
		nodes.push(next.id);
		nodes.push(side.id);
		parent = next.id;
	}

	let mut docs = Vec::new();
	for (i, node_id) in nodes.iter().enumerate() {
		let doc = t.documents.create(ServerState::Published).await.unwrap();
		t.links.link(doc, *node_id).await.unwrap();
		if i % 3 == 0 {
			// Shared documents must be counted once
			t.links.link(docs.first().copied().unwrap_or(doc), *node_id).await.unwrap();
		}
		docs.push(doc);
	}

	for node_id in &nodes {
		let mut union = t.links.documents_of(*node_id).await.unwrap();
		for descendant in t.tree.descendants(*node_id).await.unwrap() {
			union.extend(t.links.documents_of(descendant.id).await.unwrap());
		}

		let subtree = t.links.documents_of_subtree(*node_id).await.unwrap();
		assert_eq!(subtree, union);
		assert_eq!(
			t.links.count_subtree_entries(*node_id, false).await.unwrap(),
			union.len() as u64
		);
	}

	assert_eq!(
		t.links.documents_of_subtree(root.id).await.unwrap(),
		docs.into_iter().collect::<BTreeSet<_>>()
	);
}

#[tokio::test]
async fn test_published_filter() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let node = t.tree.add_last_child(root.id).await.unwrap();
	let published = t.documents.create(ServerState::Published).await.unwrap();
	let draft = t.documents.create(ServerState::Unpublished).await.unwrap();
	let removed = t.documents.create(ServerState::Deleted).await.unwrap();
	for doc in [published, draft, removed] {
		t.links.link(doc, node.id).await.unwrap();
	}

	assert_eq!(
		t.links.published_documents_of_subtree(root.id).await.unwrap(),
		BTreeSet::from([published])
	);
	assert_eq!(t.links.count_subtree_entries(root.id, true).await.unwrap(), 1);
	assert_eq!(t.links.count_subtree_entries(root.id, false).await.unwrap(), 3);

	t.documents
		.set_server_state(draft, ServerState::Published)
		.await
		.unwrap();
	assert_eq!(t.links.count_subtree_entries(node.id, true).await.unwrap(), 2);
}

#[tokio::test]
async fn test_delete_purges_each_document_once() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let gone = t.tree.add_last_child(root.id).await.unwrap();
	let child = t.tree.add_last_child(gone.id).await.unwrap();
	let kept = t.tree.add_last_child(root.id).await.unwrap();

	let shared = t.documents.create(ServerState::Published).await.unwrap();
	let single = t.documents.create(ServerState::Published).await.unwrap();
	let bystander = t.documents.create(ServerState::Published).await.unwrap();
	t.links.link(shared, gone.id).await.unwrap();
	t.links.link(shared, child.id).await.unwrap();
	t.links.link(single, child.id).await.unwrap();
	t.links.link(bystander, kept.id).await.unwrap();
	t.links.link(shared, kept.id).await.unwrap();

	let purges_before = t.cache.purge_count(shared).await;
	let report = t.tree.delete_node(gone.id, false).await.unwrap();

	assert_eq!(report.affected_documents, BTreeSet::from([shared, single]));
	assert_eq!(report.invalidated, 2);
	assert_eq!(t.cache.purge_count(shared).await, purges_before + 1);
	assert_eq!(t.cache.purge_count(bystander).await, 1);

	// Links into removed nodes are gone everywhere
	assert_eq!(t.links.collections_of(shared).await.unwrap(), vec![kept.id]);
	assert!(t.links.collections_of(single).await.unwrap().is_empty());
	assert!(t.links.documents_of(child.id).await.unwrap_err().is_not_found());
	assert_eq!(
		t.links.documents_of_subtree(root.id).await.unwrap(),
		BTreeSet::from([shared, bystander])
	);
}

#[tokio::test]
async fn test_cascading_delete_bumps_document_dates() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let node = t.tree.add_last_child(root.id).await.unwrap();
	let doc = t.documents.create(ServerState::Published).await.unwrap();
	t.links.link(doc, node.id).await.unwrap();
	let before = t.documents.get(doc).await.unwrap().updated_at;

	tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	t.tree.delete_node(node.id, true).await.unwrap();

	let after = t.documents.get(doc).await.unwrap();
	assert!(after.updated_at > before);
	assert_eq!(after.server_state, ServerState::Published);
}

#[tokio::test]
async fn test_cached_rendering_is_dropped_on_structural_change() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let a = t.tree.add_last_child(root.id).await.unwrap();
	let b = t.tree.add_last_child(root.id).await.unwrap();
	let inner = t.tree.add_last_child(a.id).await.unwrap();
	let doc = t.documents.create(ServerState::Published).await.unwrap();
	t.links.link(doc, inner.id).await.unwrap();

	t.cache.put(doc, "v1", "<doc/>".into()).await;
	t.tree
		.move_node(a.id, b.id, ChildPosition::Last)
		.await
		.unwrap();
	assert!(!t.cache.has_entry(doc, "v1").await.unwrap());

	// Display change on an ancestor reaches documents deep in the subtree
	t.cache.put(doc, "v1", "<doc/>".into()).await;
	t.tree
		.set_attributes(b.id, CollectionAttributes::default().oai_subset(Some("b")))
		.await
		.unwrap();
	assert!(!t.cache.has_entry(doc, "v1").await.unwrap());

	// A no-op update leaves the cache alone
	t.cache.put(doc, "v1", "<doc/>".into()).await;
	t.tree
		.set_attributes(b.id, CollectionAttributes::default().oai_subset(Some("b")))
		.await
		.unwrap();
	assert!(t.cache.has_entry(doc, "v1").await.unwrap());
}

#[tokio::test]
async fn test_role_display_change_purges_role_documents() {
	let t = setup().await;
	let (role, root) = role_with_root(&t, open_role("ddc")).await;
	let node = t.tree.add_last_child(root.id).await.unwrap();
	let doc = t.documents.create(ServerState::Published).await.unwrap();
	t.links.link(doc, node.id).await.unwrap();
	let purges = t.cache.purge_count(doc).await;

	t.tree
		.update_role(
			role.id,
			RoleAttributes {
				position: Some(99),
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert_eq!(t.cache.purge_count(doc).await, purges);

	let updated = t
		.tree
		.update_role(
			role.id,
			RoleAttributes {
				display_frontdoor: Some(Some("Number,Name".into())),
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert_eq!(updated.display_frontdoor.as_deref(), Some("Number,Name"));
	assert_eq!(t.cache.purge_count(doc).await, purges + 1);

	let flags = [
		RoleAttributes {
			visible: Some(false),
			..Default::default()
		},
		RoleAttributes {
			visible_browsing_start: Some(true),
			..Default::default()
		},
		RoleAttributes {
			visible_frontdoor: Some(true),
			..Default::default()
		},
		RoleAttributes {
			visible_oai: Some(true),
			..Default::default()
		},
	];
	for attrs in flags {
		let before = t.cache.purge_count(doc).await;
		t.tree.update_role(role.id, attrs.clone()).await.unwrap();
		assert_eq!(t.cache.purge_count(doc).await, before + 1, "{attrs:?}");
	}

	// Blank and padded OAI names are stored as they already are
	let before = t.cache.purge_count(doc).await;
	let unchanged = t
		.tree
		.update_role(
			role.id,
			RoleAttributes {
				name: Some(" ddc ".into()),
				oai_name: Some(Some("  ".into())),
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert_eq!(unchanged.name, "ddc");
	assert_eq!(unchanged.oai_name, None);
	assert_eq!(t.cache.purge_count(doc).await, before);
}

#[tokio::test]
async fn test_delete_role_purges_linked_documents() {
	let t = setup().await;
	let (role, root) = role_with_root(&t, open_role("ddc")).await;
	let node = t.tree.add_last_child(root.id).await.unwrap();
	let doc = t.documents.create(ServerState::Published).await.unwrap();
	t.links.link(doc, root.id).await.unwrap();
	t.links.link(doc, node.id).await.unwrap();
	let purges = t.cache.purge_count(doc).await;

	let report = t.tree.delete_role(role.id).await.unwrap();

	assert_eq!(report.affected_documents, BTreeSet::from([doc]));
	assert_eq!(t.cache.purge_count(doc).await, purges + 1);
	assert!(t.links.collections_of(doc).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_document_delete_removes_links() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let doc = t.documents.create(ServerState::Published).await.unwrap();
	t.links.link(doc, root.id).await.unwrap();

	t.documents.delete(doc).await.unwrap();

	assert!(t.links.documents_of(root.id).await.unwrap().is_empty());
	assert!(t.documents.get(doc).await.unwrap_err().is_not_found());
	assert!(t.documents.delete(doc).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_subtree_invalidation_reaches_nested_documents() {
	let t = setup().await;
	let (_, root) = role_with_root(&t, open_role("ddc")).await;
	let branch = t.tree.add_last_child(root.id).await.unwrap();
	let leaf = t.tree.add_last_child(branch.id).await.unwrap();
	let outside = t.tree.add_last_child(root.id).await.unwrap();

	let shared = t.documents.create(ServerState::Published).await.unwrap();
	let nested = t.documents.create(ServerState::Unpublished).await.unwrap();
	let other = t.documents.create(ServerState::Published).await.unwrap();
	t.links.link(shared, branch.id).await.unwrap();
	t.links.link(shared, leaf.id).await.unwrap();
	t.links.link(nested, leaf.id).await.unwrap();
	t.links.link(other, outside.id).await.unwrap();
	let before = [
		t.cache.purge_count(shared).await,
		t.cache.purge_count(nested).await,
		t.cache.purge_count(other).await,
	];

	let invalidated = t.broker.invalidate_subtree(t.conn(), branch.id).await.unwrap();

	assert_eq!(invalidated, 2);
	assert_eq!(t.cache.purge_count(shared).await, before[0] + 1);
	assert_eq!(t.cache.purge_count(nested).await, before[1] + 1);
	assert_eq!(t.cache.purge_count(other).await, before[2]);
	assert!(t.broker.invalidate_subtree(t.conn(), leaf.id + 100).await.unwrap_err().is_not_found());
}

/// Cache whose backend is down for every purge.
struct UnreachableCache;

#[async_trait]
impl DocumentCache for UnreachableCache {
	async fn invalidate(&self, _document_id: DocumentId) -> Result<(), CacheError> {
		Err(CacheError::Unavailable("connection refused".into()))
	}

	async fn has_entry(&self, _document_id: DocumentId, _version: &str) -> Result<bool, CacheError> {
		Ok(false)
	}
}

#[tokio::test]
async fn test_cache_outage_does_not_undo_structural_changes() {
	init_tracing();
	let temp_dir = TempDir::new().unwrap();
	let engine = Engine::open(temp_dir.path(), Arc::new(UnreachableCache)).await.unwrap();

	let (role, root) = role_with_root(&engine, open_role("ddc")).await;
	let a = engine.tree.add_last_child(root.id).await.unwrap();
	let b = engine.tree.add_last_child(root.id).await.unwrap();
	let inner = engine.tree.add_last_child(a.id).await.unwrap();
	let doc = engine.documents.create(ServerState::Published).await.unwrap();
	assert!(engine.links.link(doc, inner.id).await.unwrap());
	engine.links.link(doc, b.id).await.unwrap();

	let moved = engine.tree.move_node(a.id, b.id, ChildPosition::First).await.unwrap();
	assert_eq!(moved.parent_id, Some(b.id));
	assert_eq!(engine.tree.get_parent(a.id).await.unwrap(), Some(b.id));

	let report = engine.tree.delete_node(a.id, true).await.unwrap();
	assert_eq!(report.removed_collections, vec![a.id, inner.id]);
	assert_eq!(report.affected_documents, BTreeSet::from([doc]));
	assert_eq!(report.invalidated, 0);
	assert!(engine.tree.get_collection(a.id).await.unwrap_err().is_not_found());
	assert!(engine.tree.get_collection(inner.id).await.unwrap_err().is_not_found());
	assert_eq!(engine.links.collections_of(doc).await.unwrap(), vec![b.id]);

	let report = engine.tree.delete_role(role.id).await.unwrap();
	assert_eq!(report.affected_documents, BTreeSet::from([doc]));
	assert_eq!(report.invalidated, 0);
	assert!(engine.tree.get_role(role.id).await.unwrap_err().is_not_found());
	assert!(engine.tree.get_collection(b.id).await.unwrap_err().is_not_found());
	assert!(engine.links.collections_of(doc).await.unwrap().is_empty());
}
