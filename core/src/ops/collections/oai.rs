//! # OAI Set Aggregation
//!
//! A visible node with a non-empty `oai_subset` is a set boundary: its set
//! contains the published documents linked anywhere in its subtree. Nodes of
//! one role sharing a subset name form a single set.
//!
//! Every query here runs inside one read transaction so the counts reflect a
//! single snapshot of the tree.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::debug;

use super::error::CollectionResult;
use super::hierarchy::HierarchyQuery;
use super::links::DocumentLinkIndex;
use super::node_store::NodeStore;
use super::roles::RoleStore;
use crate::domain::{CollectionRole, DocumentId, RoleId};
use crate::infra::db::entities::collection;

/// One harvestable OAI set of a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OaiSet {
	pub subset: String,
	/// Distinct published documents in the set
	pub count: u64,
}

#[derive(Clone)]
pub struct OaiSetAggregator {
	db: Arc<DatabaseConnection>,
}

impl OaiSetAggregator {
	pub fn new(db: Arc<DatabaseConnection>) -> Self {
		Self { db }
	}

	/// Non-empty OAI sets of a role, sorted by subset name.
	pub async fn get_oai_set_names(&self, role_id: RoleId) -> CollectionResult<Vec<OaiSet>> {
		let txn = self.db.begin().await?;
		RoleStore::get(&txn, role_id).await?;
		let sets = Self::active_sets_in(&txn, role_id).await?;
		txn.commit().await?;

		debug!(role_id, sets = sets.len(), "Aggregated OAI sets");

		Ok(sets)
	}

	/// Distinct subset names of visible nodes in pre-order, whether or not
	/// their sets contain published documents.
	pub async fn get_all_oai_set_names(&self, role_id: RoleId) -> CollectionResult<Vec<String>> {
		let txn = self.db.begin().await?;
		RoleStore::get(&txn, role_id).await?;
		let nodes = Self::role_nodes_in(&txn, role_id).await?;
		txn.commit().await?;

		let mut seen = HashSet::new();
		Ok(set_boundaries(&nodes)
			.filter_map(|node| node.oai_subset())
			.filter(|subset| seen.insert(subset.to_string()))
			.map(str::to_owned)
			.collect())
	}

	/// Roles exposed to OAI harvesters, ordered by position.
	///
	/// A role qualifies when it is visible, OAI-visible, and either has a
	/// non-empty set or a root without subset carrying published documents.
	pub async fn fetch_all_oai_enabled_roles(&self) -> CollectionResult<Vec<CollectionRole>> {
		let txn = self.db.begin().await?;

		let mut enabled = Vec::new();
		for role in RoleStore::list(&txn).await? {
			if !role.visible || !role.visible_oai {
				continue;
			}
			let Some(root) = NodeStore::find_root(&txn, role.id).await? else {
				continue;
			};

			let has_sets = !Self::active_sets_in(&txn, role.id).await?.is_empty();
			let root_has_documents = root.oai_subset().is_none()
				&& DocumentLinkIndex::count_subtree_entries_in(&txn, root.id, true).await? > 0;

			if has_sets || root_has_documents {
				enabled.push(CollectionRole::from_model(role, Some(root.id)));
			}
		}

		txn.commit().await?;

		Ok(enabled)
	}

	async fn active_sets_in<C: ConnectionTrait>(db: &C, role_id: RoleId) -> CollectionResult<Vec<OaiSet>> {
		let nodes = Self::role_nodes_in(db, role_id).await?;

		let mut members: BTreeMap<String, BTreeSet<DocumentId>> = BTreeMap::new();
		for node in set_boundaries(&nodes) {
			let Some(subset) = node.oai_subset() else {
				continue;
			};
			let documents = DocumentLinkIndex::subtree_documents_in(db, node.id, true).await?;
			members.entry(subset.to_string()).or_default().extend(documents);
		}

		Ok(members
			.into_iter()
			.filter(|(_, documents)| !documents.is_empty())
			.map(|(subset, documents)| OaiSet {
				subset,
				count: documents.len() as u64,
			})
			.collect())
	}

	async fn role_nodes_in<C: ConnectionTrait>(
		db: &C,
		role_id: RoleId,
	) -> CollectionResult<Vec<collection::Model>> {
		match NodeStore::find_root(db, role_id).await? {
			Some(root) => Ok(HierarchyQuery::preorder(db, root.id).await?),
			None => Ok(Vec::new()),
		}
	}
}

fn set_boundaries(nodes: &[collection::Model]) -> impl Iterator<Item = &collection::Model> {
	nodes
		.iter()
		.filter(|node| node.visible && node.oai_subset().is_some())
}
