//! Engine context wiring storage, cache and operations together

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::config::EngineConfig;
use crate::infra::cache::DocumentCache;
use crate::infra::db::{Database, RetryPolicy};
use crate::ops::collections::{
	CacheInvalidationBroker, DocumentLinkIndex, DocumentStore, OaiSetAggregator, TreeEditor,
};

/// File name of the database inside an engine's data directory.
pub const DATABASE_FILE_NAME: &str = "collections.db";

/// The main context for all collection tree operations
pub struct Engine {
	config: Arc<EngineConfig>,

	db: Arc<DatabaseConnection>,

	/// Structural edits and navigation
	pub tree: TreeEditor,

	/// Document membership
	pub links: DocumentLinkIndex,

	/// OAI harvesting queries
	pub oai: OaiSetAggregator,

	pub documents: DocumentStore,

	pub broker: CacheInvalidationBroker,
}

impl Engine {
	/// Opens the engine stored in `data_dir`, creating the configuration file
	/// and the database on first use.
	pub async fn open(data_dir: impl AsRef<Path>, cache: Arc<dyn DocumentCache>) -> anyhow::Result<Self> {
		let data_dir = data_dir.as_ref();
		let config = EngineConfig::load_from(data_dir)?;

		let db_path: PathBuf = data_dir.join(DATABASE_FILE_NAME);
		let db = if db_path.exists() {
			Database::open(&db_path).await
		} else {
			Database::create(&db_path).await
		}
		.with_context(|| format!("Failed to open database at {}", db_path.display()))?;
		db.migrate().await.context("Failed to migrate database")?;

		info!(data_dir = %data_dir.display(), "Collection engine ready");

		Ok(Self::new(db, config, cache))
	}

	/// Builds the engine on an already migrated database.
	pub fn new(db: Database, config: EngineConfig, cache: Arc<dyn DocumentCache>) -> Self {
		let config = Arc::new(config);
		let db = Arc::new(db.into_conn());
		let retry = RetryPolicy::from(&config.retry);
		let broker = CacheInvalidationBroker::new(cache);

		Self {
			tree: TreeEditor::new(db.clone(), config.clone(), broker.clone()),
			links: DocumentLinkIndex::new(db.clone(), broker.clone(), retry),
			oai: OaiSetAggregator::new(db.clone()),
			documents: DocumentStore::new(db.clone(), broker.clone(), retry),
			broker,
			config,
			db,
		}
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn conn(&self) -> &DatabaseConnection {
		&self.db
	}
}
