//! Shared setup for the collection engine integration tests

use std::sync::Arc;

use mdr_core::{
	domain::{Collection, CollectionRole, NewCollectionRole, RoleId},
	Database, Engine, EngineConfig, InMemoryDocumentCache,
};
use tempfile::TempDir;

/// An engine on a fresh database, with the cache it purges.
pub struct TestEngine {
	pub engine: Engine,
	pub cache: Arc<InMemoryDocumentCache>,
	_temp_dir: TempDir,
}

impl std::ops::Deref for TestEngine {
	type Target = Engine;

	fn deref(&self) -> &Engine {
		&self.engine
	}
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "mdr_core=debug".into()),
		)
		.with_test_writer()
		.try_init();
}

pub async fn setup() -> TestEngine {
	setup_with(EngineConfig::default()).await
}

pub async fn setup_with(config: EngineConfig) -> TestEngine {
	init_tracing();

	let temp_dir = TempDir::new().unwrap();
	let db = Database::create(&temp_dir.path().join("collections.db"))
		.await
		.unwrap();
	db.migrate().await.unwrap();

	let cache = Arc::new(InMemoryDocumentCache::new());
	let engine = Engine::new(db, config, cache.clone());

	TestEngine {
		engine,
		cache,
		_temp_dir: temp_dir,
	}
}

/// Creates a role and its root.
pub async fn role_with_root(engine: &Engine, role: NewCollectionRole) -> (CollectionRole, Collection) {
	let role = engine.tree.create_role(role).await.unwrap();
	let root = engine.tree.add_root_collection(role.id).await.unwrap();
	(role, root)
}

/// Ids of the direct children of `parent_id`, in sibling order.
pub async fn child_ids(engine: &Engine, parent_id: i32) -> Vec<i32> {
	engine
		.tree
		.get_children(parent_id)
		.await
		.unwrap()
		.into_iter()
		.map(|child| child.id)
		.collect()
}

pub async fn root_of(engine: &Engine, role_id: RoleId) -> Collection {
	engine.tree.get_root(role_id).await.unwrap()
}
