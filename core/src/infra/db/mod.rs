//! SQLite storage of roles, collection trees and document links

use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migration;
pub mod retry;

pub use retry::RetryPolicy;

/// Pooled connection to one engine's SQLite file
pub struct Database {
	conn: DatabaseConnection,
}

impl Database {
	/// Creates the file, and missing parent directories, if needed.
	pub async fn create(path: &Path) -> Result<Self, DbErr> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|e| DbErr::Custom(format!("Failed to create data directory: {}", e)))?;
		}

		let conn = Self::connect(&format!("sqlite://{}?mode=rwc", path.display())).await?;

		info!(path = %path.display(), "Created collection database");

		Ok(Self { conn })
	}

	/// Fails when the file is missing instead of creating an empty one.
	pub async fn open(path: &Path) -> Result<Self, DbErr> {
		if !path.exists() {
			return Err(DbErr::Custom(format!(
				"Collection database not found: {}",
				path.display()
			)));
		}

		let conn = Self::connect(&format!("sqlite://{}", path.display())).await?;

		info!(path = %path.display(), "Opened collection database");

		Ok(Self { conn })
	}

	async fn connect(db_url: &str) -> Result<DatabaseConnection, DbErr> {
		let mut opt = ConnectOptions::new(db_url.to_owned());
		opt.max_connections(10)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.idle_timeout(Duration::from_secs(8))
			.sqlx_logging(false);

		SeaDatabase::connect(opt).await
	}

	/// Brings the schema up to date. Safe to call on every start.
	pub async fn migrate(&self) -> Result<(), DbErr> {
		migration::Migrator::up(&self.conn, None).await?;
		info!("Collection schema is up to date");
		Ok(())
	}

	/// Hands the pool over to the engine.
	pub fn into_conn(self) -> DatabaseConnection {
		self.conn
	}
}
