//! Bounded retry at the transaction boundary
//!
//! Lock contention and dropped connections are retried a small, fixed number
//! of times. Everything else is returned to the caller on the first failure.

use sea_orm::{DbErr, RuntimeErr, SqlErr};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::config::RetryConfig;

/// Errors that can tell whether repeating the whole transaction may succeed.
pub trait Retryable {
	fn is_transient(&self) -> bool;
}

impl Retryable for DbErr {
	fn is_transient(&self) -> bool {
		is_transient_db_err(self)
	}
}

/// SQLite primary result codes that signal contention rather than failure.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Classifies a database error as retryable.
///
/// Busy/locked SQLite codes (including extended codes such as
/// `SQLITE_BUSY_SNAPSHOT`), pool acquisition failures, and collisions on the
/// per-parent sibling key index are transient.
pub fn is_transient_db_err(err: &DbErr) -> bool {
	match err {
		DbErr::ConnectionAcquire(_) => return true,
		DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Io(_)))
		| DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::PoolTimedOut))
		| DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::PoolClosed)) => return true,
		_ => {}
	}

	if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
		return message.contains("sort_key");
	}

	let runtime = match err {
		DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
		_ => return false,
	};

	match runtime {
		RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) => db_err
			.code()
			.and_then(|code| code.parse::<i32>().ok())
			.map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
			.unwrap_or(false),
		RuntimeErr::SqlxError(sqlx::Error::PoolTimedOut) => true,
		_ => false,
	}
}

/// How often and how patiently a transaction is repeated.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub backoff: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::from(&RetryConfig::default())
	}
}

impl From<&RetryConfig> for RetryPolicy {
	fn from(config: &RetryConfig) -> Self {
		Self {
			max_attempts: config.max_attempts.max(1),
			backoff: Duration::from_millis(config.backoff_ms),
		}
	}
}

impl RetryPolicy {
	/// Runs `attempt` until it succeeds, fails permanently, or the attempt
	/// budget is spent. Each call of `attempt` must open its own transaction.
	pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, E>
	where
		E: Retryable + std::fmt::Display,
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		let mut tries = 0;
		loop {
			tries += 1;
			match attempt().await {
				Err(e) if e.is_transient() => {
					if tries >= self.max_attempts {
						error!(
							operation,
							attempts = tries,
							error = %e,
							"Giving up after transient storage failures"
						);
						return Err(e);
					}
					warn!(
						operation,
						attempt = tries,
						error = %e,
						"Transient storage failure, retrying"
					);
					tokio::time::sleep(self.backoff * tries).await;
				}
				result => return result,
			}
		}
	}
}
