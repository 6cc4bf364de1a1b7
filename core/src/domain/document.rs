//! Document publication state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::collection::DocumentId;
use crate::infra::db::entities::document;

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
	Published,
	Unpublished,
	Deleted,
}

/// What the tree knows about a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
	pub id: DocumentId,
	pub server_state: ServerState,
	pub updated_at: DateTime<Utc>,
}

impl From<document::Model> for DocumentRecord {
	fn from(model: document::Model) -> Self {
		Self {
			id: model.id,
			server_state: model.server_state(),
			updated_at: model.updated_at,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_server_state_strings() {
		assert_eq!(ServerState::Published.to_string(), "published");
		assert_eq!("unpublished".parse::<ServerState>().unwrap(), ServerState::Unpublished);
		assert!("archived".parse::<ServerState>().is_err());
	}
}
