//! Document entity
//!
//! Only the fields the collection tree consults are stored here. Everything
//! else about a document lives with its owning framework.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::domain::ServerState;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,

	pub server_state: String, // ServerState enum as string

	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::link_document_collection::Entity")]
	CollectionLinks,
}

impl Related<super::link_document_collection::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::CollectionLinks.def()
	}
}

impl ActiveModelBehavior for ActiveModel {
	fn new() -> Self {
		Self {
			server_state: Set(ServerState::Unpublished.to_string()),
			created_at: Set(Utc::now()),
			updated_at: Set(Utc::now()),
			..ActiveModelTrait::default()
		}
	}
}

impl Model {
	/// Parsed server state. Unknown values are treated as unpublished.
	pub fn server_state(&self) -> ServerState {
		self.server_state.parse().unwrap_or(ServerState::Unpublished)
	}
}
