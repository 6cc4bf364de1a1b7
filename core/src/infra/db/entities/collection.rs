//! Collection entity
//!
//! One node of a role's tree. `parent_id` is null only for the role's root.
//! Siblings are ordered by `sort_key`, which is unique per parent.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collections")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,

	pub role_id: i32,

	pub parent_id: Option<i32>,

	pub sort_key: i64,

	pub name: Option<String>,
	pub number: Option<String>,
	pub oai_subset: Option<String>,
	pub theme: Option<String>,

	pub visible: bool,
	pub visible_publish: bool,

	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::collection_role::Entity",
		from = "Column::RoleId",
		to = "super::collection_role::Column::Id",
		on_delete = "Cascade"
	)]
	Role,

	#[sea_orm(
		belongs_to = "Entity",
		from = "Column::ParentId",
		to = "Column::Id",
		on_delete = "Cascade"
	)]
	Parent,

	#[sea_orm(has_many = "super::link_document_collection::Entity")]
	DocumentLinks,
}

impl Related<super::collection_role::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Role.def()
	}
}

impl Related<super::link_document_collection::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::DocumentLinks.def()
	}
}

impl ActiveModelBehavior for ActiveModel {
	fn new() -> Self {
		Self {
			visible: Set(true),
			visible_publish: Set(true),
			created_at: Set(Utc::now()),
			updated_at: Set(Utc::now()),
			..ActiveModelTrait::default()
		}
	}
}

impl Model {
	pub fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}

	/// OAI subset with empty strings treated as unset
	pub fn oai_subset(&self) -> Option<&str> {
		self.oai_subset.as_deref().filter(|subset| !subset.is_empty())
	}
}
