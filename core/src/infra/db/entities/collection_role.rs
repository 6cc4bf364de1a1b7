//! Collection role entity
//!
//! A role is a named classification scheme. It owns exactly one tree of
//! `collection` rows once its root has been added.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collection_roles")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,

	#[sea_orm(unique)]
	pub name: String,

	#[sea_orm(unique)]
	pub oai_name: Option<String>,

	pub position: i32,

	// Visibility
	pub visible: bool,
	pub visible_browsing_start: bool,
	pub visible_frontdoor: bool,
	pub visible_oai: bool,

	// Display templates
	pub display_browsing: Option<String>,
	pub display_frontdoor: Option<String>,

	// Assignment behaviour
	pub is_classification: bool,
	pub assign_root: bool,
	pub assign_leaves_only: bool,

	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::collection::Entity")]
	Collections,
}

impl Related<super::collection::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Collections.def()
	}
}

impl ActiveModelBehavior for ActiveModel {
	fn new() -> Self {
		Self {
			visible: Set(true),
			visible_browsing_start: Set(false),
			visible_frontdoor: Set(false),
			visible_oai: Set(false),
			is_classification: Set(false),
			assign_root: Set(false),
			assign_leaves_only: Set(false),
			created_at: Set(Utc::now()),
			updated_at: Set(Utc::now()),
			..ActiveModelTrait::default()
		}
	}
}
