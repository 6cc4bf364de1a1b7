//! Collection closure entity
//!
//! SeaORM entity for the closure table that answers subtree containment with a
//! single indexed lookup. Every collection has a depth 0 row pointing at itself.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collection_closure")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub ancestor_id: i32,
	#[sea_orm(primary_key, auto_increment = false)]
	pub descendant_id: i32,
	pub depth: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::collection::Entity",
		from = "Column::AncestorId",
		to = "super::collection::Column::Id",
		on_delete = "Cascade"
	)]
	Ancestor,

	#[sea_orm(
		belongs_to = "super::collection::Entity",
		from = "Column::DescendantId",
		to = "super::collection::Column::Id",
		on_delete = "Cascade"
	)]
	Descendant,
}

impl ActiveModelBehavior for ActiveModel {}
