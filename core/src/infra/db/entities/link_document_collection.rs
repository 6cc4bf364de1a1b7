use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "link_documents_collections")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub document_id: i32,

	#[sea_orm(primary_key, auto_increment = false)]
	pub collection_id: i32,

	pub added_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::document::Entity",
		from = "Column::DocumentId",
		to = "super::document::Column::Id",
		on_delete = "Cascade"
	)]
	Document,

	#[sea_orm(
		belongs_to = "super::collection::Entity",
		from = "Column::CollectionId",
		to = "super::collection::Column::Id",
		on_delete = "Cascade"
	)]
	Collection,
}

impl Related<super::document::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Document.def()
	}
}

impl Related<super::collection::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Collection.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
