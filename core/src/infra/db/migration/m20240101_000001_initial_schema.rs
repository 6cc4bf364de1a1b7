//! Initial database schema for the collection tree
//!
//! Creates roles, collections, the collection closure table, documents and the
//! document/collection link table together with the indexes the tree queries
//! depend on.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		// Create collection_roles table
		manager
			.create_table(
				Table::create()
					.table(CollectionRoles::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(CollectionRoles::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(
						ColumnDef::new(CollectionRoles::Name)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(ColumnDef::new(CollectionRoles::OaiName).string().unique_key())
					.col(ColumnDef::new(CollectionRoles::Position).integer().not_null())
					.col(
						ColumnDef::new(CollectionRoles::Visible)
							.boolean()
							.not_null()
							.default(true),
					)
					.col(
						ColumnDef::new(CollectionRoles::VisibleBrowsingStart)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(
						ColumnDef::new(CollectionRoles::VisibleFrontdoor)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(
						ColumnDef::new(CollectionRoles::VisibleOai)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(ColumnDef::new(CollectionRoles::DisplayBrowsing).string())
					.col(ColumnDef::new(CollectionRoles::DisplayFrontdoor).string())
					.col(
						ColumnDef::new(CollectionRoles::IsClassification)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(
						ColumnDef::new(CollectionRoles::AssignRoot)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(
						ColumnDef::new(CollectionRoles::AssignLeavesOnly)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(
						ColumnDef::new(CollectionRoles::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(CollectionRoles::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		// Create collections table
		manager
			.create_table(
				Table::create()
					.table(Collections::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Collections::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(Collections::RoleId).integer().not_null())
					.col(ColumnDef::new(Collections::ParentId).integer())
					.col(ColumnDef::new(Collections::SortKey).big_integer().not_null())
					.col(ColumnDef::new(Collections::Name).string())
					.col(ColumnDef::new(Collections::Number).string())
					.col(ColumnDef::new(Collections::OaiSubset).string())
					.col(ColumnDef::new(Collections::Theme).string())
					.col(
						ColumnDef::new(Collections::Visible)
							.boolean()
							.not_null()
							.default(true),
					)
					.col(
						ColumnDef::new(Collections::VisiblePublish)
							.boolean()
							.not_null()
							.default(true),
					)
					.col(
						ColumnDef::new(Collections::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Collections::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_collections_role_id")
							.from(Collections::Table, Collections::RoleId)
							.to(CollectionRoles::Table, CollectionRoles::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_collections_parent_id")
							.from(Collections::Table, Collections::ParentId)
							.to(Collections::Table, Collections::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.to_owned(),
			)
			.await?;

		// Sibling order must never collide under one parent
		manager
			.create_index(
				Index::create()
					.name("idx_collections_parent_sort_key")
					.table(Collections::Table)
					.col(Collections::ParentId)
					.col(Collections::SortKey)
					.unique()
					.to_owned(),
			)
			.await?;

		// A role has at most one parentless node
		manager
			.get_connection()
			.execute_unprepared(
				"CREATE UNIQUE INDEX IF NOT EXISTS idx_collections_single_root \
				 ON collections (role_id) WHERE parent_id IS NULL",
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_collections_role_id")
					.table(Collections::Table)
					.col(Collections::RoleId)
					.to_owned(),
			)
			.await?;

		// Create collection_closure table
		manager
			.create_table(
				Table::create()
					.table(CollectionClosure::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(CollectionClosure::AncestorId)
							.integer()
							.not_null(),
					)
					.col(
						ColumnDef::new(CollectionClosure::DescendantId)
							.integer()
							.not_null(),
					)
					.col(ColumnDef::new(CollectionClosure::Depth).integer().not_null())
					.primary_key(
						Index::create()
							.col(CollectionClosure::AncestorId)
							.col(CollectionClosure::DescendantId),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_collection_closure_ancestor")
							.from(CollectionClosure::Table, CollectionClosure::AncestorId)
							.to(Collections::Table, Collections::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_collection_closure_descendant")
							.from(CollectionClosure::Table, CollectionClosure::DescendantId)
							.to(Collections::Table, Collections::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.to_owned(),
			)
			.await?;

		// Index on descendant_id for ancestor lookups
		manager
			.create_index(
				Index::create()
					.name("idx_collection_closure_descendant")
					.table(CollectionClosure::Table)
					.col(CollectionClosure::DescendantId)
					.to_owned(),
			)
			.await?;

		// Compound index for child/descendant queries
		manager
			.create_index(
				Index::create()
					.name("idx_collection_closure_ancestor_depth")
					.table(CollectionClosure::Table)
					.col(CollectionClosure::AncestorId)
					.col(CollectionClosure::Depth)
					.to_owned(),
			)
			.await?;

		// Create documents table
		manager
			.create_table(
				Table::create()
					.table(Documents::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Documents::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(Documents::ServerState).string().not_null())
					.col(
						ColumnDef::new(Documents::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Documents::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		// Create link_documents_collections table
		manager
			.create_table(
				Table::create()
					.table(LinkDocumentsCollections::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(LinkDocumentsCollections::DocumentId)
							.integer()
							.not_null(),
					)
					.col(
						ColumnDef::new(LinkDocumentsCollections::CollectionId)
							.integer()
							.not_null(),
					)
					.col(
						ColumnDef::new(LinkDocumentsCollections::AddedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.primary_key(
						Index::create()
							.col(LinkDocumentsCollections::DocumentId)
							.col(LinkDocumentsCollections::CollectionId),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_link_documents_collections_document")
							.from(
								LinkDocumentsCollections::Table,
								LinkDocumentsCollections::DocumentId,
							)
							.to(Documents::Table, Documents::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_link_documents_collections_collection")
							.from(
								LinkDocumentsCollections::Table,
								LinkDocumentsCollections::CollectionId,
							)
							.to(Collections::Table, Collections::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_link_documents_collections_collection")
					.table(LinkDocumentsCollections::Table)
					.col(LinkDocumentsCollections::CollectionId)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(
				Table::drop()
					.table(LinkDocumentsCollections::Table)
					.to_owned(),
			)
			.await?;
		manager
			.drop_table(Table::drop().table(Documents::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(CollectionClosure::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Collections::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(CollectionRoles::Table).to_owned())
			.await?;

		Ok(())
	}
}

#[derive(DeriveIden)]
enum CollectionRoles {
	Table,
	Id,
	Name,
	OaiName,
	Position,
	Visible,
	VisibleBrowsingStart,
	VisibleFrontdoor,
	VisibleOai,
	DisplayBrowsing,
	DisplayFrontdoor,
	IsClassification,
	AssignRoot,
	AssignLeavesOnly,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum Collections {
	Table,
	Id,
	RoleId,
	ParentId,
	SortKey,
	Name,
	Number,
	OaiSubset,
	Theme,
	Visible,
	VisiblePublish,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum CollectionClosure {
	Table,
	AncestorId,
	DescendantId,
	Depth,
}

#[derive(DeriveIden)]
enum Documents {
	Table,
	Id,
	ServerState,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum LinkDocumentsCollections {
	Table,
	DocumentId,
	CollectionId,
	AddedAt,
}
