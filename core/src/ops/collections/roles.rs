//! Storage of collection roles

use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
	IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use tracing::debug;

use super::error::{CollectionError, CollectionResult};
use super::node_store::NodeStore;
use crate::domain::role::normalize_oai_name;
use crate::domain::{CollectionRole, NewCollectionRole, RoleAttributes, RoleId};
use crate::infra::db::entities::collection_role;

/// Distance between automatically assigned role positions.
const POSITION_STEP: i32 = 10;

pub struct RoleStore;

impl RoleStore {
	pub async fn create<C: ConnectionTrait>(
		db: &C,
		new_role: &NewCollectionRole,
	) -> CollectionResult<collection_role::Model> {
		let name = new_role.name.trim();
		if name.is_empty() {
			return Err(CollectionError::InvalidInput("role name must not be empty".into()));
		}
		let oai_name = normalize_oai_name(new_role.oai_name.as_deref());

		Self::ensure_name_free(db, name, None).await?;
		if let Some(oai_name) = &oai_name {
			Self::ensure_oai_name_free(db, oai_name, None).await?;
		}

		let position = match new_role.position {
			Some(position) => position,
			None => Self::max_position(db).await?.map_or(POSITION_STEP, |max| max + POSITION_STEP),
		};

		let now = Utc::now();
		let role = collection_role::ActiveModel {
			name: Set(name.to_string()),
			oai_name: Set(oai_name.clone()),
			position: Set(position),
			visible: Set(new_role.visible),
			visible_browsing_start: Set(new_role.visible_browsing_start),
			visible_frontdoor: Set(new_role.visible_frontdoor),
			visible_oai: Set(new_role.visible_oai),
			display_browsing: Set(new_role.display_browsing.clone()),
			display_frontdoor: Set(new_role.display_frontdoor.clone()),
			is_classification: Set(new_role.is_classification),
			assign_root: Set(new_role.assign_root),
			assign_leaves_only: Set(new_role.assign_leaves_only),
			created_at: Set(now),
			updated_at: Set(now),
			..Default::default()
		}
		.insert(db)
		.await
		.map_err(|e| map_unique_violation(e, name, oai_name.as_deref()))?;

		debug!(role_id = role.id, name = %role.name, position, "Created collection role");

		Ok(role)
	}

	pub async fn get<C: ConnectionTrait>(db: &C, id: RoleId) -> CollectionResult<collection_role::Model> {
		collection_role::Entity::find_by_id(id)
			.one(db)
			.await?
			.ok_or_else(|| CollectionError::role_not_found(id))
	}

	pub async fn find_by_name<C: ConnectionTrait>(
		db: &C,
		name: &str,
	) -> CollectionResult<Option<collection_role::Model>> {
		Ok(collection_role::Entity::find()
			.filter(collection_role::Column::Name.eq(name))
			.one(db)
			.await?)
	}

	pub async fn find_by_oai_name<C: ConnectionTrait>(
		db: &C,
		oai_name: &str,
	) -> CollectionResult<Option<collection_role::Model>> {
		Ok(collection_role::Entity::find()
			.filter(collection_role::Column::OaiName.eq(oai_name))
			.one(db)
			.await?)
	}

	/// All roles by position, ties broken by id.
	pub async fn list<C: ConnectionTrait>(db: &C) -> CollectionResult<Vec<collection_role::Model>> {
		Ok(collection_role::Entity::find()
			.order_by_asc(collection_role::Column::Position)
			.order_by_asc(collection_role::Column::Id)
			.all(db)
			.await?)
	}

	pub async fn update<C: ConnectionTrait>(
		db: &C,
		id: RoleId,
		attrs: &RoleAttributes,
	) -> CollectionResult<collection_role::Model> {
		let current = Self::get(db, id).await?;

		let mut active = current.into_active_model();
		if let Some(name) = &attrs.name {
			let name = name.trim();
			if name.is_empty() {
				return Err(CollectionError::InvalidInput("role name must not be empty".into()));
			}
			Self::ensure_name_free(db, name, Some(id)).await?;
			active.name = Set(name.to_string());
		}
		if let Some(oai_name) = &attrs.oai_name {
			let oai_name = normalize_oai_name(oai_name.as_deref());
			if let Some(oai_name) = &oai_name {
				Self::ensure_oai_name_free(db, oai_name, Some(id)).await?;
			}
			active.oai_name = Set(oai_name);
		}
		if let Some(position) = attrs.position {
			active.position = Set(position);
		}
		if let Some(visible) = attrs.visible {
			active.visible = Set(visible);
		}
		if let Some(value) = attrs.visible_browsing_start {
			active.visible_browsing_start = Set(value);
		}
		if let Some(value) = attrs.visible_frontdoor {
			active.visible_frontdoor = Set(value);
		}
		if let Some(value) = attrs.visible_oai {
			active.visible_oai = Set(value);
		}
		if let Some(value) = &attrs.display_browsing {
			active.display_browsing = Set(value.clone());
		}
		if let Some(value) = &attrs.display_frontdoor {
			active.display_frontdoor = Set(value.clone());
		}
		if let Some(value) = attrs.is_classification {
			active.is_classification = Set(value);
		}
		if let Some(value) = attrs.assign_root {
			active.assign_root = Set(value);
		}
		if let Some(value) = attrs.assign_leaves_only {
			active.assign_leaves_only = Set(value);
		}
		active.updated_at = Set(Utc::now());

		let name = attrs.name.as_deref().unwrap_or_default().to_string();
		let oai_name = attrs.oai_name.clone().flatten();
		active
			.update(db)
			.await
			.map_err(|e| map_unique_violation(e, &name, oai_name.as_deref()))
	}

	/// Deletes the role record. The tree must already be gone.
	pub async fn delete<C: ConnectionTrait>(db: &C, id: RoleId) -> CollectionResult<()> {
		let result = collection_role::Entity::delete_by_id(id).exec(db).await?;
		if result.rows_affected == 0 {
			return Err(CollectionError::role_not_found(id));
		}
		Ok(())
	}

	/// Read view of a role, with the id of its root if one exists.
	pub async fn view<C: ConnectionTrait>(
		db: &C,
		model: collection_role::Model,
	) -> CollectionResult<CollectionRole> {
		let root_id = NodeStore::find_root(db, model.id).await?.map(|root| root.id);
		Ok(CollectionRole::from_model(model, root_id))
	}

	async fn max_position<C: ConnectionTrait>(db: &C) -> CollectionResult<Option<i32>> {
		let max: Option<Option<i32>> = collection_role::Entity::find()
			.select_only()
			.column_as(collection_role::Column::Position.max(), "max_position")
			.into_tuple()
			.one(db)
			.await?;
		Ok(max.flatten())
	}

	async fn ensure_name_free<C: ConnectionTrait>(
		db: &C,
		name: &str,
		except: Option<RoleId>,
	) -> CollectionResult<()> {
		match Self::find_by_name(db, name).await? {
			Some(existing) if Some(existing.id) != except => Err(CollectionError::DuplicateName {
				field: "name",
				value: name.to_string(),
			}),
			_ => Ok(()),
		}
	}

	async fn ensure_oai_name_free<C: ConnectionTrait>(
		db: &C,
		oai_name: &str,
		except: Option<RoleId>,
	) -> CollectionResult<()> {
		match Self::find_by_oai_name(db, oai_name).await? {
			Some(existing) if Some(existing.id) != except => Err(CollectionError::DuplicateName {
				field: "oai_name",
				value: oai_name.to_string(),
			}),
			_ => Ok(()),
		}
	}
}

/// Blank OAI names are stored as absent.
fn map_unique_violation(err: sea_orm::DbErr, name: &str, oai_name: Option<&str>) -> CollectionError {
	match err.sql_err() {
		Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("oai_name") => {
			CollectionError::DuplicateName {
				field: "oai_name",
				value: oai_name.unwrap_or_default().to_string(),
			}
		}
		Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("name") => {
			CollectionError::DuplicateName {
				field: "name",
				value: name.to_string(),
			}
		}
		_ => CollectionError::Storage(err),
	}
}
