//! Collection role domain model

use serde::{Deserialize, Serialize};

use super::collection::{CollectionId, RoleId};
use crate::infra::db::entities::collection_role;

/// A classification scheme that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCollectionRole {
	pub name: String,
	pub oai_name: Option<String>,
	/// Explicit position; assigned after the last role when unset
	pub position: Option<i32>,
	pub visible: bool,
	pub visible_browsing_start: bool,
	pub visible_frontdoor: bool,
	pub visible_oai: bool,
	pub display_browsing: Option<String>,
	pub display_frontdoor: Option<String>,
	pub is_classification: bool,
	pub assign_root: bool,
	pub assign_leaves_only: bool,
}

impl NewCollectionRole {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			oai_name: None,
			position: None,
			visible: true,
			visible_browsing_start: false,
			visible_frontdoor: false,
			visible_oai: false,
			display_browsing: None,
			display_frontdoor: None,
			is_classification: false,
			assign_root: false,
			assign_leaves_only: false,
		}
	}

	pub fn with_oai_name(mut self, oai_name: impl Into<String>) -> Self {
		self.oai_name = Some(oai_name.into());
		self
	}

	pub fn with_position(mut self, position: i32) -> Self {
		self.position = Some(position);
		self
	}

	/// Exposed to OAI harvesters
	pub fn oai_visible(mut self) -> Self {
		self.visible_oai = true;
		self
	}

	pub fn hidden(mut self) -> Self {
		self.visible = false;
		self
	}

	pub fn assign_root(mut self, allowed: bool) -> Self {
		self.assign_root = allowed;
		self
	}

	pub fn assign_leaves_only(mut self, leaves_only: bool) -> Self {
		self.assign_leaves_only = leaves_only;
		self
	}
}

/// Stored collection role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRole {
	pub id: RoleId,
	pub name: String,
	pub oai_name: Option<String>,
	pub position: i32,
	pub visible: bool,
	pub visible_browsing_start: bool,
	pub visible_frontdoor: bool,
	pub visible_oai: bool,
	pub display_browsing: Option<String>,
	pub display_frontdoor: Option<String>,
	pub is_classification: bool,
	pub assign_root: bool,
	pub assign_leaves_only: bool,
	/// Root of the role's tree, once added
	pub root_id: Option<CollectionId>,
}

impl CollectionRole {
	pub fn from_model(model: collection_role::Model, root_id: Option<CollectionId>) -> Self {
		Self {
			id: model.id,
			name: model.name,
			oai_name: model.oai_name,
			position: model.position,
			visible: model.visible,
			visible_browsing_start: model.visible_browsing_start,
			visible_frontdoor: model.visible_frontdoor,
			visible_oai: model.visible_oai,
			display_browsing: model.display_browsing,
			display_frontdoor: model.display_frontdoor,
			is_classification: model.is_classification,
			assign_root: model.assign_root,
			assign_leaves_only: model.assign_leaves_only,
			root_id,
		}
	}

	pub fn has_root(&self) -> bool {
		self.root_id.is_some()
	}
}

/// Partial update of a role's attributes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAttributes {
	pub name: Option<String>,
	pub oai_name: Option<Option<String>>,
	pub position: Option<i32>,
	pub visible: Option<bool>,
	pub visible_browsing_start: Option<bool>,
	pub visible_frontdoor: Option<bool>,
	pub visible_oai: Option<bool>,
	pub display_browsing: Option<Option<String>>,
	pub display_frontdoor: Option<Option<String>>,
	pub is_classification: Option<bool>,
	pub assign_root: Option<bool>,
	pub assign_leaves_only: Option<bool>,
}

impl RoleAttributes {
	/// Whether applying these attributes to `current` changes how documents
	/// linked into the role are rendered.
	pub fn changes_display_of(&self, current: &CollectionRole) -> bool {
		self.name.as_ref().is_some_and(|v| v.trim() != current.name)
			|| self
				.oai_name
				.as_ref()
				.is_some_and(|v| normalize_oai_name(v.as_deref()) != current.oai_name)
			|| self.visible.is_some_and(|v| v != current.visible)
			|| self
				.visible_browsing_start
				.is_some_and(|v| v != current.visible_browsing_start)
			|| self.visible_frontdoor.is_some_and(|v| v != current.visible_frontdoor)
			|| self.visible_oai.is_some_and(|v| v != current.visible_oai)
			|| self
				.display_browsing
				.as_ref()
				.is_some_and(|v| *v != current.display_browsing)
			|| self
				.display_frontdoor
				.as_ref()
				.is_some_and(|v| *v != current.display_frontdoor)
	}
}

/// Stored form of an OAI name: trimmed, blank means absent.
pub(crate) fn normalize_oai_name(value: Option<&str>) -> Option<String> {
	value
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_owned)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stored(role: NewCollectionRole) -> CollectionRole {
		CollectionRole {
			id: 1,
			name: role.name,
			oai_name: role.oai_name,
			position: 10,
			visible: role.visible,
			visible_browsing_start: role.visible_browsing_start,
			visible_frontdoor: role.visible_frontdoor,
			visible_oai: role.visible_oai,
			display_browsing: role.display_browsing,
			display_frontdoor: role.display_frontdoor,
			is_classification: role.is_classification,
			assign_root: role.assign_root,
			assign_leaves_only: role.assign_leaves_only,
			root_id: Some(1),
		}
	}

	#[test]
	fn test_blank_oai_names_are_absent() {
		assert_eq!(normalize_oai_name(None), None);
		assert_eq!(normalize_oai_name(Some("  ")), None);
		assert_eq!(normalize_oai_name(Some(" ddc ")), Some("ddc".to_string()));
	}

	#[test]
	fn test_every_visibility_flag_changes_display() {
		let current = stored(NewCollectionRole::new("ddc"));
		let flips = [
			RoleAttributes {
				visible: Some(false),
				..Default::default()
			},
			RoleAttributes {
				visible_browsing_start: Some(true),
				..Default::default()
			},
			RoleAttributes {
				visible_frontdoor: Some(true),
				..Default::default()
			},
			RoleAttributes {
				visible_oai: Some(true),
				..Default::default()
			},
		];

		for attrs in &flips {
			assert!(attrs.changes_display_of(&current), "{attrs:?}");
		}
	}

	#[test]
	fn test_equivalent_names_do_not_change_display() {
		let current = stored(NewCollectionRole::new("ddc").with_oai_name("ddc"));

		let same = RoleAttributes {
			name: Some(" ddc ".into()),
			oai_name: Some(Some(" ddc".into())),
			position: Some(50),
			..Default::default()
		};
		assert!(!same.changes_display_of(&current));

		let blank = RoleAttributes {
			oai_name: Some(Some("  ".into())),
			..Default::default()
		};
		assert!(!blank.changes_display_of(&stored(NewCollectionRole::new("msc"))));
		assert!(blank.changes_display_of(&current));
	}
}
