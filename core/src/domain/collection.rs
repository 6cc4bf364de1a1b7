//! Collection domain model
//!
//! `NewCollection` is a node that has not been stored yet. `Collection` is a
//! read view of a stored node, always re-read from storage after a mutation.

use serde::{Deserialize, Serialize};

use crate::infra::db::entities::collection;

pub type CollectionId = i32;
pub type RoleId = i32;
pub type DocumentId = i32;

/// Where a new or moved node lands among its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildPosition {
	First,
	Last,
}

/// A detached collection, built before it is inserted into a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCollection {
	/// Must be unset or equal to the parent's role when attached
	pub role_id: Option<RoleId>,
	pub name: Option<String>,
	pub number: Option<String>,
	pub oai_subset: Option<String>,
	pub theme: Option<String>,
	pub visible: bool,
	pub visible_publish: bool,
}

impl Default for NewCollection {
	fn default() -> Self {
		Self {
			role_id: None,
			name: None,
			number: None,
			oai_subset: None,
			theme: None,
			visible: true,
			visible_publish: true,
		}
	}
}

impl NewCollection {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_role(mut self, role_id: RoleId) -> Self {
		self.role_id = Some(role_id);
		self
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_number(mut self, number: impl Into<String>) -> Self {
		self.number = Some(number.into());
		self
	}

	pub fn with_oai_subset(mut self, subset: impl Into<String>) -> Self {
		self.oai_subset = Some(subset.into());
		self
	}

	pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
		self.theme = Some(theme.into());
		self
	}

	pub fn hidden(mut self) -> Self {
		self.visible = false;
		self
	}
}

/// Stored collection node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
	pub id: CollectionId,
	pub role_id: RoleId,
	pub parent_id: Option<CollectionId>,
	pub sort_key: i64,
	pub name: Option<String>,
	pub number: Option<String>,
	pub oai_subset: Option<String>,
	pub theme: Option<String>,
	pub visible: bool,
	pub visible_publish: bool,
}

impl From<collection::Model> for Collection {
	fn from(model: collection::Model) -> Self {
		Self {
			id: model.id,
			role_id: model.role_id,
			parent_id: model.parent_id,
			sort_key: model.sort_key,
			name: model.name,
			number: model.number,
			oai_subset: model.oai_subset,
			theme: model.theme,
			visible: model.visible,
			visible_publish: model.visible_publish,
		}
	}
}

impl Collection {
	pub fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}

	/// OAI subset, if this node is an OAI set boundary
	pub fn oai_subset_name(&self) -> Option<&str> {
		self.oai_subset.as_deref().filter(|subset| !subset.is_empty())
	}

	/// Theme of this node, falling back to the configured default
	pub fn effective_theme<'a>(&'a self, default_theme: &'a str) -> &'a str {
		self.theme
			.as_deref()
			.filter(|theme| !theme.is_empty())
			.unwrap_or(default_theme)
	}

	/// Human readable label: "number name", either part optional
	pub fn display_name(&self) -> String {
		match (self.number.as_deref(), self.name.as_deref()) {
			(Some(number), Some(name)) => format!("{} {}", number, name),
			(Some(number), None) => number.to_string(),
			(None, Some(name)) => name.to_string(),
			(None, None) => String::new(),
		}
	}
}

/// Partial update of a collection's attributes.
///
/// `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAttributes {
	pub name: Option<Option<String>>,
	pub number: Option<Option<String>>,
	pub oai_subset: Option<Option<String>>,
	pub theme: Option<Option<String>>,
	pub visible: Option<bool>,
	pub visible_publish: Option<bool>,
}

impl CollectionAttributes {
	pub fn name(mut self, name: Option<&str>) -> Self {
		self.name = Some(name.map(str::to_owned));
		self
	}

	pub fn number(mut self, number: Option<&str>) -> Self {
		self.number = Some(number.map(str::to_owned));
		self
	}

	pub fn oai_subset(mut self, subset: Option<&str>) -> Self {
		self.oai_subset = Some(subset.map(str::to_owned));
		self
	}

	pub fn theme(mut self, theme: Option<&str>) -> Self {
		self.theme = Some(theme.map(str::to_owned));
		self
	}

	pub fn visible(mut self, visible: bool) -> Self {
		self.visible = Some(visible);
		self
	}

	pub fn visible_publish(mut self, visible_publish: bool) -> Self {
		self.visible_publish = Some(visible_publish);
		self
	}

	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}

	/// Whether applying these attributes to `current` changes anything that
	/// ends up in a rendered document.
	pub fn changes_display_of(&self, current: &Collection) -> bool {
		self.name.as_ref().is_some_and(|v| *v != current.name)
			|| self.number.as_ref().is_some_and(|v| *v != current.number)
			|| self.oai_subset.as_ref().is_some_and(|v| *v != current.oai_subset)
			|| self.theme.as_ref().is_some_and(|v| *v != current.theme)
			|| self.visible.is_some_and(|v| v != current.visible)
			|| self
				.visible_publish
				.is_some_and(|v| v != current.visible_publish)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> Collection {
		Collection {
			id: 1,
			role_id: 1,
			parent_id: Some(0),
			sort_key: 0,
			name: Some("Physics".into()),
			number: Some("530".into()),
			oai_subset: Some(String::new()),
			theme: None,
			visible: true,
			visible_publish: true,
		}
	}

	#[test]
	fn test_effective_theme_falls_back() {
		let mut node = sample();
		assert_eq!(node.effective_theme("plain"), "plain");

		node.theme = Some("dark".into());
		assert_eq!(node.effective_theme("plain"), "dark");
	}

	#[test]
	fn test_empty_oai_subset_is_not_a_set() {
		let mut node = sample();
		assert_eq!(node.oai_subset_name(), None);

		node.oai_subset = Some("phys".into());
		assert_eq!(node.oai_subset_name(), Some("phys"));
	}

	#[test]
	fn test_display_change_detection() {
		let node = sample();

		assert!(!CollectionAttributes::default().changes_display_of(&node));
		assert!(!CollectionAttributes::default()
			.name(Some("Physics"))
			.changes_display_of(&node));
		assert!(CollectionAttributes::default()
			.name(Some("Chemistry"))
			.changes_display_of(&node));
		assert!(CollectionAttributes::default()
			.visible(false)
			.changes_display_of(&node));
	}

	#[test]
	fn test_display_name() {
		let mut node = sample();
		assert_eq!(node.display_name(), "530 Physics");
		node.number = None;
		assert_eq!(node.display_name(), "Physics");
	}
}
