//! Collection tree errors

use sea_orm::DbErr;
use thiserror::Error;

use crate::domain::{CollectionId, DocumentId, RoleId};
use crate::infra::db::retry::{is_transient_db_err, Retryable};

pub type CollectionResult<T> = Result<T, CollectionError>;

#[derive(Debug, Error)]
pub enum CollectionError {
	#[error("{kind} {id} not found")]
	NotFound { kind: &'static str, id: i32 },

	#[error("role {0} already has a root collection")]
	DuplicateRoot(RoleId),

	#[error("collection {0} is the root of its role and can only be deleted with the role")]
	RootDeletion(CollectionId),

	#[error("cannot move collection {node} under collection {target} of a different role")]
	CrossRoleMove {
		node: CollectionId,
		target: CollectionId,
	},

	#[error("cannot move collection {node} under itself or its descendant {target}")]
	CyclicMove {
		node: CollectionId,
		target: CollectionId,
	},

	#[error("role {field} '{value}' is already in use")]
	DuplicateName { field: &'static str, value: String },

	#[error("detached collection belongs to role {found}, parent belongs to role {expected}")]
	RoleMismatch { expected: RoleId, found: RoleId },

	#[error("document {document} cannot be linked to collection {collection}: {reason}")]
	AssignmentNotAllowed {
		document: DocumentId,
		collection: CollectionId,
		reason: &'static str,
	},

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("storage error: {0}")]
	Storage(#[from] DbErr),
}

impl CollectionError {
	pub fn role_not_found(id: RoleId) -> Self {
		Self::NotFound { kind: "role", id }
	}

	pub fn collection_not_found(id: CollectionId) -> Self {
		Self::NotFound {
			kind: "collection",
			id,
		}
	}

	pub fn document_not_found(id: DocumentId) -> Self {
		Self::NotFound {
			kind: "document",
			id,
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}

impl Retryable for CollectionError {
	fn is_transient(&self) -> bool {
		match self {
			Self::Storage(e) => is_transient_db_err(e),
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_structural_errors_are_never_transient() {
		assert!(!CollectionError::DuplicateRoot(1).is_transient());
		assert!(!CollectionError::CyclicMove { node: 1, target: 2 }.is_transient());
		assert!(!CollectionError::collection_not_found(3).is_transient());
	}

	#[test]
	fn test_not_found_message() {
		assert_eq!(
			CollectionError::collection_not_found(7).to_string(),
			"collection 7 not found"
		);
	}
}
