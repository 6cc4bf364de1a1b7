//! Domain models of the collection tree
//!
//! - A role is a classification scheme owning one tree
//! - A collection is one node of that tree
//! - Documents are only known by id and publication state

pub mod collection;
pub mod document;
pub mod role;

pub use collection::{
	ChildPosition, Collection, CollectionAttributes, CollectionId, DocumentId, NewCollection,
	RoleId,
};
pub use document::{DocumentRecord, ServerState};
pub use role::{CollectionRole, NewCollectionRole, RoleAttributes};
