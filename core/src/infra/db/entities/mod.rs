//! SeaORM entities for the collection tree

pub mod collection;
pub mod collection_closure;
pub mod collection_role;
pub mod document;
pub mod link_document_collection;

pub use collection::Entity as Collection;
pub use collection_closure::Entity as CollectionClosure;
pub use collection_role::Entity as CollectionRole;
pub use document::Entity as Document;
pub use link_document_collection::Entity as LinkDocumentCollection;
