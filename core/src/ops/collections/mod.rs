//! Collection tree operations
//!
//! `TreeEditor` owns structural changes, `DocumentLinkIndex` owns document
//! membership, `OaiSetAggregator` answers harvesting queries. The storage
//! helpers below them take any connection so edits compose in one transaction.

pub mod cache_broker;
pub mod documents;
pub mod editor;
pub mod error;
pub mod hierarchy;
pub mod links;
pub mod node_store;
pub mod oai;
pub mod roles;

pub use cache_broker::CacheInvalidationBroker;
pub use documents::DocumentStore;
pub use editor::{DeleteReport, TreeEditor};
pub use error::{CollectionError, CollectionResult};
pub use hierarchy::HierarchyQuery;
pub use links::DocumentLinkIndex;
pub use node_store::NodeStore;
pub use oai::{OaiSet, OaiSetAggregator};
pub use roles::RoleStore;
