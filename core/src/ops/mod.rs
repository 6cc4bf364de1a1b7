//! Operations on the collection tree

pub mod collections;
