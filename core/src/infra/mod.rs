//! Infrastructure layer - external interfaces

pub mod cache;
pub mod db;
