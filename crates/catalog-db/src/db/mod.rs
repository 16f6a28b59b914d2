//! Relational store for the video catalog
//!
//! `store` defines the interfaces the write path depends on. `video` and
//! `transaction` implement them on Postgres; `memory` implements them in
//! process for development and tests.

pub mod memory;
pub mod store;
pub mod transaction;
pub mod video;

pub use memory::{MemoryCatalogStore, MemoryCatalogTransaction};
pub use store::{CatalogStore, CatalogTransaction};
pub use transaction::PgCatalogTransaction;
pub use video::PgCatalogStore;
