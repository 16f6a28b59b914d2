//! Catalog DB Library
//!
//! Relational persistence for videos, their category and genre links and the
//! category/genre reference relation.

pub mod db;
pub mod setup;

pub use db::*;
pub use setup::{connect, run_migrations};
