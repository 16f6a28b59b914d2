//! Data models for the catalog
//!
//! Videos own their scalar attributes and four file-reference columns. Their
//! category and genre memberships travel next to them as plain id sets; the
//! models never hold references back into the relation tables.

mod relation;
mod upload;
mod video;

pub use relation::*;
pub use upload::*;
pub use video::*;
