//! Catalog Services Library
//!
//! Atomic create and update of videos whose attachments live in an object
//! store and whose rows and category/genre links live in a relational store.
//! The relational commit is authoritative; object store writes made by a unit
//! of work that does not commit are deleted again, and files replaced by a
//! committed update are deleted only after the commit.

pub mod config;
pub mod coverage;
pub mod entity_lock;
pub mod file_replacement;
pub mod relation_sync;
pub mod unit_of_work;
pub mod video_service;

pub use config::UnitOfWorkConfig;
pub use coverage::validate_coverage;
pub use entity_lock::{EntityLockGuard, EntityLocks};
pub use file_replacement::{capture_old, on_committed, CleanupReport};
pub use relation_sync::{sync_relation, sync_with_current, RelationDelta};
pub use unit_of_work::{CommitToken, CompensationReport, PendingFile, UnitOfWork, UnitState};
pub use video_service::{UpdatedVideo, VideoService};
