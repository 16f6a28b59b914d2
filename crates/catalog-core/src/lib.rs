//! Catalog Core Library
//!
//! This crate provides the domain models, error types and configuration shared
//! by every catalog component: the object store backends, the relational store
//! and the persistence services built on top of them.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{CatalogConfig, PostCommitCleanup};
pub use error::{AppError, CoverageError, ErrorMetadata, LogLevel, TagSet, ValidationKind};
pub use storage_types::StorageBackend;
