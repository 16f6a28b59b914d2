//! Catalog Storage Library
//!
//! This crate provides the object store abstraction used for video attachments
//! and its implementations for S3, the local filesystem and process memory.
//!
//! # Storage key format
//!
//! `{video_id}/{file_uuid}.{ext}`. Keys must not contain `..` or a leading `/`.
//! Key generation is centralized in the `keys` module so all backends stay
//! consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use catalog_core::StorageBackend;
pub use factory::create_storage;
pub use keys::object_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
