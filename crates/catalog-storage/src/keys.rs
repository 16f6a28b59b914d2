//! Shared key generation for storage backends.
//!
//! Key format: `{video_id}/{file_uuid}.{ext}`. A fresh uuid is drawn for every
//! upload, so a replacement file never reuses the key of the file it replaces.

use crate::{StorageError, StorageResult};
use uuid::Uuid;

const FALLBACK_EXTENSION: &str = "bin";

/// Generate the object key for a new file belonging to `video_id`.
pub fn object_key(video_id: Uuid, extension: Option<&str>) -> String {
    format!(
        "{}/{}.{}",
        video_id,
        Uuid::new_v4(),
        extension.unwrap_or(FALLBACK_EXTENSION)
    )
}

/// Reject keys that could escape the store's namespace.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
