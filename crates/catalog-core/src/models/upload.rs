use bytes::Bytes;
use std::collections::HashSet;

use super::relation::RelationSets;
use super::video::{VideoAttributes, VideoFileField};
use crate::error::AppError;

/// A file received for one of the video's file fields.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: VideoFileField,
    pub original_filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl Upload {
    pub fn new(
        field: VideoFileField,
        original_filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            field,
            original_filename: original_filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Lowercased extension of the original filename, if it has a usable one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.original_filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Everything needed to create or update a video.
#[derive(Debug, Clone)]
pub struct VideoInput {
    pub attributes: VideoAttributes,
    pub relations: RelationSets,
    pub uploads: Vec<Upload>,
}

impl VideoInput {
    pub fn new(attributes: VideoAttributes, relations: RelationSets) -> Self {
        Self {
            attributes,
            relations,
            uploads: Vec::new(),
        }
    }

    pub fn with_upload(mut self, upload: Upload) -> Self {
        self.uploads.push(upload);
        self
    }
}

/// Check upload constraints: one upload per field, size limit, content type.
pub fn validate_uploads(uploads: &[Upload]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for upload in uploads {
        if !seen.insert(upload.field) {
            return Err(AppError::InvalidInput(format!(
                "More than one file supplied for {}",
                upload.field
            )));
        }
        if upload.size() > upload.field.max_size_bytes() {
            return Err(AppError::InvalidInput(format!(
                "{} exceeds the maximum size of {} bytes",
                upload.field,
                upload.field.max_size_bytes()
            )));
        }
        let content_type = upload
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if content_type != upload.field.allowed_content_type() {
            return Err(AppError::InvalidInput(format!(
                "{} must be of type {}, got {}",
                upload.field,
                upload.field.allowed_content_type(),
                upload.content_type
            )));
        }
    }
    Ok(())
}
