use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

const MIB: u64 = 1024 * 1024;

/// Age rating of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "video_rating"))]
pub enum Rating {
    #[serde(rename = "L")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "L"))]
    Free,
    #[serde(rename = "10")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "10"))]
    Ten,
    #[serde(rename = "12")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "12"))]
    Twelve,
    #[serde(rename = "14")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "14"))]
    Fourteen,
    #[serde(rename = "16")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "16"))]
    Sixteen,
    #[serde(rename = "18")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "18"))]
    Eighteen,
}

impl Rating {
    pub const ALL: [Rating; 6] = [
        Rating::Free,
        Rating::Ten,
        Rating::Twelve,
        Rating::Fourteen,
        Rating::Sixteen,
        Rating::Eighteen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Free => "L",
            Rating::Ten => "10",
            Rating::Twelve => "12",
            Rating::Fourteen => "14",
            Rating::Sixteen => "16",
            Rating::Eighteen => "18",
        }
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rating {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rating::ALL
            .iter()
            .copied()
            .find(|rating| rating.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Invalid rating: {}", s))
    }
}

/// One of the four file attachments a video can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFileField {
    Video,
    Thumb,
    Banner,
    Trailer,
}

impl VideoFileField {
    pub const ALL: [VideoFileField; 4] = [
        VideoFileField::Video,
        VideoFileField::Thumb,
        VideoFileField::Banner,
        VideoFileField::Trailer,
    ];

    /// Column holding the object key for this field.
    pub fn column(&self) -> &'static str {
        match self {
            VideoFileField::Video => "video_file",
            VideoFileField::Thumb => "thumb_file",
            VideoFileField::Banner => "banner_file",
            VideoFileField::Trailer => "trailer_file",
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        match self {
            VideoFileField::Video => 50 * 1024 * 1024 * MIB,
            VideoFileField::Thumb => 5 * MIB,
            VideoFileField::Banner => 10 * MIB,
            VideoFileField::Trailer => 1024 * MIB,
        }
    }

    pub fn allowed_content_type(&self) -> &'static str {
        match self {
            VideoFileField::Video | VideoFileField::Trailer => "video/mp4",
            VideoFileField::Thumb | VideoFileField::Banner => "image/jpeg",
        }
    }
}

impl Display for VideoFileField {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.column())
    }
}

impl FromStr for VideoFileField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        VideoFileField::ALL
            .iter()
            .copied()
            .find(|field| {
                field.column() == normalized || field.column().trim_end_matches("_file") == normalized
            })
            .ok_or_else(|| anyhow::anyhow!("Invalid file field: {}", s))
    }
}

/// Persisted video row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub year_launched: i32,
    pub opened: bool,
    pub rating: Rating,
    pub duration: i32,
    pub video_file: Option<String>,
    pub thumb_file: Option<String>,
    pub banner_file: Option<String>,
    pub trailer_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Build a new, not yet persisted video without any files attached.
    pub fn new(id: Uuid, attributes: VideoAttributes, now: DateTime<Utc>) -> Self {
        Video {
            id,
            title: attributes.title,
            description: attributes.description,
            year_launched: attributes.year_launched,
            opened: attributes.opened,
            rating: attributes.rating,
            duration: attributes.duration,
            video_file: None,
            thumb_file: None,
            banner_file: None,
            trailer_file: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn file_key(&self, field: VideoFileField) -> Option<&str> {
        match field {
            VideoFileField::Video => self.video_file.as_deref(),
            VideoFileField::Thumb => self.thumb_file.as_deref(),
            VideoFileField::Banner => self.banner_file.as_deref(),
            VideoFileField::Trailer => self.trailer_file.as_deref(),
        }
    }

    pub fn set_file_key(&mut self, field: VideoFileField, key: Option<String>) {
        let slot = match field {
            VideoFileField::Video => &mut self.video_file,
            VideoFileField::Thumb => &mut self.thumb_file,
            VideoFileField::Banner => &mut self.banner_file,
            VideoFileField::Trailer => &mut self.trailer_file,
        };
        *slot = key;
    }

    /// Every non-null object key referenced by this video.
    pub fn file_keys(&self) -> Vec<(VideoFileField, &str)> {
        VideoFileField::ALL
            .iter()
            .filter_map(|field| self.file_key(*field).map(|key| (*field, key)))
            .collect()
    }

    /// Overwrite the scalar attributes, leaving files and timestamps alone.
    pub fn apply_attributes(&mut self, attributes: VideoAttributes) {
        self.title = attributes.title;
        self.description = attributes.description;
        self.year_launched = attributes.year_launched;
        self.opened = attributes.opened;
        self.rating = attributes.rating;
        self.duration = attributes.duration;
    }
}

/// Scalar attributes supplied on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VideoAttributes {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 1000, max = 9999, message = "Year must have four digits"))]
    pub year_launched: i32,
    #[serde(default)]
    pub opened: bool,
    pub rating: Rating,
    #[validate(range(min = 0, message = "Duration must not be negative"))]
    pub duration: i32,
}

/// A video together with its current category and genre memberships.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoWithRelations {
    pub video: Video,
    pub category_ids: Vec<Uuid>,
    pub genre_ids: Vec<Uuid>,
}
