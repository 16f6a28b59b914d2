//! Relational store interfaces used by the video write path.
//!
//! `CatalogStore` covers reads that happen outside a unit of work (existence
//! checks, coverage queries, the read path). Every mutation goes through a
//! `CatalogTransaction`, which is committed or rolled back exactly once.

use async_trait::async_trait;
use catalog_core::models::{TagKind, Video};
use catalog_core::AppError;
use uuid::Uuid;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Open a relational transaction.
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError>;

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError>;

    /// Tag ids currently linked to a video.
    async fn linked_ids(&self, kind: TagKind, video_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    /// Categories among `category_ids` that have a reference edge to `genre_id`.
    async fn categories_covered_by_genre(
        &self,
        genre_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError>;

    /// Subset of `ids` that refer to live (not soft-deleted) tags.
    async fn existing_ids(&self, kind: TagKind, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError>;
}

#[async_trait]
pub trait CatalogTransaction: Send {
    async fn insert_video(&mut self, video: &Video) -> Result<(), AppError>;

    /// Overwrite scalar attributes and file keys. `NotFound` if the row is gone.
    async fn update_video(&mut self, video: &Video) -> Result<(), AppError>;

    /// Read a video and hold its row lock until the transaction ends.
    async fn lock_video(&mut self, id: Uuid) -> Result<Option<Video>, AppError>;

    async fn linked_ids(&mut self, kind: TagKind, video_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    /// Insert link rows for every id in one statement.
    async fn insert_links(
        &mut self,
        kind: TagKind,
        video_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, AppError>;

    /// Delete link rows for every id in one statement.
    async fn delete_links(
        &mut self,
        kind: TagKind,
        video_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}
