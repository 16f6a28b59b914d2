//! Video repository: reads against videos, link tables and the reference relation.

use async_trait::async_trait;
use catalog_core::models::{TagKind, Video};
use catalog_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::store::{CatalogStore, CatalogTransaction};
use super::transaction::PgCatalogTransaction;

pub(crate) const VIDEO_COLUMNS: &str = "id, title, description, year_launched, opened, rating, \
     duration, video_file, thumb_file, banner_file, trailer_file, created_at, updated_at";

/// Postgres implementation of [`CatalogStore`].
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError> {
        Ok(Box::new(PgCatalogTransaction::begin(&self.pool).await?))
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.record_id = %id))]
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            "SELECT {} FROM videos WHERE id = $1 AND deleted_at IS NULL",
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    #[tracing::instrument(skip(self), fields(db.table = kind.link_table()))]
    async fn linked_ids(&self, kind: TagKind, video_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, Uuid>(&format!(
            "SELECT {} FROM {} WHERE video_id = $1",
            kind.link_column(),
            kind.link_table()
        ))
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self, category_ids), fields(db.table = "category_genre", db.record_id = %genre_id, count = category_ids.len()))]
    async fn categories_covered_by_genre(
        &self,
        genre_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError> {
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT category_id FROM category_genre WHERE genre_id = $1 AND category_id = ANY($2)",
        )
        .bind(genre_id)
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = kind.table(), count = ids.len()))]
    async fn existing_ids(&self, kind: TagKind, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = sqlx::query_scalar::<Postgres, Uuid>(&format!(
            "SELECT id FROM {} WHERE id = ANY($1) AND deleted_at IS NULL",
            kind.table()
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(found)
    }
}
