//! Postgres-backed catalog transaction
//!
//! Wraps a single `sqlx` transaction for the lifetime of one unit of work.
//! Link-table writes are batched into one statement per kind and direction.

use async_trait::async_trait;
use catalog_core::models::{TagKind, Video};
use catalog_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::store::CatalogTransaction;
use super::video::VIDEO_COLUMNS;

/// A database transaction that is always finished through `commit` or `rollback`.
///
/// Dropping it unfinished rolls back when the connection returns to the pool.
pub struct PgCatalogTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgCatalogTransaction {
    /// Begin a new database transaction
    pub async fn begin(pool: &PgPool) -> Result<Self, AppError> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| AppError::transaction_abort("Failed to begin database transaction", e))?;
        Ok(Self { tx })
    }
}

#[async_trait]
impl CatalogTransaction for PgCatalogTransaction {
    #[tracing::instrument(skip(self, video), fields(db.table = "videos", db.operation = "insert", db.record_id = %video.id))]
    async fn insert_video(&mut self, video: &Video) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO videos (
                id, title, description, year_launched, opened, rating, duration,
                video_file, thumb_file, banner_file, trailer_file, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(video.id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.year_launched)
        .bind(video.opened)
        .bind(video.rating)
        .bind(video.duration)
        .bind(&video.video_file)
        .bind(&video.thumb_file)
        .bind(&video.banner_file)
        .bind(&video.trailer_file)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, video), fields(db.table = "videos", db.operation = "update", db.record_id = %video.id))]
    async fn update_video(&mut self, video: &Video) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET title = $2, description = $3, year_launched = $4, opened = $5,
                rating = $6, duration = $7, video_file = $8, thumb_file = $9,
                banner_file = $10, trailer_file = $11, updated_at = $12
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(video.id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.year_launched)
        .bind(video.opened)
        .bind(video.rating)
        .bind(video.duration)
        .bind(&video.video_file)
        .bind(&video.thumb_file)
        .bind(&video.banner_file)
        .bind(&video.trailer_file)
        .bind(video.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Video {} not found", video.id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select_for_update", db.record_id = %id))]
    async fn lock_video(&mut self, id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            "SELECT {} FROM videos WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(video)
    }

    #[tracing::instrument(skip(self), fields(db.table = kind.link_table(), db.operation = "select"))]
    async fn linked_ids(&mut self, kind: TagKind, video_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, Uuid>(&format!(
            "SELECT {} FROM {} WHERE video_id = $1",
            kind.link_column(),
            kind.link_table()
        ))
        .bind(video_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = kind.link_table(), db.operation = "insert", count = ids.len()))]
    async fn insert_links(
        &mut self,
        kind: TagKind,
        video_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(&format!(
            "INSERT INTO {} (video_id, {}) SELECT $1, UNNEST($2::uuid[])",
            kind.link_table(),
            kind.link_column()
        ))
        .bind(video_id)
        .bind(ids)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = kind.link_table(), db.operation = "delete", count = ids.len()))]
    async fn delete_links(
        &mut self,
        kind: TagKind,
        video_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE video_id = $1 AND {} = ANY($2)",
            kind.link_table(),
            kind.link_column()
        ))
        .bind(video_id)
        .bind(ids)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::transaction_abort("Failed to commit database transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| AppError::transaction_abort("Failed to rollback database transaction", e))
    }
}
