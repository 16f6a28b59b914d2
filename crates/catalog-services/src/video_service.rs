//! Video persistence service
//!
//! Composes validation, the unit-of-work coordinator, relation sync and file
//! replacement into the create and update operations. Order per operation:
//! validate, stage files, write the row and links, commit, clean up.

use catalog_core::models::{
    dedup_ids, validate_uploads, RelationSets, TagKind, Video, VideoInput, VideoWithRelations,
};
use catalog_core::AppError;
use catalog_db::CatalogStore;
use catalog_storage::Storage;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use validator::Validate;

use crate::config::UnitOfWorkConfig;
use crate::coverage::validate_coverage;
use crate::entity_lock::EntityLocks;
use crate::file_replacement::{capture_old, on_committed, CleanupReport};
use crate::relation_sync::{sync_relation, sync_with_current};
use crate::unit_of_work::UnitOfWork;

/// Result of a successful update.
#[derive(Debug)]
pub struct UpdatedVideo {
    pub video: VideoWithRelations,
    pub cleanup: CleanupReport,
}

#[derive(Clone)]
pub struct VideoService {
    store: Arc<dyn CatalogStore>,
    storage: Arc<dyn Storage>,
    locks: Arc<EntityLocks>,
    config: UnitOfWorkConfig,
}

impl VideoService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        storage: Arc<dyn Storage>,
        config: UnitOfWorkConfig,
    ) -> Self {
        Self {
            store,
            storage,
            locks: Arc::new(EntityLocks::new()),
            config,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Fetch a video with its category and genre ids.
    #[tracing::instrument(skip(self))]
    pub async fn get_video(&self, id: Uuid) -> Result<VideoWithRelations, AppError> {
        let video = self
            .store
            .get_video(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))?;
        let category_ids = self.store.linked_ids(TagKind::Category, id).await?;
        let genre_ids = self.store.linked_ids(TagKind::Genre, id).await?;
        Ok(VideoWithRelations {
            video,
            category_ids,
            genre_ids,
        })
    }

    pub async fn create_video(&self, input: VideoInput) -> Result<VideoWithRelations, AppError> {
        self.create_video_cancellable(input, CancellationToken::new())
            .await
    }

    #[tracing::instrument(skip_all, fields(video_id = tracing::field::Empty))]
    pub async fn create_video_cancellable(
        &self,
        input: VideoInput,
        cancel: CancellationToken,
    ) -> Result<VideoWithRelations, AppError> {
        let relations = self.validate_input(&input, &cancel).await?;

        let id = Uuid::new_v4();
        tracing::Span::current().record("video_id", tracing::field::display(id));

        let mut unit = UnitOfWork::begin(
            self.store.as_ref(),
            Arc::clone(&self.storage),
            self.config.clone(),
            cancel,
        )
        .await?;

        let written = self.write_new(&mut unit, id, input, &relations).await;
        let video = match written {
            Ok(video) => video,
            Err(e) => return Err(unit.abort(e).await),
        };

        unit.commit().await?;
        tracing::info!(files = video.file_keys().len(), "Video created");

        Ok(VideoWithRelations {
            video,
            category_ids: relations.category_ids,
            genre_ids: relations.genre_ids,
        })
    }

    async fn write_new(
        &self,
        unit: &mut UnitOfWork,
        id: Uuid,
        input: VideoInput,
        relations: &RelationSets,
    ) -> Result<Video, AppError> {
        let mut video = Video::new(id, input.attributes, Utc::now());
        for upload in &input.uploads {
            let key = unit.stage_file(id, upload).await?;
            video.set_file_key(upload.field, Some(key));
        }

        unit.check_cancelled()?;
        unit.txn()?.insert_video(&video).await?;
        sync_relation(unit, id, TagKind::Category, &[], &relations.category_ids).await?;
        sync_relation(unit, id, TagKind::Genre, &[], &relations.genre_ids).await?;
        Ok(video)
    }

    pub async fn update_video(&self, id: Uuid, input: VideoInput) -> Result<UpdatedVideo, AppError> {
        self.update_video_cancellable(id, input, CancellationToken::new())
            .await
    }

    /// Update attributes, replace uploaded files and resync relations.
    ///
    /// Fields without a new upload keep their current object. Units of work on
    /// the same video run one at a time.
    #[tracing::instrument(skip(self, input, cancel))]
    pub async fn update_video_cancellable(
        &self,
        id: Uuid,
        input: VideoInput,
        cancel: CancellationToken,
    ) -> Result<UpdatedVideo, AppError> {
        let _guard = self
            .locks
            .acquire(id, self.config.entity_lock_timeout, &cancel)
            .await?;

        if self.store.get_video(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Video {} not found", id)));
        }
        let relations = self.validate_input(&input, &cancel).await?;

        let mut unit = UnitOfWork::begin(
            self.store.as_ref(),
            Arc::clone(&self.storage),
            self.config.clone(),
            cancel,
        )
        .await?;

        let written = self.write_existing(&mut unit, id, input, &relations).await;
        let video = match written {
            Ok(video) => video,
            Err(e) => return Err(unit.abort(e).await),
        };

        let token = unit.commit().await?;
        let cleanup = on_committed(token, &video, Arc::clone(&self.storage), &self.config).await;
        tracing::info!(
            replaced = cleanup.deleted.len() + cleanup.deferred.len(),
            cleanup_failures = cleanup.failed.len(),
            "Video updated"
        );

        Ok(UpdatedVideo {
            video: VideoWithRelations {
                video,
                category_ids: relations.category_ids,
                genre_ids: relations.genre_ids,
            },
            cleanup,
        })
    }

    async fn write_existing(
        &self,
        unit: &mut UnitOfWork,
        id: Uuid,
        input: VideoInput,
        relations: &RelationSets,
    ) -> Result<Video, AppError> {
        // Row lock for writers outside this process.
        let current = unit
            .txn()?
            .lock_video(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))?;

        let mut video = current.clone();
        video.apply_attributes(input.attributes);
        video.updated_at = Utc::now();

        for upload in &input.uploads {
            capture_old(unit, upload.field, current.file_key(upload.field));
            let key = unit.stage_file(id, upload).await?;
            video.set_file_key(upload.field, Some(key));
        }

        unit.check_cancelled()?;
        unit.txn()?.update_video(&video).await?;
        sync_with_current(unit, id, TagKind::Category, &relations.category_ids).await?;
        sync_with_current(unit, id, TagKind::Genre, &relations.genre_ids).await?;
        Ok(video)
    }

    /// Input checks that run before any mutation. Returns the deduplicated relation sets.
    async fn validate_input(
        &self,
        input: &VideoInput,
        cancel: &CancellationToken,
    ) -> Result<RelationSets, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        input.attributes.validate()?;
        validate_uploads(&input.uploads)?;

        let relations = input.relations.deduplicated();
        for kind in [TagKind::Category, TagKind::Genre] {
            self.ensure_ids_exist(kind, relations.ids(kind)).await?;
        }
        validate_coverage(
            self.store.as_ref(),
            &relations.genre_ids,
            &relations.category_ids,
        )
        .await?;
        Ok(relations)
    }

    async fn ensure_ids_exist(&self, kind: TagKind, ids: &[Uuid]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let found = dedup_ids(&self.store.existing_ids(kind, ids).await?);
        if found.len() == ids.len() {
            return Ok(());
        }
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();
        Err(AppError::InvalidInput(format!(
            "Unknown or deleted {} ids: {}",
            kind,
            missing.join(", ")
        )))
    }
}
