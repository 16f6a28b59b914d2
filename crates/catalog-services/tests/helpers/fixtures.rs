use bytes::Bytes;
use catalog_core::models::{Rating, RelationSets, Upload, VideoAttributes, VideoFileField, VideoInput};
use catalog_db::MemoryCatalogStore;
use catalog_services::{UnitOfWorkConfig, VideoService};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::faults::{FaultyCatalogStore, FaultyStorage};

/// A seeded catalog: genre g1 belongs to category c1, g2 to c2.
pub struct TestCatalog {
    pub store: FaultyCatalogStore,
    pub storage: Arc<FaultyStorage>,
    pub service: VideoService,
    pub c1: Uuid,
    pub c2: Uuid,
    pub g1: Uuid,
    pub g2: Uuid,
}

impl TestCatalog {
    pub fn memory(&self) -> &MemoryCatalogStore {
        &self.store.inner
    }

    /// Input attached to (c1, g1) with the given uploads.
    pub fn input(&self, uploads: &[VideoFileField]) -> VideoInput {
        self.input_with(RelationSets::new(vec![self.c1], vec![self.g1]), uploads)
    }

    pub fn input_with(&self, relations: RelationSets, uploads: &[VideoFileField]) -> VideoInput {
        uploads
            .iter()
            .fold(VideoInput::new(attributes(), relations), |input, field| {
                input.with_upload(upload(*field))
            })
    }
}

pub fn setup_catalog() -> TestCatalog {
    setup_catalog_with(UnitOfWorkConfig {
        upload_retry_base_delay: Duration::from_millis(1),
        ..UnitOfWorkConfig::default()
    })
}

pub fn setup_catalog_with(config: UnitOfWorkConfig) -> TestCatalog {
    let memory = MemoryCatalogStore::new();
    let (c1, c2, g1, g2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    memory.add_category(c1);
    memory.add_category(c2);
    memory.add_genre(g1);
    memory.add_genre(g2);
    memory.link_genre_to_category(g1, c1);
    memory.link_genre_to_category(g2, c2);

    let store = FaultyCatalogStore::new(memory);
    let storage = Arc::new(FaultyStorage::new());
    let service = VideoService::new(Arc::new(store.clone()), storage.clone(), config);

    TestCatalog {
        store,
        storage,
        service,
        c1,
        c2,
        g1,
        g2,
    }
}

pub fn attributes() -> VideoAttributes {
    VideoAttributes {
        title: "Blade Runner".to_string(),
        description: "A blade runner must pursue and terminate four replicants".to_string(),
        year_launched: 1982,
        opened: true,
        rating: Rating::Fourteen,
        duration: 117,
    }
}

/// A small, valid upload for `field`.
pub fn upload(field: VideoFileField) -> Upload {
    let (filename, content_type) = match field {
        VideoFileField::Video => ("movie.mp4", "video/mp4"),
        VideoFileField::Trailer => ("trailer.mp4", "video/mp4"),
        VideoFileField::Thumb => ("thumb.jpg", "image/jpeg"),
        VideoFileField::Banner => ("banner.jpg", "image/jpeg"),
    };
    Upload::new(
        field,
        filename,
        content_type,
        Bytes::from(format!("{} bytes", field)),
    )
}
