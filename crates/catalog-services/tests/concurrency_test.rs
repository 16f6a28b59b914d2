#[path = "helpers/mod.rs"]
mod helpers;

use catalog_core::models::{RelationSets, TagKind, VideoFileField};
use catalog_core::AppError;
use catalog_services::UnitOfWorkConfig;
use helpers::{setup_catalog, setup_catalog_with};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_concurrent_updates_on_same_video_are_serialized() {
    let catalog = setup_catalog();
    let created = catalog
        .service
        .create_video(catalog.input(&[VideoFileField::Video]))
        .await
        .unwrap();
    let id = created.video.id;
    catalog
        .storage
        .slow_puts_from(1, Duration::from_millis(30));

    let first = catalog.input_with(
        RelationSets::new(vec![catalog.c1], vec![catalog.g1]),
        &[VideoFileField::Video],
    );
    let second = catalog.input_with(
        RelationSets::new(vec![catalog.c2], vec![catalog.g2]),
        &[VideoFileField::Video],
    );

    let (a, b) = tokio::join!(
        catalog.service.update_video(id, first),
        catalog.service.update_video(id, second)
    );
    a.unwrap();
    b.unwrap();

    let current = catalog.service.get_video(id).await.unwrap();
    let categories = catalog.memory().links_of(TagKind::Category, id);
    let genres = catalog.memory().links_of(TagKind::Genre, id);
    assert!(
        (categories == vec![catalog.c1] && genres == vec![catalog.g1])
            || (categories == vec![catalog.c2] && genres == vec![catalog.g2])
    );

    // Only the object of the last committed update survives.
    let video_key = current.video.video_file.unwrap();
    assert_eq!(catalog.storage.keys(), vec![video_key]);
}

#[tokio::test]
async fn test_lock_timeout_fails_with_conflict() {
    let catalog = setup_catalog_with(UnitOfWorkConfig {
        entity_lock_timeout: Some(Duration::from_millis(10)),
        upload_retry_base_delay: Duration::from_millis(1),
        ..UnitOfWorkConfig::default()
    });
    let created = catalog
        .service
        .create_video(catalog.input(&[]))
        .await
        .unwrap();
    let id = created.video.id;
    catalog
        .storage
        .slow_puts_from(0, Duration::from_millis(200));

    let service = catalog.service.clone();
    let slow_input = catalog.input(&[VideoFileField::Banner]);
    let slow = tokio::spawn(async move { service.update_video(id, slow_input).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let result = catalog.service.update_video(id, catalog.input(&[])).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let updated = slow.await.unwrap().unwrap();
    assert!(updated.video.video.banner_file.is_some());
}

#[tokio::test]
async fn test_different_videos_update_in_parallel() {
    let catalog = setup_catalog_with(UnitOfWorkConfig {
        entity_lock_timeout: Some(Duration::from_millis(10)),
        ..UnitOfWorkConfig::default()
    });
    let a = catalog.service.create_video(catalog.input(&[])).await.unwrap();
    let b = catalog.service.create_video(catalog.input(&[])).await.unwrap();
    catalog
        .storage
        .slow_puts_from(0, Duration::from_millis(50));

    let (ra, rb) = tokio::join!(
        catalog
            .service
            .update_video(a.video.id, catalog.input(&[VideoFileField::Thumb])),
        catalog
            .service
            .update_video(b.video.id, catalog.input(&[VideoFileField::Thumb]))
    );
    assert!(ra.is_ok());
    assert!(rb.is_ok());
}

#[tokio::test]
async fn test_cancel_during_staging_removes_staged_files() {
    let catalog = setup_catalog();
    catalog
        .storage
        .slow_puts_from(1, Duration::from_millis(200));

    let cancel = CancellationToken::new();
    let service = catalog.service.clone();
    let input = catalog.input(&[VideoFileField::Video, VideoFileField::Thumb]);
    let token = cancel.clone();
    let task = tokio::spawn(async move { service.create_video_cancellable(input, token).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(AppError::Cancelled)));
    // The in-flight put finishes before the cancellation is observed.
    assert_eq!(catalog.storage.written_keys().len(), 2);
    assert!(catalog.storage.is_empty());
    assert_eq!(catalog.memory().video_count(), 0);
}

#[tokio::test]
async fn test_cancel_during_detached_put_leaves_no_object() {
    let catalog = setup_catalog();
    catalog
        .storage
        .slow_puts_from(0, Duration::from_millis(80));
    catalog.storage.detach_slow_puts(true);

    let cancel = CancellationToken::new();
    let service = catalog.service.clone();
    let input = catalog.input(&[VideoFileField::Video]);
    let token = cancel.clone();
    let task = tokio::spawn(async move { service.create_video_cancellable(input, token).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(AppError::Cancelled)));
    assert_eq!(catalog.storage.written_keys().len(), 1);
    assert!(catalog.storage.is_empty());

    // Nothing lands after the cancelled create has returned.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(catalog.storage.is_empty());
    assert_eq!(catalog.memory().video_count(), 0);
}

#[tokio::test]
async fn test_cancel_while_waiting_for_lock() {
    let catalog = setup_catalog();
    let created = catalog
        .service
        .create_video(catalog.input(&[]))
        .await
        .unwrap();
    let id = created.video.id;
    catalog
        .storage
        .slow_puts_from(0, Duration::from_millis(200));

    let service = catalog.service.clone();
    let slow_input = catalog.input(&[VideoFileField::Trailer]);
    let slow = tokio::spawn(async move { service.update_video(id, slow_input).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = catalog
        .service
        .update_video_cancellable(id, catalog.input(&[]), cancel)
        .await;
    assert!(matches!(result, Err(AppError::Cancelled)));

    assert!(slow.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_pre_cancelled_create_writes_nothing() {
    let catalog = setup_catalog();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = catalog
        .service
        .create_video_cancellable(catalog.input(&[VideoFileField::Video]), cancel)
        .await;

    assert!(matches!(result, Err(AppError::Cancelled)));
    assert!(catalog.storage.written_keys().is_empty());
    assert_eq!(catalog.memory().write_count(), 0);
}
