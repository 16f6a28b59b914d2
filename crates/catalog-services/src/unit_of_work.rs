//! Unit-of-work coordinator
//!
//! Owns one relational transaction for the duration of a create or update and
//! tracks every object written to the object store while it is open. The
//! relational commit is the only point of durability: if anything fails before
//! or during it, every staged object is deleted again.
//!
//! ```text
//! Open --commit--> Committing --ok--> Committed
//!   |                  |
//!   |                  +--err--> Aborting --> Aborted
//!   +--abort------------------> Aborting --> Aborted
//! ```

use catalog_core::models::{Upload, VideoFileField};
use catalog_core::AppError;
use catalog_db::{CatalogStore, CatalogTransaction};
use catalog_storage::{object_key, Storage};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::UnitOfWorkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Open,
    Committing,
    Committed,
    Aborting,
    Aborted,
}

/// An object written (or being written) under this unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub field: VideoFileField,
    pub object_key: String,
    /// False while the upload is still being attempted or after it failed.
    pub written_in_this_unit: bool,
}

/// Outcome of deleting the staged objects of an aborted unit of work.
#[derive(Debug, Default)]
pub struct CompensationReport {
    pub deleted: Vec<String>,
    /// One `StorageDelete` per object that could not be removed.
    pub failed: Vec<AppError>,
}

impl CompensationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Proof that a unit of work committed. Only [`UnitOfWork::commit`] creates one.
#[derive(Debug)]
pub struct CommitToken {
    unit_id: Uuid,
    captured_old_keys: BTreeMap<VideoFileField, String>,
}

impl CommitToken {
    pub fn unit_id(&self) -> Uuid {
        self.unit_id
    }

    pub fn captured_old_keys(&self) -> &BTreeMap<VideoFileField, String> {
        &self.captured_old_keys
    }
}

pub struct UnitOfWork {
    id: Uuid,
    state: UnitState,
    txn: Option<Box<dyn CatalogTransaction>>,
    storage: Arc<dyn Storage>,
    files: Vec<PendingFile>,
    captured_old_keys: BTreeMap<VideoFileField, String>,
    config: UnitOfWorkConfig,
    cancel: CancellationToken,
}

impl UnitOfWork {
    /// Open a relational transaction and start tracking staged files.
    pub async fn begin(
        store: &dyn CatalogStore,
        storage: Arc<dyn Storage>,
        config: UnitOfWorkConfig,
        cancel: CancellationToken,
    ) -> Result<Self, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let txn = store.begin().await?;
        let id = Uuid::new_v4();
        tracing::debug!(unit_id = %id, "Unit of work opened");

        Ok(Self {
            id,
            state: UnitState::Open,
            txn: Some(txn),
            storage,
            files: Vec::new(),
            captured_old_keys: BTreeMap::new(),
            config,
            cancel,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn pending_files(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn captured_old_keys(&self) -> &BTreeMap<VideoFileField, String> {
        &self.captured_old_keys
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.state != UnitState::Open {
            return Err(AppError::Internal(format!(
                "Unit of work {} is {:?}, expected Open",
                self.id, self.state
            )));
        }
        Ok(())
    }

    pub fn check_cancelled(&self) -> Result<(), AppError> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    /// The open relational transaction.
    pub fn txn(&mut self) -> Result<&mut dyn CatalogTransaction, AppError> {
        self.ensure_open()?;
        match self.txn.as_mut() {
            Some(txn) => Ok(txn.as_mut()),
            None => Err(AppError::Internal(format!(
                "Unit of work {} has no open transaction",
                self.id
            ))),
        }
    }

    /// Keep the first key recorded for a field; later captures are ignored.
    pub(crate) fn record_old_key(&mut self, field: VideoFileField, key: String) {
        self.captured_old_keys.entry(field).or_insert(key);
    }

    /// Write an upload under a fresh key for `video_id` and return the key.
    ///
    /// Transient store failures are retried up to `upload_max_retries` times
    /// with a linearly growing delay. The key is tracked before the first
    /// attempt, so a write that failed halfway is still compensated.
    /// Cancellation is honored between attempts and during the backoff, never
    /// while a put is in flight.
    #[tracing::instrument(skip(self, upload), fields(unit_id = %self.id, field = %upload.field))]
    pub async fn stage_file(&mut self, video_id: Uuid, upload: &Upload) -> Result<String, AppError> {
        self.ensure_open()?;
        self.check_cancelled()?;

        let key = object_key(video_id, upload.extension().as_deref());
        self.files.push(PendingFile {
            field: upload.field,
            object_key: key.clone(),
            written_in_this_unit: false,
        });
        let index = self.files.len() - 1;

        let mut attempt: u32 = 0;
        loop {
            // Backends may finish a write on a detached task, so an attempt
            // always runs to completion before the token is observed.
            let result = self
                .storage
                .put(&key, &upload.content_type, upload.data.clone())
                .await;
            if result.is_ok() {
                self.files[index].written_in_this_unit = true;
            }
            if self.cancel.is_cancelled() {
                tracing::info!(object_key = %key, "Staging cancelled after upload attempt");
                return Err(AppError::Cancelled);
            }

            match result {
                Ok(()) => {
                    tracing::info!(
                        object_key = %key,
                        size_bytes = upload.size(),
                        attempts = attempt + 1,
                        "Staged file"
                    );
                    return Ok(key);
                }
                Err(e) if e.is_transient() && attempt < self.config.upload_max_retries => {
                    attempt += 1;
                    let delay = self.config.upload_retry_base_delay * attempt;
                    tracing::warn!(
                        error = %e,
                        object_key = %key,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Upload failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        object_key = %key,
                        attempts = attempt + 1,
                        "Upload failed"
                    );
                    return Err(AppError::StorageWrite {
                        key,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Commit the relational transaction.
    ///
    /// On failure the staged files are deleted and the commit error is
    /// returned unchanged.
    pub async fn commit(mut self) -> Result<CommitToken, AppError> {
        if let Err(e) = self.ensure_open() {
            return Err(self.abort(e).await);
        }
        if self.cancel.is_cancelled() {
            return Err(self.abort(AppError::Cancelled).await);
        }
        let Some(txn) = self.txn.take() else {
            let error = AppError::Internal(format!("Unit of work {} has no transaction", self.id));
            return Err(self.abort(error).await);
        };

        self.state = UnitState::Committing;
        match txn.commit().await {
            Ok(()) => {
                self.state = UnitState::Committed;
                tracing::info!(
                    unit_id = %self.id,
                    staged_files = self.files.len(),
                    replaced_files = self.captured_old_keys.len(),
                    "Unit of work committed"
                );
                Ok(CommitToken {
                    unit_id: self.id,
                    captured_old_keys: std::mem::take(&mut self.captured_old_keys),
                })
            }
            Err(e) => {
                self.state = UnitState::Aborting;
                tracing::error!(
                    error = %e,
                    unit_id = %self.id,
                    staged_files = self.files.len(),
                    "Commit failed, deleting staged files"
                );
                self.compensate().await;
                self.state = UnitState::Aborted;
                Err(e)
            }
        }
    }

    /// Roll back and delete every staged file, returning `cause` unchanged.
    pub async fn abort(self, cause: AppError) -> AppError {
        self.abort_with_report(cause).await.0
    }

    pub async fn abort_with_report(mut self, cause: AppError) -> (AppError, CompensationReport) {
        self.state = UnitState::Aborting;
        tracing::warn!(
            error = %cause,
            unit_id = %self.id,
            staged_files = self.files.len(),
            "Aborting unit of work"
        );

        if let Some(txn) = self.txn.take() {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %cause,
                    unit_id = %self.id,
                    "Failed to rollback transaction"
                );
            }
        }

        let report = self.compensate().await;
        self.state = UnitState::Aborted;
        (cause, report)
    }

    async fn compensate(&mut self) -> CompensationReport {
        let keys: Vec<String> = self.files.iter().map(|f| f.object_key.clone()).collect();
        let report = delete_staged(
            Arc::clone(&self.storage),
            keys,
            self.config.delete_concurrency,
            self.id,
        )
        .await;
        self.files.clear();
        report
    }
}

/// Delete every key independently; one failure does not stop the others.
async fn delete_staged(
    storage: Arc<dyn Storage>,
    keys: Vec<String>,
    concurrency: usize,
    unit_id: Uuid,
) -> CompensationReport {
    let results: Vec<_> = stream::iter(keys)
        .map(|key| {
            let storage = Arc::clone(&storage);
            async move {
                let result = storage.delete(&key).await;
                (key, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = CompensationReport::default();
    for (key, result) in results {
        match result {
            Ok(()) => report.deleted.push(key),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    unit_id = %unit_id,
                    object_key = %key,
                    "Failed to delete staged file"
                );
                report.failed.push(AppError::StorageDelete {
                    key,
                    message: e.to_string(),
                });
            }
        }
    }

    if !report.deleted.is_empty() || !report.failed.is_empty() {
        tracing::info!(
            unit_id = %unit_id,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Compensation finished"
        );
    }
    report
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        match self.state {
            UnitState::Committed | UnitState::Aborted => {}
            UnitState::Committing => {
                // Commit outcome unknown: the staged files may be referenced.
                tracing::warn!(
                    unit_id = %self.id,
                    staged_files = self.files.len(),
                    "Unit of work dropped during commit; staged files left in place"
                );
            }
            UnitState::Open | UnitState::Aborting => {
                // Dropping the transaction rolls it back.
                self.txn.take();
                if self.files.is_empty() {
                    return;
                }
                let keys: Vec<String> = self.files.drain(..).map(|f| f.object_key).collect();
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        tracing::warn!(
                            unit_id = %self.id,
                            staged_files = keys.len(),
                            "Unit of work dropped before finishing; deleting staged files in background"
                        );
                        handle.spawn(delete_staged(
                            Arc::clone(&self.storage),
                            keys,
                            self.config.delete_concurrency,
                            self.id,
                        ));
                    }
                    Err(_) => {
                        tracing::error!(
                            unit_id = %self.id,
                            object_keys = ?keys,
                            "Unit of work dropped outside a runtime; staged files were not deleted"
                        );
                    }
                }
            }
        }
    }
}
