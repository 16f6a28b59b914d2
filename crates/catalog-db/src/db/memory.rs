//! In-process relational store.
//!
//! Transactions buffer their writes and apply them to the shared state only on
//! commit, so a rolled back or dropped transaction leaves nothing behind. Link
//! pairs are unique per table, like the Postgres schema.

use async_trait::async_trait;
use catalog_core::models::{TagKind, Video};
use catalog_core::AppError;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::store::{CatalogStore, CatalogTransaction};

#[derive(Clone, Default)]
struct MemoryState {
    videos: HashMap<Uuid, Video>,
    /// Tag id -> soft-deleted flag
    categories: HashMap<Uuid, bool>,
    genres: HashMap<Uuid, bool>,
    category_video: BTreeSet<(Uuid, Uuid)>,
    genre_video: BTreeSet<(Uuid, Uuid)>,
    /// (genre_id, category_id)
    category_genre: BTreeSet<(Uuid, Uuid)>,
}

impl MemoryState {
    fn tags(&self, kind: TagKind) -> &HashMap<Uuid, bool> {
        match kind {
            TagKind::Category => &self.categories,
            TagKind::Genre => &self.genres,
        }
    }

    fn links(&self, kind: TagKind) -> &BTreeSet<(Uuid, Uuid)> {
        match kind {
            TagKind::Category => &self.category_video,
            TagKind::Genre => &self.genre_video,
        }
    }

    fn links_mut(&mut self, kind: TagKind) -> &mut BTreeSet<(Uuid, Uuid)> {
        match kind {
            TagKind::Category => &mut self.category_video,
            TagKind::Genre => &mut self.genre_video,
        }
    }

    fn linked_ids(&self, kind: TagKind, video_id: Uuid) -> Vec<Uuid> {
        self.links(kind)
            .range((video_id, Uuid::nil())..=(video_id, Uuid::from_u128(u128::MAX)))
            .map(|(_, tag_id)| *tag_id)
            .collect()
    }
}

#[derive(Debug, Clone)]
enum PendingWrite {
    InsertVideo(Video),
    UpdateVideo(Video),
    InsertLinks(TagKind, Uuid, Vec<Uuid>),
    DeleteLinks(TagKind, Uuid, Vec<Uuid>),
}

/// In-memory implementation of [`CatalogStore`].
///
/// Clones share state. Seeding helpers stand in for the category and genre
/// administration that lives outside the video write path.
#[derive(Clone, Default)]
pub struct MemoryCatalogStore {
    state: Arc<Mutex<MemoryState>>,
    writes: Arc<AtomicU64>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    pub fn add_category(&self, id: Uuid) {
        self.lock().categories.insert(id, false);
    }

    pub fn add_genre(&self, id: Uuid) {
        self.lock().genres.insert(id, false);
    }

    /// Soft-delete a category or genre.
    pub fn mark_deleted(&self, kind: TagKind, id: Uuid) {
        let mut state = self.lock();
        let tags = match kind {
            TagKind::Category => &mut state.categories,
            TagKind::Genre => &mut state.genres,
        };
        if let Some(deleted) = tags.get_mut(&id) {
            *deleted = true;
        }
    }

    /// Add a reference edge between a genre and a category.
    pub fn link_genre_to_category(&self, genre_id: Uuid, category_id: Uuid) {
        self.lock().category_genre.insert((genre_id, category_id));
    }

    /// Number of write statements issued through transactions, committed or not.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn video_count(&self) -> usize {
        self.lock().videos.len()
    }

    /// Link rows of one kind for a video, sorted.
    pub fn links_of(&self, kind: TagKind, video_id: Uuid) -> Vec<Uuid> {
        self.lock().linked_ids(kind, video_id)
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    // Commits validate before mutating, so a poisoned state is still consistent.
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError> {
        Ok(Box::new(MemoryCatalogTransaction {
            state: Arc::clone(&self.state),
            writes_counter: Arc::clone(&self.writes),
            pending: Vec::new(),
        }))
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        Ok(self.lock().videos.get(&id).cloned())
    }

    async fn linked_ids(&self, kind: TagKind, video_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self.lock().linked_ids(kind, video_id))
    }

    async fn categories_covered_by_genre(
        &self,
        genre_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError> {
        let state = self.lock();
        Ok(category_ids
            .iter()
            .copied()
            .filter(|category_id| state.category_genre.contains(&(genre_id, *category_id)))
            .collect())
    }

    async fn existing_ids(&self, kind: TagKind, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        let state = self.lock();
        let tags = state.tags(kind);
        Ok(ids
            .iter()
            .copied()
            .filter(|id| matches!(tags.get(id), Some(false)))
            .collect())
    }
}

/// Buffered transaction over a [`MemoryCatalogStore`].
pub struct MemoryCatalogTransaction {
    state: Arc<Mutex<MemoryState>>,
    writes_counter: Arc<AtomicU64>,
    pending: Vec<PendingWrite>,
}

impl MemoryCatalogTransaction {
    /// Shared state with this transaction's pending writes applied.
    fn view(&self) -> Result<MemoryState, AppError> {
        let mut view = lock_state(&self.state).clone();
        for write in &self.pending {
            apply(&mut view, write)?;
        }
        Ok(view)
    }

    fn record(&mut self, write: PendingWrite) -> Result<(), AppError> {
        self.writes_counter.fetch_add(1, Ordering::SeqCst);
        let mut view = self.view()?;
        apply(&mut view, &write)?;
        self.pending.push(write);
        Ok(())
    }
}

fn apply(state: &mut MemoryState, write: &PendingWrite) -> Result<(), AppError> {
    match write {
        PendingWrite::InsertVideo(video) => {
            if state.videos.contains_key(&video.id) {
                return Err(AppError::transaction_abort(
                    "duplicate key value violates unique constraint \"videos_pkey\"",
                    anyhow::anyhow!("video {} already exists", video.id),
                ));
            }
            state.videos.insert(video.id, video.clone());
        }
        PendingWrite::UpdateVideo(video) => match state.videos.get_mut(&video.id) {
            Some(row) => *row = video.clone(),
            None => return Err(AppError::NotFound(format!("Video {} not found", video.id))),
        },
        PendingWrite::InsertLinks(kind, video_id, ids) => {
            if !state.videos.contains_key(video_id) {
                return Err(AppError::transaction_abort(
                    format!("insert on {} violates foreign key to videos", kind.link_table()),
                    anyhow::anyhow!("video {} does not exist", video_id),
                ));
            }
            let links = state.links_mut(*kind);
            if let Some(duplicate) = ids.iter().find(|id| links.contains(&(*video_id, **id))) {
                return Err(AppError::transaction_abort(
                    format!(
                        "duplicate key value violates unique constraint on {}",
                        kind.link_table()
                    ),
                    anyhow::anyhow!("link ({}, {}) already exists", video_id, duplicate),
                ));
            }
            links.extend(ids.iter().map(|id| (*video_id, *id)));
        }
        PendingWrite::DeleteLinks(kind, video_id, ids) => {
            let links = state.links_mut(*kind);
            for id in ids {
                links.remove(&(*video_id, *id));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl CatalogTransaction for MemoryCatalogTransaction {
    async fn insert_video(&mut self, video: &Video) -> Result<(), AppError> {
        self.record(PendingWrite::InsertVideo(video.clone()))
    }

    async fn update_video(&mut self, video: &Video) -> Result<(), AppError> {
        self.record(PendingWrite::UpdateVideo(video.clone()))
    }

    async fn lock_video(&mut self, id: Uuid) -> Result<Option<Video>, AppError> {
        Ok(self.view()?.videos.get(&id).cloned())
    }

    async fn linked_ids(&mut self, kind: TagKind, video_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self.view()?.linked_ids(kind, video_id))
    }

    async fn insert_links(
        &mut self,
        kind: TagKind,
        video_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.record(PendingWrite::InsertLinks(kind, video_id, ids.to_vec()))?;
        Ok(ids.len() as u64)
    }

    async fn delete_links(
        &mut self,
        kind: TagKind,
        video_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let current = self.view()?.linked_ids(kind, video_id);
        let removed = ids.iter().filter(|id| current.contains(id)).count();
        self.record(PendingWrite::DeleteLinks(kind, video_id, ids.to_vec()))?;
        Ok(removed as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mut state = lock_state(&self.state);
        // Validate the whole batch against the current state before touching it.
        let mut staged = state.clone();
        for write in &self.pending {
            apply(&mut staged, write)?;
        }
        *state = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}
