//! Relation synchronizer
//!
//! Brings a video's link rows for one tag kind from the current membership to
//! the desired one with at most one batched insert and one batched delete.

use catalog_core::models::{dedup_ids, TagKind};
use catalog_core::AppError;
use std::collections::HashSet;
use uuid::Uuid;

use crate::unit_of_work::UnitOfWork;

/// Link rows to add and remove. Both lists are duplicate-free.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationDelta {
    pub additions: Vec<Uuid>,
    pub removals: Vec<Uuid>,
}

impl RelationDelta {
    /// `additions = desired - current`, `removals = current - desired`.
    pub fn compute(current: &[Uuid], desired: &[Uuid]) -> Self {
        let current = dedup_ids(current);
        let desired = dedup_ids(desired);
        let current_set: HashSet<Uuid> = current.iter().copied().collect();
        let desired_set: HashSet<Uuid> = desired.iter().copied().collect();

        Self {
            additions: desired
                .into_iter()
                .filter(|id| !current_set.contains(id))
                .collect(),
            removals: current
                .into_iter()
                .filter(|id| !desired_set.contains(id))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Apply the delta between `current` and `desired` inside the unit's transaction.
///
/// An empty delta issues no statements. Errors are returned to the caller,
/// which is expected to abort the unit of work.
#[tracing::instrument(skip(unit, current, desired), fields(unit_id = %unit.id(), db.table = kind.link_table()))]
pub async fn sync_relation(
    unit: &mut UnitOfWork,
    video_id: Uuid,
    kind: TagKind,
    current: &[Uuid],
    desired: &[Uuid],
) -> Result<RelationDelta, AppError> {
    let delta = RelationDelta::compute(current, desired);
    if delta.is_empty() {
        tracing::debug!("Relation already in sync");
        return Ok(delta);
    }

    let txn = unit.txn()?;
    if !delta.removals.is_empty() {
        txn.delete_links(kind, video_id, &delta.removals).await?;
    }
    if !delta.additions.is_empty() {
        txn.insert_links(kind, video_id, &delta.additions).await?;
    }

    tracing::debug!(
        added = delta.additions.len(),
        removed = delta.removals.len(),
        "Relation synchronized"
    );
    Ok(delta)
}

/// Read the current membership from the transaction, then sync to `desired`.
pub async fn sync_with_current(
    unit: &mut UnitOfWork,
    video_id: Uuid,
    kind: TagKind,
    desired: &[Uuid],
) -> Result<RelationDelta, AppError> {
    let current = unit.txn()?.linked_ids(kind, video_id).await?;
    sync_relation(unit, video_id, kind, &current, desired).await
}
