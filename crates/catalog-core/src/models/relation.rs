use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Tag tables a video can be linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Category,
    Genre,
}

impl TagKind {
    /// Table holding the tag records themselves.
    pub fn table(&self) -> &'static str {
        match self {
            TagKind::Category => "categories",
            TagKind::Genre => "genres",
        }
    }

    /// Link table pairing videos with this kind of tag.
    pub fn link_table(&self) -> &'static str {
        match self {
            TagKind::Category => "category_video",
            TagKind::Genre => "genre_video",
        }
    }

    /// Tag id column inside the link table.
    pub fn link_column(&self) -> &'static str {
        match self {
            TagKind::Category => "category_id",
            TagKind::Genre => "genre_id",
        }
    }
}

impl Display for TagKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TagKind::Category => write!(f, "category"),
            TagKind::Genre => write!(f, "genre"),
        }
    }
}

/// Deduplicate ids while keeping their first-seen order.
pub fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Desired category and genre membership of a video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSets {
    pub category_ids: Vec<Uuid>,
    pub genre_ids: Vec<Uuid>,
}

impl RelationSets {
    pub fn new(category_ids: Vec<Uuid>, genre_ids: Vec<Uuid>) -> Self {
        Self {
            category_ids,
            genre_ids,
        }
    }

    pub fn ids(&self, kind: TagKind) -> &[Uuid] {
        match kind {
            TagKind::Category => &self.category_ids,
            TagKind::Genre => &self.genre_ids,
        }
    }

    /// Copy with both sets deduplicated.
    pub fn deduplicated(&self) -> Self {
        Self {
            category_ids: dedup_ids(&self.category_ids),
            genre_ids: dedup_ids(&self.genre_ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_eq!(dedup_ids(&[b, a, b, c, a]), vec![b, a, c]);
        assert!(dedup_ids(&[]).is_empty());
    }

    #[test]
    fn test_relation_sets_deduplicated() {
        let c1 = Uuid::new_v4();
        let g1 = Uuid::new_v4();
        let sets = RelationSets::new(vec![c1, c1], vec![g1, g1, g1]);
        let deduped = sets.deduplicated();
        assert_eq!(deduped.ids(TagKind::Category), &[c1]);
        assert_eq!(deduped.ids(TagKind::Genre), &[g1]);
    }
}
