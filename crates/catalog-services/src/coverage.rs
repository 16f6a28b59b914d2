//! Genre/category coverage validation.
//!
//! Every genre attached to a video must belong (through `category_genre`) to
//! at least one of the attached categories, and together the genres must
//! reach every attached category. Runs before anything is written.

use catalog_core::models::dedup_ids;
use catalog_core::{AppError, CoverageError, TagSet};
use catalog_db::CatalogStore;
use std::collections::HashSet;
use uuid::Uuid;

/// Check the coverage constraint for the desired genre and category sets.
///
/// Store failures are returned as-is; constraint failures as
/// `AppError::Validation`.
#[tracing::instrument(skip_all, fields(genres = genre_ids.len(), categories = category_ids.len()))]
pub async fn validate_coverage(
    store: &dyn CatalogStore,
    genre_ids: &[Uuid],
    category_ids: &[Uuid],
) -> Result<(), AppError> {
    let genres = dedup_ids(genre_ids);
    let categories = dedup_ids(category_ids);

    if categories.is_empty() {
        return Err(CoverageError::EmptySet(TagSet::Categories).into());
    }
    if genres.is_empty() {
        return Err(CoverageError::EmptySet(TagSet::Genres).into());
    }

    let mut found: HashSet<Uuid> = HashSet::with_capacity(categories.len());
    for genre_id in &genres {
        let covered = store
            .categories_covered_by_genre(*genre_id, &categories)
            .await?;
        if covered.is_empty() {
            tracing::debug!(genre_id = %genre_id, "Genre has no attached category");
            return Err(CoverageError::UncoveredGenre {
                genre_id: *genre_id,
            }
            .into());
        }
        found.extend(covered);
    }

    if found.len() != categories.len() {
        let missing: Vec<Uuid> = categories
            .into_iter()
            .filter(|id| !found.contains(id))
            .collect();
        tracing::debug!(missing = missing.len(), "Categories not reached by any genre");
        return Err(CoverageError::UncoveredCategories {
            category_ids: missing,
        }
        .into());
    }

    Ok(())
}
