//! Error types module
//!
//! All catalog errors are unified under the `AppError` enum. Persistence
//! failures are split by where they happened: object store writes and deletes,
//! relational transaction failures, and validation failures that are raised
//! before anything is mutated.
//!
//! The `From<sqlx::Error>` conversion is gated behind the `sqlx` feature.

use std::fmt::{Display, Formatter, Result as FmtResult};

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;
use uuid::Uuid;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like lock contention
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// by the controller layer sitting in front of the catalog services.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "TRANSACTION_ABORTED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Which relation set a coverage failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSet {
    Categories,
    Genres,
}

impl Display for TagSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TagSet::Categories => write!(f, "categories"),
            TagSet::Genres => write!(f, "genres"),
        }
    }
}

/// Discriminant of a [`CoverageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    EmptySet,
    UncoveredGenre,
    UncoveredCategories,
}

/// Failure of the category/genre coverage rule.
///
/// Every attached genre must be related (through `category_genre`) to at least
/// one attached category, and the categories reached that way must be exactly
/// the attached category set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoverageError {
    #[error("The {0} set must not be empty")]
    EmptySet(TagSet),

    #[error("Genre {genre_id} is not related to any of the given categories")]
    UncoveredGenre { genre_id: Uuid },

    #[error("Categories not related to any of the given genres: {}", join_ids(.category_ids))]
    UncoveredCategories { category_ids: Vec<Uuid> },
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl CoverageError {
    pub fn kind(&self) -> ValidationKind {
        match self {
            CoverageError::EmptySet(_) => ValidationKind::EmptySet,
            CoverageError::UncoveredGenre { .. } => ValidationKind::UncoveredGenre,
            CoverageError::UncoveredCategories { .. } => ValidationKind::UncoveredCategories,
        }
    }

    pub fn detail(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(#[from] CoverageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to write object {key}: {message}")]
    StorageWrite { key: String, message: String },

    #[error("Failed to delete object {key}: {message}")]
    StorageDelete { key: String, message: String },

    #[error("Transaction aborted: {message}")]
    TransactionAbort {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a transaction failure from any error source.
    pub fn transaction_abort(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        AppError::TransactionAbort {
            message: message.into(),
            source: source.into(),
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::TransactionAbort {
            message: err.to_string(),
            source: anyhow::Error::from(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Validation(_) => (
            422,
            "VALIDATION_FAILED",
            false,
            Some("Attach genres that belong to the selected categories"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::StorageWrite { .. } => (
            500,
            "STORAGE_WRITE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::StorageDelete { .. } => (
            500,
            "STORAGE_DELETE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::TransactionAbort { .. } => (
            500,
            "TRANSACTION_ABORTED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            true,
            Some("Another change to this resource is in progress; retry shortly"),
            false,
            LogLevel::Warn,
        ),
        AppError::Cancelled => (
            499,
            "CANCELLED",
            true,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Validation(_) => "Validation",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::StorageWrite { .. } => "StorageWrite",
            AppError::StorageDelete { .. } => "StorageDelete",
            AppError::TransactionAbort { .. } => "TransactionAbort",
            AppError::Conflict(_) => "Conflict",
            AppError::Cancelled => "Cancelled",
            AppError::Internal(_) => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(ref err) => err.detail(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::StorageWrite { .. } => "Failed to store uploaded file".to_string(),
            AppError::StorageDelete { .. } => "Failed to remove stored file".to_string(),
            AppError::TransactionAbort { .. } => "Failed to save changes".to_string(),
            AppError::Conflict(ref msg) => msg.clone(),
            AppError::Cancelled => "Operation cancelled".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_validation() {
        let genre_id = Uuid::new_v4();
        let err = AppError::from(CoverageError::UncoveredGenre { genre_id });
        assert_eq!(err.http_status_code(), 422);
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains(&genre_id.to_string()));
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_transaction_abort_hides_details() {
        let err = AppError::transaction_abort("commit failed", anyhow::anyhow!("serialization failure"));
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "TRANSACTION_ABORTED");
        assert!(err.is_recoverable());
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to save changes");
        assert!(err.detailed_message().contains("serialization failure"));
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_sqlx_error_maps_to_transaction_abort() {
        let err = AppError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.error_type(), "TransactionAbort");
    }

    #[test]
    fn test_coverage_error_kinds() {
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        let err = CoverageError::UncoveredCategories {
            category_ids: vec![c1, c2],
        };
        assert_eq!(err.kind(), ValidationKind::UncoveredCategories);
        assert!(err.detail().contains(&c1.to_string()));
        assert!(err.detail().contains(&c2.to_string()));

        let err = CoverageError::EmptySet(TagSet::Genres);
        assert_eq!(err.kind(), ValidationKind::EmptySet);
        assert_eq!(err.detail(), "The genres set must not be empty");
    }

    #[test]
    fn test_error_metadata_conflict_is_recoverable() {
        let err = AppError::Conflict("video is locked".to_string());
        assert_eq!(err.http_status_code(), 409);
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
    }
}
