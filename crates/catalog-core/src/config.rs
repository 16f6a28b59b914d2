//! Configuration module
//!
//! Environment-driven configuration for the catalog: database pool, object
//! store backend and the unit-of-work tuning knobs (upload retries, per-video
//! lock timeout, post-commit cleanup mode).

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const UPLOAD_MAX_RETRIES: u32 = 3;
const UPLOAD_RETRY_BASE_DELAY_MS: u64 = 100;

/// When superseded files are removed after a successful update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostCommitCleanup {
    /// Awaited before the update call returns; the cleanup report is returned.
    #[default]
    Inline,
    /// Spawned on the runtime; the update returns as soon as the commit succeeds.
    Background,
}

impl FromStr for PostCommitCleanup {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" => Ok(PostCommitCleanup::Inline),
            "background" => Ok(PostCommitCleanup::Background),
            _ => Err(anyhow::anyhow!("Invalid post-commit cleanup mode: {}", s)),
        }
    }
}

impl Display for PostCommitCleanup {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PostCommitCleanup::Inline => write!(f, "inline"),
            PostCommitCleanup::Background => write!(f, "background"),
        }
    }
}

/// Catalog configuration
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Unit of work
    pub upload_max_retries: u32,
    pub upload_retry_base_delay_ms: u64,
    /// None waits for the per-video lock indefinitely.
    pub entity_lock_timeout_ms: Option<u64>,
    pub post_commit_cleanup: PostCommitCleanup,
}

impl CatalogConfig {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::Local);

        let post_commit_cleanup = env::var("POST_COMMIT_CLEANUP")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<PostCommitCleanup>())
            .transpose()?
            .unwrap_or_default();

        let config = CatalogConfig {
            environment,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok().filter(|s| !s.is_empty()),
            s3_region: env::var("S3_REGION").ok().filter(|s| !s.is_empty()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            aws_region: env::var("AWS_REGION").ok().filter(|s| !s.is_empty()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .ok()
                .filter(|s| !s.is_empty()),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            upload_max_retries: env::var("UPLOAD_MAX_RETRIES")
                .unwrap_or_else(|_| UPLOAD_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(UPLOAD_MAX_RETRIES),
            upload_retry_base_delay_ms: env::var("UPLOAD_RETRY_BASE_DELAY_MS")
                .unwrap_or_else(|_| UPLOAD_RETRY_BASE_DELAY_MS.to_string())
                .parse()
                .unwrap_or(UPLOAD_RETRY_BASE_DELAY_MS),
            entity_lock_timeout_ms: env::var("ENTITY_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&ms: &u64| ms > 0),
            post_commit_cleanup,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "The memory storage backend cannot be used in production"
                    ));
                }
            }
        }

        Ok(())
    }
}
