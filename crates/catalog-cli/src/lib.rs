use anyhow::Context;
use bytes::Bytes;
use catalog_core::models::{Upload, VideoFileField};
use std::path::{Path, PathBuf};

/// Initialize tracing for CLI binaries.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("catalog=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Parse a `field=path` argument, e.g. `thumb=./poster.jpg`.
pub fn parse_file_arg(arg: &str) -> anyhow::Result<(VideoFileField, PathBuf)> {
    let (field, path) = arg
        .split_once('=')
        .with_context(|| format!("Expected FIELD=PATH, got '{}'", arg))?;
    let field: VideoFileField = field.parse()?;
    if path.is_empty() {
        anyhow::bail!("Missing path for {}", field);
    }
    Ok((field, PathBuf::from(path)))
}

/// Content type guessed from the file extension.
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Read a file from disk into an upload for `field`.
pub async fn read_upload(field: VideoFileField, path: &Path) -> anyhow::Result<Upload> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(Upload::new(
        field,
        filename,
        content_type_for(path),
        Bytes::from(data),
    ))
}
