//! Catalog CLI: create, update and inspect videos from the command line.
//!
//! Configuration comes from the environment (or `.env`); see `CatalogConfig`.

use anyhow::Context;
use catalog_cli::{init_tracing, parse_file_arg, read_upload};
use catalog_core::models::{Rating, RelationSets, VideoAttributes, VideoInput};
use catalog_core::{CatalogConfig, ErrorMetadata};
use catalog_db::{connect, run_migrations, PgCatalogStore};
use catalog_services::{UnitOfWorkConfig, VideoService};
use catalog_storage::create_storage;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "catalog", about = "Video catalog CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create a video
    Create(VideoArgs),
    /// Update a video; fields without a --file keep their current object
    Update {
        /// Video UUID
        id: Uuid,
        #[command(flatten)]
        video: VideoArgs,
    },
    /// Show a video with its categories and genres
    Show {
        /// Video UUID
        id: Uuid,
    },
}

#[derive(Args)]
struct VideoArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: String,
    /// Four-digit launch year
    #[arg(long)]
    year: i32,
    /// One of L, 10, 12, 14, 16, 18
    #[arg(long)]
    rating: Rating,
    /// Duration in minutes
    #[arg(long)]
    duration: i32,
    #[arg(long)]
    opened: bool,
    /// Category UUID (repeatable)
    #[arg(long = "category", required = true)]
    categories: Vec<Uuid>,
    /// Genre UUID (repeatable)
    #[arg(long = "genre", required = true)]
    genres: Vec<Uuid>,
    /// Attachment as FIELD=PATH, FIELD one of video, thumb, banner, trailer (repeatable)
    #[arg(long = "file")]
    files: Vec<String>,
}

impl VideoArgs {
    async fn into_input(self) -> anyhow::Result<VideoInput> {
        let mut input = VideoInput::new(
            VideoAttributes {
                title: self.title,
                description: self.description,
                year_launched: self.year,
                opened: self.opened,
                rating: self.rating,
                duration: self.duration,
            },
            RelationSets::new(self.categories, self.genres),
        );
        for arg in &self.files {
            let (field, path) = parse_file_arg(arg)?;
            input = input.with_upload(read_upload(field, &path).await?);
        }
        Ok(input)
    }
}

#[derive(Serialize)]
struct CleanupSummary {
    deleted: Vec<String>,
    deferred: Vec<String>,
    failed: Vec<String>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn video_service(config: &CatalogConfig) -> anyhow::Result<VideoService> {
    let pool = connect(config).await?;
    let storage = create_storage(config)
        .await
        .context("Failed to initialize object storage")?;
    Ok(VideoService::new(
        Arc::new(PgCatalogStore::new(pool)),
        storage,
        UnitOfWorkConfig::from(config),
    ))
}

fn report(error: catalog_core::AppError) -> anyhow::Error {
    tracing::debug!(
        code = error.error_code(),
        recoverable = error.is_recoverable(),
        "Operation failed"
    );
    anyhow::anyhow!("{} ({})", error.detailed_message(), error.error_code())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = CatalogConfig::from_env().context("Failed to load configuration")?;
    config.validate()?;

    match cli.command {
        Commands::Migrate => {
            let pool = connect(&config).await?;
            run_migrations(&pool).await?;
            println!("Migrations applied");
        }
        Commands::Create(args) => {
            let service = video_service(&config).await?;
            let input = args.into_input().await?;
            let created = service.create_video(input).await.map_err(report)?;
            print_json(&created)?;
        }
        Commands::Update { id, video } => {
            let service = video_service(&config).await?;
            let input = video.into_input().await?;
            let updated = service.update_video(id, input).await.map_err(report)?;
            print_json(&updated.video)?;
            if !updated.cleanup.failed.is_empty() {
                print_json(&CleanupSummary {
                    deleted: updated.cleanup.deleted,
                    deferred: updated.cleanup.deferred,
                    failed: updated
                        .cleanup
                        .failed
                        .iter()
                        .map(|e| e.to_string())
                        .collect(),
                })?;
            }
        }
        Commands::Show { id } => {
            let service = video_service(&config).await?;
            let video = service.get_video(id).await.map_err(report)?;
            print_json(&video)?;
        }
    }

    Ok(())
}
