//! Blob Volumes CLI
//!
//! Command-line access to a blob volume store.
//!
//! ## Usage
//!
//! ```bash
//! # Write a default config into the storage directory
//! blob-volumes --storage-dir /data/blobs init
//!
//! # Store a file, prints {"id":1,"volume_id":1}
//! blob-volumes store photo.png --mime-type image/png
//!
//! # Fetch it back
//! blob-volumes get --id 1 --volume-id 1 --output photo-copy.png
//!
//! # Delete it
//! blob-volumes delete --id 1 --volume-id 1
//!
//! # Per-volume statistics
//! blob-volumes volumes
//! ```
//!
//! ## Exit codes
//!
//! - `0` success
//! - `1` server-side failure (database, allocation, configuration)
//! - `2` item or volume not found
//! - `3` rejected input (mime type, size)

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use blob_volumes::{Config, ErrorClass, StorageEngine, StorageError, VolumeRegistry};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blob-volumes")]
#[command(about = "Blob storage sharded across bounded SQLite volumes")]
struct Args {
    /// Path to config file (TOML, or JSON with a .json extension)
    #[arg(short, long, env = "BLOB_VOLUMES_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default config file if none exists
    Init,

    /// Store a file
    Store {
        /// File to store
        file: PathBuf,

        /// Mime type of the file
        #[arg(long)]
        mime_type: String,
    },

    /// Write a stored item to a file or stdout
    Get {
        #[arg(long)]
        id: u64,

        #[arg(long)]
        volume_id: u32,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a stored item
    Delete {
        #[arg(long)]
        id: u64,

        #[arg(long)]
        volume_id: u32,
    },

    /// Print per-volume statistics as JSON
    Volumes,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("blob_volumes=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    // Ensure volume directory exists
    tokio::fs::create_dir_all(config.volumes_dir())
        .await
        .with_context(|| format!("creating {}", config.volumes_dir().display()))?;

    if let Command::Init = args.command {
        let config_path = config.config_path();
        if config_path.exists() {
            info!(path = %config_path.display(), "Config already exists");
        } else {
            config.save(&config_path)?;
            info!(path = %config_path.display(), "Created default config");
        }
        return Ok(ExitCode::SUCCESS);
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        max_volume_size_mb = config.max_volume_size_mb,
        max_item_size_mb = config.max_item_size_mb,
        "Opening blob volumes"
    );

    let registry = VolumeRegistry::from_config(&config).context("building volume registry")?;
    let engine = StorageEngine::new(Arc::new(registry));

    // Engine calls block on SQLite; keep them off the async workers
    let outcome = tokio::task::spawn_blocking(move || run(&engine, args.command)).await?;

    match outcome {
        Ok(code) => Ok(code),
        Err(e) => {
            error!(error = %e, "Command failed");
            Ok(exit_code(e.class()))
        }
    }
}

fn run(engine: &StorageEngine, command: Command) -> Result<ExitCode, StorageError> {
    match command {
        Command::Init => Ok(ExitCode::SUCCESS),

        Command::Store { file, mime_type } => {
            let reader = std::fs::File::open(&file)?;
            let address = engine.store_item(reader, Some(mime_type.as_str()))?;
            info!(%address, file = %file.display(), "Stored item");
            print_json(&address)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Get { id, volume_id, output } => {
            let Some(item) = engine.get_item(id, volume_id)? else {
                error!(id, volume_id, "Item not found");
                return Ok(exit_code(ErrorClass::NotFound));
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, &item.content)?;
                    info!(
                        id,
                        volume_id,
                        mime_type = %item.mime_type,
                        path = %path.display(),
                        "Wrote item"
                    );
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&item.content)?;
                    stdout.flush()?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Delete { id, volume_id } => {
            engine.delete_item(id, volume_id)?;
            info!(id, volume_id, "Deleted item");
            Ok(ExitCode::SUCCESS)
        }

        Command::Volumes => {
            print_json(&engine.stats()?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::Internal(format!("Cannot serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn exit_code(class: ErrorClass) -> ExitCode {
    match class {
        ErrorClass::Server => ExitCode::from(1),
        ErrorClass::NotFound => ExitCode::from(2),
        ErrorClass::ClientInput => ExitCode::from(3),
    }
}
