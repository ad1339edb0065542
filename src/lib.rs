//! Blob Volumes - blob storage sharded across bounded SQLite volumes
//!
//! Every stored blob gets an address `(id, volume_id)`. Blobs live in
//! "volumes": independent SQLite files that each hold one `entities` table
//! and grow up to a configured size. When no volume has room for a new blob
//! a fresh volume is created (if allowed).
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/blob-volumes/
//! ├── volumes/
//! │   ├── blob_volume_1.db     # entities(id, mime_type, status, content)
//! │   ├── blob_volume_2.db
//! │   └── ...
//! └── config.toml              # Configuration
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use blob_volumes::{Config, StorageEngine, VolumeRegistry};
//!
//! # fn main() -> Result<(), blob_volumes::StorageError> {
//! let config = Config::default();
//! std::fs::create_dir_all(config.volumes_dir())?;
//!
//! let engine = StorageEngine::new(Arc::new(VolumeRegistry::from_config(&config)?));
//! let address = engine.store_bytes(b"hello", "text/plain")?;
//! let item = engine.get_item(address.id, address.volume_id)?;
//! assert_eq!(item.map(|i| i.content), Some(b"hello".to_vec()));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod item;
pub mod registry;
pub mod validator;
pub mod volume;

// Re-exports
pub use config::{Config, StorageConfig};
pub use db::{ConnectionOptions, ConnectionProvider, VolumeNaming};
pub use engine::StorageEngine;
pub use error::{ErrorClass, StorageError};
pub use item::{Item, ItemAddress, ItemStatus};
pub use registry::{AllocationGuard, VolumeRegistry};
pub use validator::ItemValidator;
pub use volume::{UnattachedVolume, Volume, VolumeStats};
