//! SQLite access for blob volumes
//!
//! Every volume is its own SQLite file holding a single `entities` table.
//! Connections are opened per operation and closed when dropped; nothing is
//! pooled or shared between concurrent callers.
//!
//! ## Volume files
//!
//! ```text
//! <volumes_dir>/
//! ├── blob_volume_1.db
//! ├── blob_volume_2.db
//! └── ...
//! ```

pub mod entities;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::StorageError;

/// Placeholder for the volume id inside a naming template
pub const VOLUME_ID_PLACEHOLDER: &str = "{id}";

/// Default template for volume file names
pub const DEFAULT_VOLUME_NAME_TEMPLATE: &str = "blob_volume_{id}.db";

/// Maps volume ids to file names and back
///
/// Built from a template such as `blob_volume_{id}.db`: everything before the
/// placeholder is the prefix, everything after it the suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeNaming {
    prefix: String,
    suffix: String,
}

impl VolumeNaming {
    pub fn from_template(template: &str) -> Result<Self, StorageError> {
        let mut parts = template.split(VOLUME_ID_PLACEHOLDER);
        let (prefix, suffix) = match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(suffix), None) => (prefix, suffix),
            _ => {
                return Err(StorageError::Config(format!(
                    "Volume name template must contain {} exactly once: {}",
                    VOLUME_ID_PLACEHOLDER, template
                )))
            }
        };

        if prefix.is_empty() && suffix.is_empty() {
            return Err(StorageError::Config(
                "Volume name template needs a prefix or a suffix".to_string(),
            ));
        }
        if template.contains(std::path::is_separator) {
            return Err(StorageError::Config(format!(
                "Volume name template must be a bare file name: {}",
                template
            )));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn volume_name(&self, volume_id: u32) -> String {
        format!("{}{}{}", self.prefix, volume_id, self.suffix)
    }

    /// Whether a file name follows the naming convention
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() > self.prefix.len() + self.suffix.len()
            && file_name.starts_with(&self.prefix)
            && file_name.ends_with(&self.suffix)
    }

    /// Parse the volume id out of a matching file name
    pub fn parse_volume_id(&self, file_name: &str) -> Result<u32, StorageError> {
        let id_part = file_name
            .strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_suffix(&self.suffix))
            .ok_or_else(|| {
                StorageError::Config(format!("Not a volume file name: {}", file_name))
            })?;

        id_part.parse::<u32>().map_err(|e| {
            StorageError::Config(format!(
                "Cannot parse volume ID from {}: {}",
                file_name, e
            ))
        })
    }
}

impl Default for VolumeNaming {
    fn default() -> Self {
        Self {
            prefix: "blob_volume_".to_string(),
            suffix: ".db".to_string(),
        }
    }
}

/// Per-connection settings applied on open
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// How long a writer waits on a locked volume before failing
    pub busy_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// Opens connections to volume files inside one directory
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    volumes_dir: PathBuf,
    naming: VolumeNaming,
    options: ConnectionOptions,
}

impl ConnectionProvider {
    pub fn new(volumes_dir: impl Into<PathBuf>, naming: VolumeNaming, options: ConnectionOptions) -> Self {
        Self {
            volumes_dir: volumes_dir.into(),
            naming,
            options,
        }
    }

    pub fn volumes_dir(&self) -> &Path {
        &self.volumes_dir
    }

    pub fn naming(&self) -> &VolumeNaming {
        &self.naming
    }

    /// Path of the storage file behind a volume name
    pub fn volume_path(&self, volume_name: &str) -> PathBuf {
        self.volumes_dir.join(volume_name)
    }

    /// Open a connection to the named volume, creating the file if missing
    pub fn open(&self, volume_name: &str) -> Result<Connection, StorageError> {
        if volume_name.is_empty() || volume_name.contains(std::path::is_separator) {
            return Err(StorageError::Connection(format!(
                "Invalid volume name: {:?}",
                volume_name
            )));
        }

        let path = self.volume_path(volume_name);
        debug!(path = %path.display(), "Opening volume connection");

        let conn = Connection::open(&path).map_err(|e| {
            StorageError::Connection(format!("Failed to open {}: {}", path.display(), e))
        })?;

        conn.busy_timeout(self.options.busy_timeout)
            .map_err(|e| StorageError::Connection(format!("Failed to set busy timeout: {}", e)))?;

        // WAL lets readers proceed while a writer holds the volume
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| StorageError::Connection(format!("Failed to set journal mode: {}", e)))?;
        conn.pragma_update(None, "encoding", "UTF-8")
            .map_err(|e| StorageError::Connection(format!("Failed to set encoding: {}", e)))?;

        Ok(conn)
    }

    /// Open the volume with the given id, named through the template
    pub fn open_volume(&self, volume_id: u32) -> Result<Connection, StorageError> {
        self.open(&self.naming.volume_name(volume_id))
    }

    /// Open the first volume
    pub fn open_default(&self) -> Result<Connection, StorageError> {
        self.open_volume(1)
    }

    /// Close a connection explicitly, surfacing any close failure
    pub fn close(&self, conn: Connection) -> Result<(), StorageError> {
        conn.close()
            .map_err(|(_, e)| StorageError::Connection(format!("Failed to close connection: {}", e)))
    }
}
