//! Configuration for blob-volumes

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::{ConnectionOptions, ConnectionProvider, VolumeNaming, DEFAULT_VOLUME_NAME_TEMPLATE};
use crate::error::StorageError;

/// Bytes per configured megabyte
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("blob-volumes")
}

/// Configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory; volume files live in `<storage_dir>/volumes`
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Maximum size of a single volume file in megabytes
    #[serde(default = "default_max_volume_size_mb", alias = "maxBlobVolumeSize")]
    pub max_volume_size_mb: u64,

    /// Maximum size of a stored item in megabytes
    #[serde(default = "default_max_item_size_mb", alias = "maxBlobItemSize")]
    pub max_item_size_mb: u64,

    /// Create a new volume when no existing one has room
    #[serde(default = "default_true", alias = "allowToCreateNewVolumes")]
    pub allow_to_create_new_volumes: bool,

    /// Mime types accepted for storage, e.g. "text/plain" or "image/jpeg"
    #[serde(default = "default_allowed_mime_types", alias = "allowedMimeTypes")]
    pub allowed_mime_types: Vec<String>,

    /// Volume file name template; `{id}` is replaced by the volume id
    #[serde(default = "default_volume_name_template")]
    pub volume_name_template: String,

    /// How long an operation waits on a locked volume, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_volume_size_mb() -> u64 {
    50
}

fn default_max_item_size_mb() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

fn default_allowed_mime_types() -> Vec<String> {
    ["text/plain", "image/jpeg", "image/png", "image/gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_volume_name_template() -> String {
    DEFAULT_VOLUME_NAME_TEMPLATE.to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            max_volume_size_mb: default_max_volume_size_mb(),
            max_item_size_mb: default_max_item_size_mb(),
            allow_to_create_new_volumes: true,
            allowed_mime_types: default_allowed_mime_types(),
            volume_name_template: default_volume_name_template(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// `.json` files are read as JSON, anything else as TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| StorageError::Config(format!("Invalid JSON config: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| StorageError::Config(format!("Invalid TOML config: {}", e)))
        }
    }

    /// Save config to file as TOML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StorageError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StorageError::Config(format!("Cannot serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get volumes directory
    pub fn volumes_dir(&self) -> PathBuf {
        self.storage_dir.join("volumes")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }

    /// Runtime storage limits, with sizes converted to bytes
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            max_volume_size_bytes: self.max_volume_size_mb.saturating_mul(BYTES_PER_MB),
            max_item_size_bytes: self.max_item_size_mb.saturating_mul(BYTES_PER_MB),
            allow_create_new_volumes: self.allow_to_create_new_volumes,
            allowed_mime_types: self.allowed_mime_types.iter().cloned().collect(),
        }
    }

    /// Connection provider for the configured volume directory
    pub fn connection_provider(&self) -> Result<ConnectionProvider, StorageError> {
        let naming = VolumeNaming::from_template(&self.volume_name_template)?;
        let options = ConnectionOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        };
        Ok(ConnectionProvider::new(self.volumes_dir(), naming, options))
    }
}

/// Storage limits the engine enforces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub max_volume_size_bytes: u64,
    pub max_item_size_bytes: u64,
    pub allow_create_new_volumes: bool,
    pub allowed_mime_types: HashSet<String>,
}

impl StorageConfig {
    pub fn is_mime_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.contains(mime_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let storage = config.storage_config();

        assert_eq!(storage.max_volume_size_bytes, 50 * 1_048_576);
        assert_eq!(storage.max_item_size_bytes, 20 * 1_048_576);
        assert!(storage.allow_create_new_volumes);
        assert!(storage.is_mime_type_allowed("text/plain"));
        assert!(!storage.is_mime_type_allowed("bad/mimetype"));
        assert_eq!(config.volumes_dir(), config.storage_dir.join("volumes"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
storage_dir = "/tmp/blobs"
max_item_size_mb = 5
allowed_mime_types = ["application/json"]
"#,
        )
        .unwrap();

        assert_eq!(config.storage_dir, PathBuf::from("/tmp/blobs"));
        assert_eq!(config.max_item_size_mb, 5);
        assert_eq!(config.max_volume_size_mb, 50);
        assert_eq!(config.allowed_mime_types, vec!["application/json"]);
        assert_eq!(config.volume_name_template, "blob_volume_{id}.db");
    }

    #[test]
    fn test_load_legacy_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blobstorage.json");
        std::fs::write(
            &path,
            r#"{
                "maxBlobVolumeSize": 50,
                "maxBlobItemSize": 20,
                "allowToCreateNewVolumes": false,
                "allowedMimeTypes": ["text/plain"]
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_volume_size_mb, 50);
        assert_eq!(config.max_item_size_mb, 20);
        assert!(!config.allow_to_create_new_volumes);
        assert_eq!(config.allowed_mime_types, vec!["text/plain"]);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage_dir = temp_dir.path().to_path_buf();
        config.max_volume_size_mb = 128;

        let path = config.config_path();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.max_volume_size_mb, 128);
        assert_eq!(loaded.storage_dir, temp_dir.path());
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = TempDir::new().unwrap();
        let missing = Config::load(temp_dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(StorageError::Config(_))));

        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "max_volume_size_mb = \"lots\"").unwrap();
        assert!(matches!(Config::load(&path), Err(StorageError::Config(_))));
    }

    #[test]
    fn test_bad_template_is_a_config_error() {
        let config = Config {
            volume_name_template: "no_placeholder.db".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.connection_provider(), Err(StorageError::Config(_))));
    }
}
