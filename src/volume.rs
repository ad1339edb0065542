//! Blob volumes
//!
//! A volume owns one SQLite file and the `entities` table inside it. Volumes
//! come into existence in two ways:
//!
//! - discovery: an existing file found in the volume directory is attached
//!   as-is, without touching its schema;
//! - creation: an [`UnattachedVolume`] handed out by the registry is
//!   initialized with a fresh id, which creates the file and its table.
//!
//! Each operation opens its own connection and drops it before returning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::db::{entities, schema, ConnectionProvider};
use crate::error::StorageError;
use crate::item::{Item, ItemAddress};
use crate::validator::ItemValidator;

/// A volume that has not been bound to a file yet
pub struct UnattachedVolume {
    connections: Arc<ConnectionProvider>,
    validator: ItemValidator,
}

impl UnattachedVolume {
    pub(crate) fn new(connections: Arc<ConnectionProvider>, validator: ItemValidator) -> Self {
        Self { connections, validator }
    }

    /// Bind to the volume with the given index, creating its file and schema
    ///
    /// Running this against an existing volume file leaves its data alone.
    pub fn initialize(self, volume_index: u32) -> Result<Volume, StorageError> {
        let volume_name = self.connections.naming().volume_name(volume_index);

        let conn = self.connections.open(&volume_name)?;
        schema::create_entities_table(&conn)?;
        drop(conn);

        let file = self.connections.volume_path(&volume_name);
        info!(volume_id = volume_index, path = %file.display(), "Initialized blob volume");

        Ok(Volume {
            volume_id: volume_index,
            volume_name,
            file,
            connections: self.connections,
            validator: self.validator,
        })
    }
}

/// One storage unit: a file, a table, an id
pub struct Volume {
    volume_id: u32,
    volume_name: String,
    file: PathBuf,
    connections: Arc<ConnectionProvider>,
    validator: ItemValidator,
}

impl Volume {
    /// Attach an already existing volume file
    pub(crate) fn attach(
        connections: Arc<ConnectionProvider>,
        validator: ItemValidator,
        file: PathBuf,
        volume_name: String,
        volume_id: u32,
    ) -> Self {
        Self {
            volume_id,
            volume_name,
            file,
            connections,
            validator,
        }
    }

    pub fn volume_id(&self) -> u32 {
        self.volume_id
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Bytes the volume file occupies on disk
    ///
    /// This is the capacity measure used for allocation. It runs ahead of the
    /// logical content size (page slack, free pages after deletes) and a write
    /// still sitting in the WAL is not counted until it is checkpointed.
    pub fn current_size_bytes(&self) -> u64 {
        std::fs::metadata(&self.file).map(|m| m.len()).unwrap_or(0)
    }

    /// Validate and insert an item, returning its address
    pub fn insert(&self, item: &Item) -> Result<ItemAddress, StorageError> {
        self.validator.validate(item)?;

        let conn = self.connections.open(&self.volume_name)?;
        let id = entities::insert_entity(&conn, &item.mime_type, item.status, &item.content)?;

        let address = ItemAddress::new(id, self.volume_id);
        debug!(%address, size = item.content.len(), "Inserted item");
        Ok(address)
    }

    /// Get an item by its id within this volume
    pub fn get_by_id(&self, id: u64) -> Result<Option<Item>, StorageError> {
        let conn = self.connections.open(&self.volume_name)?;
        entities::get_entity(&conn, id)
    }

    /// Delete an item; deleting a missing id is a no-op
    pub fn delete(&self, id: u64) -> Result<(), StorageError> {
        let conn = self.connections.open(&self.volume_name)?;
        entities::delete_entity(&conn, id)?;
        debug!(volume_id = self.volume_id, id, "Deleted item");
        Ok(())
    }

    pub fn stats(&self) -> Result<VolumeStats, StorageError> {
        let conn = self.connections.open(&self.volume_name)?;
        let item_count = entities::count_entities(&conn)?;
        drop(conn);

        Ok(VolumeStats {
            volume_id: self.volume_id,
            volume_name: self.volume_name.clone(),
            size_bytes: self.current_size_bytes(),
            item_count,
        })
    }
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("volume_id", &self.volume_id)
            .field("volume_name", &self.volume_name)
            .field("file", &self.file)
            .finish()
    }
}

/// Volume statistics
#[derive(Debug, Clone, Serialize)]
pub struct VolumeStats {
    pub volume_id: u32,
    pub volume_name: String,
    pub size_bytes: u64,
    pub item_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionOptions, VolumeNaming};
    use crate::item::ItemStatus;
    use tempfile::TempDir;

    fn unattached(dir: &Path) -> UnattachedVolume {
        let connections = Arc::new(ConnectionProvider::new(
            dir,
            VolumeNaming::default(),
            ConnectionOptions::default(),
        ));
        UnattachedVolume::new(connections, ItemValidator::new())
    }

    #[test]
    fn test_initialize_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let volume = unattached(temp_dir.path()).initialize(3).unwrap();

        assert_eq!(volume.volume_id(), 3);
        assert_eq!(volume.volume_name(), "blob_volume_3.db");
        assert_eq!(volume.file(), temp_dir.path().join("blob_volume_3.db"));
        assert!(volume.file().exists());
        assert!(volume.current_size_bytes() > 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let volume = unattached(temp_dir.path()).initialize(1).unwrap();
        let address = volume.insert(&Item::committed("text/plain", b"kept".to_vec())).unwrap();

        let again = unattached(temp_dir.path()).initialize(1).unwrap();
        let item = again.get_by_id(address.id).unwrap().unwrap();
        assert_eq!(item.content, b"kept");
    }

    #[test]
    fn test_insert_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let volume = unattached(temp_dir.path()).initialize(2).unwrap();

        let address = volume.insert(&Item::committed("text/plain", b"Text content".to_vec())).unwrap();
        assert_eq!(address, ItemAddress::new(1, 2));

        let item = volume.get_by_id(address.id).unwrap().unwrap();
        assert_eq!(item.id, 1);
        assert_eq!(item.mime_type, "text/plain");
        assert_eq!(item.status, ItemStatus::Committed);
        assert_eq!(item.content, b"Text content");

        volume.delete(address.id).unwrap();
        assert!(volume.get_by_id(address.id).unwrap().is_none());

        // deleting again is fine
        volume.delete(address.id).unwrap();
    }

    #[test]
    fn test_insert_propagates_validation_failure() {
        let temp_dir = TempDir::new().unwrap();
        let volume = unattached(temp_dir.path()).initialize(1).unwrap();

        let err = volume.insert(&Item::committed("x", b"data".to_vec())).unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        assert_eq!(volume.stats().unwrap().item_count, 0);
    }

    #[test]
    fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        let volume = unattached(temp_dir.path()).initialize(1).unwrap();
        volume.insert(&Item::committed("text/plain", b"one".to_vec())).unwrap();
        volume.insert(&Item::committed("text/plain", b"two".to_vec())).unwrap();

        let stats = volume.stats().unwrap();
        assert_eq!(stats.volume_id, 1);
        assert_eq!(stats.volume_name, "blob_volume_1.db");
        assert_eq!(stats.item_count, 2);
        assert!(stats.size_bytes > 0);
    }
}
