//! Storage engine
//!
//! Entry point for storing, reading and deleting blobs. Picks a volume for
//! each new item with first-fit over the registry, creating a volume when
//! none has room and the config allows it.
//!
//! ## Allocation
//!
//! ```text
//! store_item
//!   ├─ check mime type            (no I/O yet)
//!   ├─ read content, check size
//!   ├─ get_suitable_blob_volume   (locks, scans, unlocks)
//!   │    └─ miss: lock, scan again, create if still none
//!   └─ volume.insert
//! ```
//!
//! Capacity is judged by the size of each volume's file on disk, which is
//! coarser than the bytes actually stored. Two stores may pick the same
//! volume concurrently and push it somewhat past the limit; the limit is a
//! target, not a hard bound.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::item::{Item, ItemAddress};
use crate::registry::VolumeRegistry;
use crate::validator::{mime_type_length_ok, MAX_MIME_TYPE_LEN, MIN_MIME_TYPE_LEN};
use crate::volume::{Volume, VolumeStats};

/// Blob storage over a registry of volumes
#[derive(Clone)]
pub struct StorageEngine {
    registry: Arc<VolumeRegistry>,
}

impl StorageEngine {
    pub fn new(registry: Arc<VolumeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<VolumeRegistry> {
        &self.registry
    }

    /// Store the content read from `content` under the given mime type
    ///
    /// The mime type is checked before anything is read. At most
    /// `max_item_size_bytes + 1` bytes are pulled from the reader.
    pub fn store_item<R: Read>(
        &self,
        content: R,
        mime_type: Option<&str>,
    ) -> Result<ItemAddress, StorageError> {
        let mime_type = self.check_mime_type(mime_type)?;

        let max = self.registry.storage_config().max_item_size_bytes;
        let mut bytes = Vec::new();
        content.take(max.saturating_add(1)).read_to_end(&mut bytes)?;

        let item = Item::committed(mime_type, bytes);
        let size = item.size_bytes();
        if size > max {
            debug!(size, max, "Rejected oversized item");
            return Err(StorageError::TooBigItem { size, max });
        }

        let volume = match self.get_suitable_blob_volume(size)? {
            Some(volume) => volume,
            None => self.allocate_volume(size)?,
        };

        volume.insert(&item)
    }

    /// Store an in-memory blob
    pub fn store_bytes(&self, content: &[u8], mime_type: &str) -> Result<ItemAddress, StorageError> {
        self.store_item(content, Some(mime_type))
    }

    /// Get an item; `Ok(None)` when the volume exists but the item does not
    pub fn get_item(&self, id: u64, volume_id: u32) -> Result<Option<Item>, StorageError> {
        self.volume(volume_id)?.get_by_id(id)
    }

    /// Delete an item; missing items are not an error
    pub fn delete_item(&self, id: u64, volume_id: u32) -> Result<(), StorageError> {
        self.volume(volume_id)?.delete(id)
    }

    /// Create and register the next volume
    pub fn create_new_blob_volume(&self) -> Result<Arc<Volume>, StorageError> {
        self.registry.lock_allocation()?.create_volume()
    }

    /// First volume with room for `desired_space` more bytes
    pub fn get_suitable_blob_volume(&self, desired_space: u64) -> Result<Option<Arc<Volume>>, StorageError> {
        if self.registry.volume_count()? == 0 {
            return Ok(None);
        }

        let guard = self.registry.lock_allocation()?;
        Ok(guard.first_fit(desired_space))
    }

    /// Statistics for every volume, in allocation order
    pub fn stats(&self) -> Result<Vec<VolumeStats>, StorageError> {
        let volumes: HashMap<String, Arc<Volume>> = self.registry.volumes()?;
        let mut stats = volumes
            .values()
            .map(|v| v.stats())
            .collect::<Result<Vec<_>, _>>()?;
        stats.sort_by_key(|s| s.volume_id);
        Ok(stats)
    }

    /// Slow path after a miss: re-check under the lock, then create
    fn allocate_volume(&self, size: u64) -> Result<Arc<Volume>, StorageError> {
        let mut guard = self.registry.lock_allocation()?;

        // someone may have created a volume while we waited
        if let Some(volume) = guard.first_fit(size) {
            return Ok(volume);
        }

        if !self.registry.storage_config().allow_create_new_volumes {
            warn!(size, volumes = guard.len(), "No volume has room and creation is disabled");
            return Err(StorageError::NoVolumeAvailable);
        }

        debug!(size, volumes = guard.len(), "No volume has room, creating one");
        guard.create_volume()
    }

    fn volume(&self, volume_id: u32) -> Result<Arc<Volume>, StorageError> {
        self.registry
            .find_by_id(volume_id)?
            .ok_or(StorageError::NoSuchVolume(volume_id))
    }

    fn check_mime_type<'a>(&self, mime_type: Option<&'a str>) -> Result<&'a str, StorageError> {
        let mime_type = mime_type.ok_or_else(|| {
            StorageError::InvalidMimeType("Mime type should be defined to store the item".to_string())
        })?;

        if mime_type.is_empty() {
            return Err(StorageError::InvalidMimeType(
                "Empty mime type is not allowed to store the item".to_string(),
            ));
        }

        if !mime_type_length_ok(mime_type) {
            return Err(StorageError::InvalidMimeType(format!(
                "Mime type {} is not allowed for the item, length should be between {} and {} characters",
                mime_type, MIN_MIME_TYPE_LEN, MAX_MIME_TYPE_LEN
            )));
        }

        if !self.registry.storage_config().is_mime_type_allowed(mime_type) {
            return Err(StorageError::InvalidMimeType(format!(
                "This mime type is not allowed: {}",
                mime_type
            )));
        }

        Ok(mime_type)
    }
}
