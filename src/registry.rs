//! Volume registry
//!
//! Holds the storage limits, the ordered list of volumes and the
//! `volume name -> volume` map. The registry is built once at startup by
//! scanning the volume directory and only grows afterwards.
//!
//! Two locks guard the state:
//!
//! - the allocation mutex owns the ordered volume list. Capacity scans and
//!   volume creation happen only through an [`AllocationGuard`], so at most
//!   one caller can be choosing or minting a volume at a time;
//! - the name map sits behind a read-write lock so lookups by id never wait
//!   on allocation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};

use tracing::{debug, info};

use crate::config::{Config, StorageConfig};
use crate::db::ConnectionProvider;
use crate::error::StorageError;
use crate::validator::ItemValidator;
use crate::volume::{UnattachedVolume, Volume};

/// Registry of known volumes
pub struct VolumeRegistry {
    storage: StorageConfig,
    connections: Arc<ConnectionProvider>,
    validator: ItemValidator,
    /// Volumes in allocation order (ascending id)
    allocation: Mutex<Vec<Arc<Volume>>>,
    by_name: RwLock<HashMap<String, Arc<Volume>>>,
}

impl VolumeRegistry {
    /// Build the registry from a config file's contents
    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        Self::open(config.storage_config(), config.connection_provider()?)
    }

    /// Build the registry, discovering existing volumes
    ///
    /// An empty volume directory is fine; one that cannot be listed is not.
    pub fn open(storage: StorageConfig, connections: ConnectionProvider) -> Result<Self, StorageError> {
        let connections = Arc::new(connections);
        let validator = ItemValidator::new();
        let volumes = discover_volumes(&connections, validator)?;

        info!(
            path = %connections.volumes_dir().display(),
            volumes = volumes.len(),
            "Discovered blob volumes"
        );

        let by_name = volumes
            .iter()
            .map(|v| (v.volume_name().to_string(), Arc::clone(v)))
            .collect();

        Ok(Self {
            storage,
            connections,
            validator,
            allocation: Mutex::new(volumes),
            by_name: RwLock::new(by_name),
        })
    }

    pub fn storage_config(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn connections(&self) -> &ConnectionProvider {
        &self.connections
    }

    /// A fresh volume that still has to be initialized with an id
    pub fn new_volume(&self) -> UnattachedVolume {
        UnattachedVolume::new(Arc::clone(&self.connections), self.validator)
    }

    pub fn volume_count(&self) -> Result<usize, StorageError> {
        Ok(self.read_names()?.len())
    }

    /// Snapshot of the `volume name -> volume` map
    pub fn volumes(&self) -> Result<HashMap<String, Arc<Volume>>, StorageError> {
        Ok(self.read_names()?.clone())
    }

    /// Volume files in allocation order
    pub fn volume_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        let guard = self.lock_allocation()?;
        Ok(guard.volumes.iter().map(|v| v.file().to_path_buf()).collect())
    }

    /// Look up a volume by id without taking the allocation lock
    pub fn find_by_id(&self, volume_id: u32) -> Result<Option<Arc<Volume>>, StorageError> {
        Ok(self
            .read_names()?
            .values()
            .find(|v| v.volume_id() == volume_id)
            .cloned())
    }

    /// Take the allocation lock
    pub fn lock_allocation(&self) -> Result<AllocationGuard<'_>, StorageError> {
        let volumes = self
            .allocation
            .lock()
            .map_err(|e| StorageError::Internal(format!("Lock poisoned: {}", e)))?;
        Ok(AllocationGuard { registry: self, volumes })
    }

    fn read_names(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<Volume>>>, StorageError> {
        self.by_name
            .read()
            .map_err(|e| StorageError::Internal(format!("Lock poisoned: {}", e)))
    }
}

/// Exclusive access to volume selection and creation
pub struct AllocationGuard<'a> {
    registry: &'a VolumeRegistry,
    volumes: MutexGuard<'a, Vec<Arc<Volume>>>,
}

impl AllocationGuard<'_> {
    /// First volume, in allocation order, whose file can take `desired_space`
    /// more bytes without exceeding the configured maximum
    pub fn first_fit(&self, desired_space: u64) -> Option<Arc<Volume>> {
        let max = self.registry.storage.max_volume_size_bytes;
        self.volumes
            .iter()
            .find(|v| v.current_size_bytes().saturating_add(desired_space) <= max)
            .cloned()
    }

    /// Initialize and register the next volume
    pub fn create_volume(&mut self) -> Result<Arc<Volume>, StorageError> {
        // Ids are dense, so this is count + 1; max() guards a directory with gaps
        let highest = self.volumes.iter().map(|v| v.volume_id()).max().unwrap_or(0);
        let count = u32::try_from(self.volumes.len())
            .map_err(|_| StorageError::Internal("Too many volumes".to_string()))?;
        let volume_id = count
            .max(highest)
            .checked_add(1)
            .ok_or_else(|| StorageError::Internal("Volume ids exhausted".to_string()))?;

        let volume = Arc::new(self.registry.new_volume().initialize(volume_id)?);

        self.volumes.push(Arc::clone(&volume));
        self.registry
            .by_name
            .write()
            .map_err(|e| StorageError::Internal(format!("Lock poisoned: {}", e)))?
            .insert(volume.volume_name().to_string(), Arc::clone(&volume));

        info!(volume_id, path = %volume.file().display(), "Created blob volume");
        Ok(volume)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

/// Attach every file in the volume directory that follows the naming template
fn discover_volumes(
    connections: &Arc<ConnectionProvider>,
    validator: ItemValidator,
) -> Result<Vec<Arc<Volume>>, StorageError> {
    let dir = connections.volumes_dir();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        StorageError::Config(format!(
            "Cannot list volume directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let naming = connections.naming();
    let mut volumes = Vec::new();

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !naming.matches(&file_name) {
            continue;
        }

        let volume_id = naming.parse_volume_id(&file_name)?;
        debug!(volume_id, file = %file_name, "Found volume file");

        volumes.push(Volume::attach(
            Arc::clone(connections),
            validator,
            entry.path(),
            file_name,
            volume_id,
        ));
    }

    // Listing order is filesystem dependent; allocation order is by id
    volumes.sort_by_key(|v| v.volume_id());

    if let Some(pair) = volumes.windows(2).find(|w| w[0].volume_id() == w[1].volume_id()) {
        return Err(StorageError::Config(format!(
            "Volume ID {} is used by both {} and {}",
            pair[0].volume_id(),
            pair[0].volume_name(),
            pair[1].volume_name()
        )));
    }

    Ok(volumes.into_iter().map(Arc::new).collect())
}
