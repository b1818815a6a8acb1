// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! High-level client API for the storage registry.
//!
//! [`StorageManager`] wraps a [`StorageRegistry`] and decides, per query,
//! whether the answer comes from a cache or from the backend:
//!
//! - state is served from the cache while a listener keeps it fresh;
//! - total space is the snapshot taken at discovery;
//! - available space and directory paths are always fetched live.
//!
//! # Example
//!
//! ```rust,no_run
//! use storage_registry::{StorageManager, Result};
//!
//! fn main() -> Result<()> {
//!     let manager = StorageManager::new()?;
//!
//!     for device in manager.all()? {
//!         println!("{}: {} ({} bytes free)",
//!             device.root_directory().display(),
//!             device.state()?,
//!             device.available_space()?);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::common::config::AppConfig;
use crate::error::Result;
use crate::storage::{
    create_storage_backend, Devices, DirectoryType, ListenerId, ListenerResult, StateChange,
    StorageBackend, StorageDevice, StorageId, StorageInfo, StorageRegistry, StorageState,
};

/// Main client for querying and watching storage devices.
///
/// # Thread Safety
///
/// `StorageManager` is `Send + Sync` and can be shared across threads.
pub struct StorageManager {
    registry: StorageRegistry,
    config: StorageConfig,
}

impl StorageManager {
    /// Create a manager for the local machine and discover its devices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`](crate::Error::Discovery) if local storage
    /// cannot be enumerated.
    #[must_use = "StorageManager instance must be stored to access storage information"]
    pub fn new() -> Result<Self> {
        Self::with_config(StorageConfig::default())
    }

    /// Create a manager for the local machine with custom configuration.
    #[must_use = "StorageManager instance must be stored to access storage information"]
    pub fn with_config(config: StorageConfig) -> Result<Self> {
        let backend = create_storage_backend(Duration::from_millis(config.poll_interval_ms));
        let manager = Self::with_backend(backend, config);
        manager.initialize()?;
        Ok(manager)
    }

    /// Create an uninitialized manager on top of any backend.
    ///
    /// Call [`initialize`](Self::initialize) before querying.
    pub fn with_backend(backend: Arc<dyn StorageBackend>, config: StorageConfig) -> Self {
        Self {
            registry: StorageRegistry::new(backend),
            config,
        }
    }

    /// Discover devices. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        self.registry.initialize()?;
        if self.config.verbose {
            for device in self.registry.all()? {
                info!(
                    "Storage {}: {} ({}, {} bytes)",
                    device.id(),
                    device.root_directory().display(),
                    device.area(),
                    device.total_space()
                );
            }
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.is_initialized()
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn get(&self, id: StorageId) -> Result<Arc<StorageDevice>> {
        self.registry.get(id)
    }

    pub fn all(&self) -> Result<Devices<'_>> {
        self.registry.all()
    }

    pub fn device_count(&self) -> Result<usize> {
        self.registry.len()
    }

    /// Current state of `id`: cached while listened to, live otherwise.
    pub fn get_state(&self, id: StorageId) -> Result<StorageState> {
        self.registry.get(id)?.state()
    }

    /// Total capacity captured at discovery. Never refreshed.
    pub fn get_total_space(&self, id: StorageId) -> Result<u64> {
        Ok(self.registry.get(id)?.total_space())
    }

    /// Available space. Always fetched live.
    pub fn get_available_space(&self, id: StorageId) -> Result<u64> {
        self.registry.get(id)?.available_space()
    }

    /// Absolute path of a directory type on `id`. Always fetched live.
    ///
    /// The directory may not exist yet.
    pub fn get_absolute_path(&self, id: StorageId, kind: DirectoryType) -> Result<PathBuf> {
        self.registry.get(id)?.absolute_path(kind)
    }

    pub fn add_listener<F>(&self, id: StorageId, listener: F) -> Result<ListenerId>
    where
        F: Fn(&StateChange) -> ListenerResult + Send + Sync + 'static,
    {
        self.registry.add_listener(id, listener)
    }

    pub fn remove_listener(&self, id: StorageId, listener: ListenerId) -> Result<bool> {
        self.registry.remove_listener(id, listener)
    }

    /// Snapshot of every device.
    ///
    /// Per-device fetch failures are logged and reported as `None` fields
    /// instead of failing the whole listing.
    pub fn get_storage_info(&self) -> Result<Vec<StorageInfo>> {
        let infos = self
            .registry
            .all()?
            .map(|device| {
                let available_bytes = device
                    .available_space()
                    .map_err(|e| warn!("{e}"))
                    .ok();
                let state = device.state().map_err(|e| warn!("{e}")).ok();
                StorageInfo {
                    id: device.id(),
                    area: device.area(),
                    root_directory: device.root_directory().to_string_lossy().to_string(),
                    total_bytes: device.total_space(),
                    available_bytes,
                    state,
                }
            })
            .collect();
        Ok(infos)
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Poll interval of the local backend's watcher threads.
    pub poll_interval_ms: u64,
    /// Log every discovered device at info level.
    pub verbose: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: AppConfig::DEFAULT_POLL_INTERVAL_MS,
            verbose: false,
        }
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, FetchReason};
    use crate::storage::{BackendError, MockBackend, StorageArea};

    fn manager() -> (Arc<MockBackend>, StorageManager) {
        let backend = Arc::new(
            MockBackend::new()
                .with_device(
                    StorageId(0),
                    StorageArea::Internal,
                    "/opt/usr/media",
                    8000,
                    StorageState::Mounted,
                )
                .with_device(
                    StorageId(1),
                    StorageArea::External,
                    "/media/sdcard",
                    1000,
                    StorageState::Mounted,
                ),
        );
        let manager = StorageManager::with_backend(backend.clone(), StorageConfig::default());
        manager.initialize().unwrap();
        (backend, manager)
    }

    #[test]
    fn test_storage_manager_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StorageManager>();
    }

    #[test]
    fn test_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.poll_interval_ms, 1000);
        assert!(!config.verbose);
    }

    #[test]
    fn test_config_builder() {
        let config = StorageConfig::new().poll_interval(250).verbose(true);
        assert_eq!(config.poll_interval_ms, 250);
        assert!(config.verbose);
    }

    #[test]
    fn test_available_space_is_always_live() {
        let (backend, manager) = manager();
        manager.add_listener(StorageId(1), |_| Ok(())).unwrap();

        assert_eq!(manager.get_available_space(StorageId(1)).unwrap(), 500);
        backend.set_available_space(StorageId(1), 120);
        assert_eq!(manager.get_available_space(StorageId(1)).unwrap(), 120);
        assert_eq!(backend.fetch_available_space_calls(), 2);
    }

    #[test]
    fn test_total_space_is_snapshot() {
        let (backend, manager) = manager();
        assert_eq!(manager.get_total_space(StorageId(0)).unwrap(), 8000);
        assert_eq!(backend.fetch_available_space_calls(), 0);
    }

    #[test]
    fn test_absolute_path() {
        let (backend, manager) = manager();
        let path = manager
            .get_absolute_path(StorageId(0), DirectoryType::Downloads)
            .unwrap();
        assert_eq!(path, PathBuf::from("/opt/usr/media/Downloads"));
        assert_eq!(backend.fetch_path_calls(), 1);

        let err = manager
            .get_absolute_path(StorageId(1), DirectoryType::Ringtones)
            .unwrap_err();
        assert_eq!(err.fetch_reason(), Some(FetchReason::Unsupported));

        backend.set_path_error(StorageId(0), || BackendError::OutOfMemory);
        let err = manager
            .get_absolute_path(StorageId(0), DirectoryType::Music)
            .unwrap_err();
        assert_eq!(err.fetch_reason(), Some(FetchReason::ResourceExhausted));

        backend.set_path_error(StorageId(0), || {
            BackendError::InvalidParameter("directory type".to_string())
        });
        let err = manager
            .get_absolute_path(StorageId(0), DirectoryType::Music)
            .unwrap_err();
        assert_eq!(err.fetch_reason(), Some(FetchReason::InvalidArgument));
        assert_eq!(backend.fetch_path_calls(), 4);
    }

    #[test]
    fn test_unknown_device() {
        let (_, manager) = manager();
        assert!(matches!(
            manager.get_state(StorageId(9)),
            Err(Error::NotFound(StorageId(9)))
        ));
        assert!(matches!(
            manager.get_available_space(StorageId(9)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_uninitialized_manager() {
        let backend = Arc::new(MockBackend::new());
        let manager = StorageManager::with_backend(backend, StorageConfig::default());
        assert!(!manager.is_initialized());
        assert!(matches!(
            manager.get_state(StorageId(0)),
            Err(Error::Uninitialized)
        ));
        assert!(matches!(manager.get_storage_info(), Err(Error::Uninitialized)));
    }

    #[test]
    fn test_storage_info() {
        let (backend, manager) = manager();
        backend.set_state(StorageId(1), StorageState::Removed);

        let infos = manager.get_storage_info().unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].root_directory, "/opt/usr/media");
        assert_eq!(infos[0].available_bytes, Some(4000));
        assert_eq!(infos[1].state, Some(StorageState::Removed));

        backend.fail_fetch_state(true);
        let infos = manager.get_storage_info().unwrap();
        assert!(infos.iter().all(|info| info.state.is_none()));
    }
}
