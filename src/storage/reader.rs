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

//! Local storage backend.
//!
//! [`LocalBackend`] enumerates mounted filesystems with `sysinfo::Disks` and
//! implements subscriptions by polling: each subscription owns a thread that
//! re-reads the mount table every poll interval and reports state changes.
//!
//! # Example
//!
//! ```rust,no_run
//! use storage_registry::storage::{LocalBackend, StorageBackend};
//!
//! let backend = LocalBackend::new();
//! for device in backend.discover()? {
//!     println!("{}: {} bytes", device.root_directory.display(), device.total_space);
//! }
//! # Ok::<(), storage_registry::storage::BackendError>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use sysinfo::{Disk, Disks};
use tracing::{debug, warn};

use crate::common::config::{AppConfig, EnvConfig};
use crate::storage::backend::{
    BackendError, BackendResult, ChangeHandler, StorageBackend, SubscriptionHandle,
};
use crate::storage::info::{DeviceDescriptor, DirectoryType, StorageArea, StorageId, StorageState};
use crate::utils::{filter_storage_mounts, FeatureGate};

static DISK_ENUMERATION: FeatureGate = FeatureGate::new("storage.disk_enumeration");

#[derive(Debug, Clone)]
struct LocalMount {
    mount_point: PathBuf,
    area: StorageArea,
}

/// Storage backend for the local machine.
pub struct LocalBackend {
    poll_interval: Duration,
    mounts: RwLock<HashMap<StorageId, LocalMount>>,
    watchers: Mutex<HashMap<u64, Arc<AtomicBool>>>,
    next_token: AtomicU64,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_millis(AppConfig::DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            mounts: RwLock::new(HashMap::new()),
            watchers: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn mount(&self, id: StorageId) -> BackendResult<LocalMount> {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(BackendError::NotFound(id))
    }

    fn watchers(&self) -> MutexGuard<'_, HashMap<u64, Arc<AtomicBool>>> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn disk_state(disk: &Disk) -> StorageState {
    if disk.is_read_only() {
        StorageState::MountedReadOnly
    } else {
        StorageState::Mounted
    }
}

fn disk_area(disk: &Disk) -> StorageArea {
    if disk.is_removable() {
        StorageArea::External
    } else {
        StorageArea::Internal
    }
}

/// Read the current state of the filesystem mounted at `mount_point`.
fn probe_state(mount_point: &Path) -> StorageState {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == mount_point)
        .map(disk_state)
        .unwrap_or(StorageState::Removed)
}

/// Resolve a well-known directory under a storage root.
///
/// Ringtones only exist on internal storage.
pub fn resolve_directory(
    root: &Path,
    area: StorageArea,
    kind: DirectoryType,
) -> BackendResult<PathBuf> {
    if kind == DirectoryType::Ringtones && area != StorageArea::Internal {
        return Err(BackendError::NotSupported(format!(
            "{kind} directory on {area} storage"
        )));
    }
    Ok(root.join(AppConfig::directory_name(kind)))
}

impl StorageBackend for LocalBackend {
    fn discover(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        DISK_ENUMERATION.ensure(|| sysinfo::IS_SUPPORTED_SYSTEM)?;

        let disks = Disks::new_with_refreshed_list();
        let mut filtered = filter_storage_mounts(&disks);
        filtered.sort_by(|a, b| a.mount_point().cmp(b.mount_point()));

        let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
        mounts.clear();

        let descriptors = filtered
            .iter()
            .enumerate()
            .map(|(index, disk)| {
                let id = StorageId(index as u32);
                let area = disk_area(disk);
                let mount_point = disk.mount_point().to_path_buf();
                if disk.total_space() == 0 {
                    warn!(
                        "Storage {id} at {} reports zero total space",
                        mount_point.display()
                    );
                }
                mounts.insert(
                    id,
                    LocalMount {
                        mount_point: mount_point.clone(),
                        area,
                    },
                );
                DeviceDescriptor {
                    id,
                    area,
                    root_directory: mount_point,
                    total_space: disk.total_space(),
                    state: disk_state(disk),
                }
            })
            .collect();

        Ok(descriptors)
    }

    fn fetch_state(&self, id: StorageId) -> BackendResult<StorageState> {
        let mount = self.mount(id)?;
        Ok(probe_state(&mount.mount_point))
    }

    fn fetch_available_space(&self, id: StorageId) -> BackendResult<u64> {
        let mount = self.mount(id)?;
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == mount.mount_point)
            .map(|disk| disk.available_space())
            .ok_or_else(|| {
                BackendError::Other(format!(
                    "{} is not mounted",
                    mount.mount_point.display()
                ))
            })
    }

    fn fetch_path(&self, id: StorageId, kind: DirectoryType) -> BackendResult<PathBuf> {
        let mount = self.mount(id)?;
        resolve_directory(&mount.mount_point, mount.area, kind)
    }

    fn subscribe(
        &self,
        id: StorageId,
        handler: ChangeHandler,
    ) -> BackendResult<SubscriptionHandle> {
        let mount = self.mount(id)?;
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let stop = Arc::new(AtomicBool::new(false));
        let interval = EnvConfig::poll_interval(self.poll_interval.as_millis() as u64);

        let mut last = probe_state(&mount.mount_point);
        let thread_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name(format!("storage-watch-{id}"))
            .spawn(move || loop {
                thread::sleep(interval);
                if thread_stop.load(Ordering::Acquire) {
                    break;
                }
                let state = probe_state(&mount.mount_point);
                if state != last {
                    debug!("Storage {id} changed state: {last} -> {state}");
                    last = state;
                    handler(id, state);
                }
            })?;

        self.watchers().insert(token, stop);
        Ok(SubscriptionHandle {
            storage_id: id,
            token,
        })
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> BackendResult<()> {
        // The watcher thread is not joined: it may be blocked delivering to a
        // listener that is waiting on the caller of this method.
        match self.watchers().remove(&handle.token) {
            Some(stop) => {
                stop.store(true, Ordering::Release);
                Ok(())
            }
            None => Err(BackendError::InvalidParameter(format!(
                "unknown subscription {} for storage {}",
                handle.token, handle.storage_id
            ))),
        }
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        for (_, stop) in self.watchers().drain() {
            stop.store(true, Ordering::Release);
        }
    }
}

/// Create a storage backend for the local system.
///
/// Returns a shared [`StorageBackend`] trait object so other backends can be
/// swapped in.
pub fn create_storage_backend(poll_interval: Duration) -> Arc<dyn StorageBackend> {
    Arc::new(LocalBackend::with_poll_interval(poll_interval))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_backend_discovery() {
        let backend = LocalBackend::new();
        // We can't guarantee any specific storage on CI, but it shouldn't panic
        let Ok(devices) = backend.discover() else {
            return;
        };
        for (expected, device) in devices.iter().enumerate() {
            assert_eq!(device.id, StorageId(expected as u32));
            assert!(!device.root_directory.as_os_str().is_empty());
            assert!(backend.fetch_path(device.id, DirectoryType::Music).is_ok());
        }
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let backend = LocalBackend::new();
        assert!(matches!(
            backend.fetch_state(StorageId(4242)),
            Err(BackendError::NotFound(StorageId(4242)))
        ));
        assert!(backend
            .subscribe(StorageId(4242), Box::new(|_, _| {}))
            .is_err());
    }

    #[test]
    fn test_resolve_directory() {
        let root = tempfile::tempdir().unwrap();

        let path = resolve_directory(root.path(), StorageArea::Internal, DirectoryType::Camera)
            .unwrap();
        assert_eq!(path, root.path().join("DCIM"));
        assert!(path.starts_with(root.path()));

        let ringtones =
            resolve_directory(root.path(), StorageArea::Internal, DirectoryType::Ringtones);
        assert!(ringtones.is_ok());
    }

    #[test]
    fn test_ringtones_unsupported_on_external() {
        let root = tempfile::tempdir().unwrap();
        let err = resolve_directory(root.path(), StorageArea::External, DirectoryType::Ringtones)
            .unwrap_err();
        assert!(matches!(err, BackendError::NotSupported(_)));
    }

    #[test]
    fn test_unsubscribe_unknown_handle() {
        let backend = LocalBackend::new();
        let handle = SubscriptionHandle {
            storage_id: StorageId(0),
            token: 77,
        };
        assert!(matches!(
            backend.unsubscribe(handle),
            Err(BackendError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_poll_interval() {
        let backend = LocalBackend::with_poll_interval(Duration::from_millis(250));
        assert_eq!(backend.poll_interval(), Duration::from_millis(250));
        assert_eq!(
            LocalBackend::default().poll_interval(),
            Duration::from_millis(AppConfig::DEFAULT_POLL_INTERVAL_MS)
        );
    }

    #[test]
    fn test_local_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LocalBackend>();
    }
}
