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

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::backend::StorageBackend;
use crate::storage::channel::{
    ListenerId, ListenerResult, NotificationChannel, StateChange, StateListener,
};
use crate::storage::info::{DeviceDescriptor, DirectoryType, StorageArea, StorageId, StorageState};

/// One storage device known to the registry.
///
/// Identity, area, root directory and total space are fixed at discovery.
/// The state is cached only while at least one listener is attached; the
/// rest of the time [`state`](Self::state) asks the backend directly.
pub struct StorageDevice {
    id: StorageId,
    area: StorageArea,
    root_directory: PathBuf,
    total_space: u64,
    backend: Arc<dyn StorageBackend>,
    channel: Arc<NotificationChannel>,
}

impl StorageDevice {
    pub(crate) fn new(descriptor: DeviceDescriptor, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            id: descriptor.id,
            area: descriptor.area,
            root_directory: descriptor.root_directory,
            total_space: descriptor.total_space,
            backend,
            channel: Arc::new(NotificationChannel::new(descriptor.id, descriptor.state)),
        }
    }

    pub fn id(&self) -> StorageId {
        self.id
    }

    pub fn area(&self) -> StorageArea {
        self.area
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Total capacity in bytes, as captured at discovery.
    pub fn total_space(&self) -> u64 {
        self.total_space
    }

    /// Current state: the cached value while subscribed, a live fetch otherwise.
    ///
    /// The live path never writes the cache.
    pub fn state(&self) -> Result<StorageState> {
        if let Some(state) = self.channel.cached_state() {
            return Ok(state);
        }
        self.backend
            .fetch_state(self.id)
            .map_err(|source| Error::fetch(self.id, "state", source))
    }

    /// Available space in bytes. Always a live fetch.
    pub fn available_space(&self) -> Result<u64> {
        self.backend
            .fetch_available_space(self.id)
            .map_err(|source| Error::fetch(self.id, "available space", source))
    }

    /// Absolute path of a well-known directory on this device. Always a live fetch.
    ///
    /// The returned directory may not exist yet.
    pub fn absolute_path(&self, kind: DirectoryType) -> Result<PathBuf> {
        self.backend
            .fetch_path(self.id, kind)
            .map_err(|source| Error::fetch(self.id, "path", source))
    }

    pub fn is_subscribed(&self) -> bool {
        self.channel.is_subscribed()
    }

    pub fn listener_count(&self) -> usize {
        self.channel.listener_count()
    }

    /// Attach a state-change listener.
    ///
    /// The first listener subscribes to the backend; failure leaves the
    /// device untouched and returns [`Error::Subscribe`].
    pub fn add_listener<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(&StateChange) -> ListenerResult + Send + Sync + 'static,
    {
        self.add_shared_listener(Arc::new(listener))
    }

    /// Like [`add_listener`](Self::add_listener) for an already shared callback.
    pub fn add_shared_listener(&self, listener: StateListener) -> Result<ListenerId> {
        self.channel.add_listener(self.backend.as_ref(), listener)
    }

    /// Detach a listener. Returns `false` if it was not attached.
    pub fn remove_listener(&self, listener: ListenerId) -> bool {
        self.channel.remove_listener(self.backend.as_ref(), listener)
    }

    /// Push a state change as if it came from the backend.
    pub fn dispatch(&self, state: StorageState) {
        self.channel.dispatch(state);
    }
}

impl std::fmt::Debug for StorageDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageDevice")
            .field("id", &self.id)
            .field("area", &self.area)
            .field("root_directory", &self.root_directory)
            .field("total_space", &self.total_space)
            .field("listeners", &self.channel.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::MockBackend;

    fn device(backend: &Arc<MockBackend>) -> StorageDevice {
        let descriptor = backend.descriptor(StorageId(1)).unwrap();
        StorageDevice::new(descriptor, Arc::clone(backend) as Arc<dyn StorageBackend>)
    }

    fn backend() -> Arc<MockBackend> {
        Arc::new(MockBackend::new().with_device(
            StorageId(1),
            StorageArea::External,
            "/media/sd",
            1000,
            StorageState::Mounted,
        ))
    }

    #[test]
    fn test_state_without_listeners_is_live() {
        let backend = backend();
        let device = device(&backend);

        assert_eq!(device.state().unwrap(), StorageState::Mounted);
        assert_eq!(backend.fetch_state_calls(), 1);

        backend.set_state(StorageId(1), StorageState::Removed);
        assert_eq!(device.state().unwrap(), StorageState::Removed);
        assert_eq!(backend.fetch_state_calls(), 2);
    }

    #[test]
    fn test_state_with_listener_is_cached() {
        let backend = backend();
        let device = device(&backend);

        device.add_listener(|_| Ok(())).unwrap();
        let calls_after_sync = backend.fetch_state_calls();

        // Live value changes without a notification; the cache stays authoritative
        backend.set_state(StorageId(1), StorageState::Removed);
        assert_eq!(device.state().unwrap(), StorageState::Mounted);
        assert_eq!(backend.fetch_state_calls(), calls_after_sync);
    }

    #[test]
    fn test_live_fetch_failure_is_surfaced() {
        let backend = backend();
        let device = device(&backend);
        backend.fail_fetch_state(true);

        let err = device.state().unwrap_err();
        assert!(matches!(err, Error::Fetch { what: "state", .. }));
    }

    #[test]
    fn test_identity_fields() {
        let backend = backend();
        let device = device(&backend);

        assert_eq!(device.id(), StorageId(1));
        assert_eq!(device.area(), StorageArea::External);
        assert_eq!(device.root_directory(), Path::new("/media/sd"));
        assert_eq!(device.total_space(), 1000);
    }

    #[test]
    fn test_storage_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StorageDevice>();
    }
}
