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

//! The storage registry.
//!
//! [`StorageRegistry`] discovers devices once and then hands out shared
//! [`StorageDevice`] records. The device map is immutable after discovery, so
//! lookups take no lock; all mutable state lives in the per-device channels.

use std::collections::btree_map::{self, BTreeMap};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::storage::backend::{BackendError, StorageBackend};
use crate::storage::channel::{ListenerId, ListenerResult, StateChange};
use crate::storage::info::{StorageId, StorageState};
use crate::storage::record::StorageDevice;

type DeviceMap = BTreeMap<StorageId, Arc<StorageDevice>>;

pub struct StorageRegistry {
    backend: Arc<dyn StorageBackend>,
    devices: OnceCell<DeviceMap>,
}

impl StorageRegistry {
    /// Create an uninitialized registry on top of `backend`.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            devices: OnceCell::new(),
        }
    }

    /// Discover devices. Calling it again after success is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the backend cannot enumerate devices or
    /// reports the same id twice. The registry stays uninitialized.
    pub fn initialize(&self) -> Result<()> {
        self.devices.get_or_try_init(|| {
            let descriptors = self.backend.discover().map_err(Error::Discovery)?;

            let mut devices = DeviceMap::new();
            for descriptor in descriptors {
                let id = descriptor.id;
                debug!(
                    "Discovered storage {id}: {} ({}, {} bytes)",
                    descriptor.root_directory.display(),
                    descriptor.area,
                    descriptor.total_space
                );
                let device = Arc::new(StorageDevice::new(descriptor, Arc::clone(&self.backend)));
                if devices.insert(id, device).is_some() {
                    return Err(Error::Discovery(BackendError::InvalidParameter(format!(
                        "duplicate storage id {id}"
                    ))));
                }
            }

            info!("Storage registry initialized with {} device(s)", devices.len());
            Ok(devices)
        })?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.devices.get().is_some()
    }

    fn devices(&self) -> Result<&DeviceMap> {
        self.devices.get().ok_or(Error::Uninitialized)
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn get(&self, id: StorageId) -> Result<Arc<StorageDevice>> {
        self.devices()?
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Iterate over all devices in id order.
    ///
    /// The device set never changes after initialization, so every call
    /// yields the same sequence.
    pub fn all(&self) -> Result<Devices<'_>> {
        Ok(Devices {
            inner: self.devices()?.values(),
        })
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.devices()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.devices()?.is_empty())
    }

    pub fn add_listener<F>(&self, id: StorageId, listener: F) -> Result<ListenerId>
    where
        F: Fn(&StateChange) -> ListenerResult + Send + Sync + 'static,
    {
        self.get(id)?.add_listener(listener)
    }

    /// Detach a listener from device `id`.
    ///
    /// Returns `Ok(false)` when the listener was not attached.
    pub fn remove_listener(&self, id: StorageId, listener: ListenerId) -> Result<bool> {
        Ok(self.get(id)?.remove_listener(listener))
    }

    pub fn dispatch(&self, id: StorageId, state: StorageState) -> Result<()> {
        self.get(id)?.dispatch(state);
        Ok(())
    }
}

/// Iterator over registry devices, see [`StorageRegistry::all`].
#[derive(Clone)]
pub struct Devices<'a> {
    inner: btree_map::Values<'a, StorageId, Arc<StorageDevice>>,
}

impl<'a> Iterator for Devices<'a> {
    type Item = &'a Arc<StorageDevice>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Devices<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::MockBackend;
    use crate::storage::StorageArea;

    fn backend() -> Arc<MockBackend> {
        Arc::new(
            MockBackend::new()
                .with_device(
                    StorageId(0),
                    StorageArea::Internal,
                    "/",
                    4000,
                    StorageState::Mounted,
                )
                .with_device(
                    StorageId(1),
                    StorageArea::External,
                    "/media/usb",
                    1000,
                    StorageState::Mounted,
                ),
        )
    }

    #[test]
    fn test_uninitialized_registry_fails_fast() {
        let registry = StorageRegistry::new(backend());
        assert!(!registry.is_initialized());
        assert!(matches!(registry.get(StorageId(0)), Err(Error::Uninitialized)));
        assert!(matches!(registry.all(), Err(Error::Uninitialized)));
        assert!(matches!(
            registry.add_listener(StorageId(0), |_| Ok(())),
            Err(Error::Uninitialized)
        ));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let backend = backend();
        let registry = StorageRegistry::new(backend.clone());

        registry.initialize().unwrap();
        registry.initialize().unwrap();
        assert_eq!(backend.discover_calls(), 1);
        assert_eq!(registry.len().unwrap(), 2);
    }

    #[test]
    fn test_discovery_failure_leaves_registry_uninitialized() {
        let backend = backend();
        backend.fail_discovery(true);
        let registry = StorageRegistry::new(backend.clone());

        assert!(matches!(registry.initialize(), Err(Error::Discovery(_))));
        assert!(!registry.is_initialized());

        // A later attempt may succeed
        backend.fail_discovery(false);
        registry.initialize().unwrap();
        assert!(registry.is_initialized());
    }

    #[test]
    fn test_duplicate_ids_fail_discovery() {
        let backend = Arc::new(
            MockBackend::new()
                .with_device(StorageId(5), StorageArea::Internal, "/a", 1, StorageState::Mounted)
                .with_duplicate_descriptor(StorageId(5)),
        );
        let registry = StorageRegistry::new(backend);
        assert!(matches!(registry.initialize(), Err(Error::Discovery(_))));
    }

    #[test]
    fn test_get_unknown_id() {
        let registry = StorageRegistry::new(backend());
        registry.initialize().unwrap();
        assert!(matches!(
            registry.get(StorageId(42)),
            Err(Error::NotFound(StorageId(42)))
        ));
    }

    #[test]
    fn test_all_is_restartable() {
        let registry = StorageRegistry::new(backend());
        registry.initialize().unwrap();

        let first: Vec<_> = registry.all().unwrap().map(|d| d.id()).collect();
        let second: Vec<_> = registry.all().unwrap().map(|d| d.id()).collect();
        assert_eq!(first, vec![StorageId(0), StorageId(1)]);
        assert_eq!(first, second);

        let iter = registry.all().unwrap();
        assert_eq!(iter.len(), 2);
        assert_eq!(iter.clone().count(), iter.count());
    }

    #[test]
    fn test_get_returns_shared_record() {
        let registry = StorageRegistry::new(backend());
        registry.initialize().unwrap();

        let a = registry.get(StorageId(1)).unwrap();
        let b = registry.get(StorageId(1)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_listeners_are_independent_per_device() {
        let backend = backend();
        let registry = StorageRegistry::new(backend.clone());
        registry.initialize().unwrap();

        let l0 = registry.add_listener(StorageId(0), |_| Ok(())).unwrap();
        registry.add_listener(StorageId(1), |_| Ok(())).unwrap();
        registry.add_listener(StorageId(1), |_| Ok(())).unwrap();

        assert_eq!(backend.active_subscriptions(StorageId(0)), 1);
        assert_eq!(backend.active_subscriptions(StorageId(1)), 1);

        assert!(registry.remove_listener(StorageId(0), l0).unwrap());
        assert_eq!(backend.active_subscriptions(StorageId(0)), 0);
        assert_eq!(backend.active_subscriptions(StorageId(1)), 1);
    }
}
