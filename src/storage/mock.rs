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

//! In-memory storage backend.
//!
//! [`MockBackend`] keeps a scripted set of devices and counts every call the
//! registry makes, so tests can assert how many live fetches and
//! subscriptions actually happened. State changes are pushed with
//! [`MockBackend::emit`], which invokes every live handler for the device.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::common::config::AppConfig;
use crate::storage::backend::{
    BackendError, BackendResult, ChangeHandler, StorageBackend, SubscriptionHandle,
};
use crate::storage::info::{DeviceDescriptor, DirectoryType, StorageArea, StorageId, StorageState};

type SharedHandler = Arc<dyn Fn(StorageId, StorageState) + Send + Sync>;

struct MockDevice {
    descriptor: DeviceDescriptor,
    state: StorageState,
    available_space: u64,
}

#[derive(Default)]
struct Counters {
    discover: AtomicUsize,
    fetch_state: AtomicUsize,
    fetch_available_space: AtomicUsize,
    fetch_path: AtomicUsize,
    subscribe: AtomicUsize,
    unsubscribe: AtomicUsize,
}

#[derive(Default)]
struct Failures {
    discovery: AtomicBool,
    fetch_state: AtomicBool,
    subscribe: AtomicBool,
    unsubscribe: AtomicBool,
}

#[derive(Default)]
pub struct MockBackend {
    devices: Mutex<BTreeMap<StorageId, MockDevice>>,
    duplicates: Mutex<Vec<StorageId>>,
    path_errors: Mutex<HashMap<StorageId, fn() -> BackendError>>,
    subscriptions: Mutex<HashMap<u64, (StorageId, SharedHandler)>>,
    next_token: AtomicU64,
    counters: Counters,
    failures: Failures,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Available space starts at half the total.
    pub fn with_device(
        self,
        id: StorageId,
        area: StorageArea,
        root_directory: impl Into<PathBuf>,
        total_space: u64,
        state: StorageState,
    ) -> Self {
        lock(&self.devices).insert(
            id,
            MockDevice {
                descriptor: DeviceDescriptor {
                    id,
                    area,
                    root_directory: root_directory.into(),
                    total_space,
                    state,
                },
                state,
                available_space: total_space / 2,
            },
        );
        self
    }

    /// Make discovery report the descriptor of `id` a second time.
    pub fn with_duplicate_descriptor(self, id: StorageId) -> Self {
        lock(&self.duplicates).push(id);
        self
    }

    pub fn descriptor(&self, id: StorageId) -> Option<DeviceDescriptor> {
        lock(&self.devices).get(&id).map(|d| d.descriptor.clone())
    }

    /// Change the live state without notifying anyone.
    pub fn set_state(&self, id: StorageId, state: StorageState) {
        if let Some(device) = lock(&self.devices).get_mut(&id) {
            device.state = state;
        }
    }

    pub fn set_available_space(&self, id: StorageId, bytes: u64) {
        if let Some(device) = lock(&self.devices).get_mut(&id) {
            device.available_space = bytes;
        }
    }

    /// Make `fetch_path` fail for `id` with the error built by `error`.
    pub fn set_path_error(&self, id: StorageId, error: fn() -> BackendError) {
        lock(&self.path_errors).insert(id, error);
    }

    /// Change the live state and push it to every live handler for `id`.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, id: StorageId, state: StorageState) -> usize {
        self.set_state(id, state);
        let handlers: Vec<SharedHandler> = lock(&self.subscriptions)
            .values()
            .filter(|(storage_id, _)| *storage_id == id)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in &handlers {
            handler(id, state);
        }
        handlers.len()
    }

    pub fn active_subscriptions(&self, id: StorageId) -> usize {
        lock(&self.subscriptions)
            .values()
            .filter(|(storage_id, _)| *storage_id == id)
            .count()
    }

    pub fn fail_discovery(&self, fail: bool) {
        self.failures.discovery.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetch_state(&self, fail: bool) {
        self.failures.fetch_state.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.failures.subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_unsubscribe(&self, fail: bool) {
        self.failures.unsubscribe.store(fail, Ordering::SeqCst);
    }

    pub fn discover_calls(&self) -> usize {
        self.counters.discover.load(Ordering::SeqCst)
    }

    pub fn fetch_state_calls(&self) -> usize {
        self.counters.fetch_state.load(Ordering::SeqCst)
    }

    pub fn fetch_available_space_calls(&self) -> usize {
        self.counters.fetch_available_space.load(Ordering::SeqCst)
    }

    pub fn fetch_path_calls(&self) -> usize {
        self.counters.fetch_path.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.counters.subscribe.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.counters.unsubscribe.load(Ordering::SeqCst)
    }

    fn with_device_ref<T>(
        &self,
        id: StorageId,
        f: impl FnOnce(&MockDevice) -> T,
    ) -> BackendResult<T> {
        lock(&self.devices)
            .get(&id)
            .map(f)
            .ok_or(BackendError::NotFound(id))
    }
}

impl StorageBackend for MockBackend {
    fn discover(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        self.counters.discover.fetch_add(1, Ordering::SeqCst);
        if self.failures.discovery.load(Ordering::SeqCst) {
            return Err(BackendError::Other("discovery disabled".to_string()));
        }

        let devices = lock(&self.devices);
        let mut descriptors: Vec<_> = devices.values().map(|d| d.descriptor.clone()).collect();
        for id in lock(&self.duplicates).iter() {
            if let Some(device) = devices.get(id) {
                descriptors.push(device.descriptor.clone());
            }
        }
        Ok(descriptors)
    }

    fn fetch_state(&self, id: StorageId) -> BackendResult<StorageState> {
        self.counters.fetch_state.fetch_add(1, Ordering::SeqCst);
        if self.failures.fetch_state.load(Ordering::SeqCst) {
            return Err(BackendError::Other("state fetch disabled".to_string()));
        }
        self.with_device_ref(id, |d| d.state)
    }

    fn fetch_available_space(&self, id: StorageId) -> BackendResult<u64> {
        self.counters
            .fetch_available_space
            .fetch_add(1, Ordering::SeqCst);
        self.with_device_ref(id, |d| d.available_space)
    }

    fn fetch_path(&self, id: StorageId, kind: DirectoryType) -> BackendResult<PathBuf> {
        self.counters.fetch_path.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.path_errors).get(&id) {
            return Err(error());
        }
        let (root, area) =
            self.with_device_ref(id, |d| (d.descriptor.root_directory.clone(), d.descriptor.area))?;
        if kind == DirectoryType::Ringtones && area != StorageArea::Internal {
            return Err(BackendError::NotSupported(format!(
                "{kind} directory on {area} storage"
            )));
        }
        Ok(root.join(AppConfig::directory_name(kind)))
    }

    fn subscribe(
        &self,
        id: StorageId,
        handler: ChangeHandler,
    ) -> BackendResult<SubscriptionHandle> {
        self.counters.subscribe.fetch_add(1, Ordering::SeqCst);
        if self.failures.subscribe.load(Ordering::SeqCst) {
            return Err(BackendError::Other("subscribe disabled".to_string()));
        }
        self.with_device_ref(id, |_| ())?;

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        lock(&self.subscriptions).insert(token, (id, Arc::from(handler)));
        Ok(SubscriptionHandle {
            storage_id: id,
            token,
        })
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> BackendResult<()> {
        self.counters.unsubscribe.fetch_add(1, Ordering::SeqCst);
        let removed = lock(&self.subscriptions).remove(&handle.token);
        if self.failures.unsubscribe.load(Ordering::SeqCst) {
            // Leak the registration the way a failing platform call would
            if let Some(entry) = removed {
                lock(&self.subscriptions).insert(handle.token, entry);
            }
            return Err(BackendError::Other("unsubscribe disabled".to_string()));
        }
        removed
            .map(|_| ())
            .ok_or_else(|| BackendError::InvalidParameter(format!("unknown subscription {}", handle.token)))
    }
}
