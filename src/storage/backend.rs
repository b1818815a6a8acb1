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

//! The backend trait that sits between the registry and the operating environment.
//!
//! A [`StorageBackend`] enumerates devices, answers live queries and provides a
//! raw subscribe/unsubscribe primitive keyed by device id. The registry never
//! talks to the platform directly; it only goes through this trait.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::info::{DeviceDescriptor, DirectoryType, StorageId, StorageState};

/// Failure codes reported by a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Storage {0} is not known to the backend")]
    NotFound(StorageId),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Callback a backend invokes when it observes a state change.
pub type ChangeHandler = Box<dyn Fn(StorageId, StorageState) + Send + Sync>;

/// Opaque token for one live backend subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub storage_id: StorageId,
    pub token: u64,
}

/// Trait for storage backends.
///
/// Implementations must be thread-safe (`Send + Sync`): change handlers are
/// usually invoked from a backend-owned thread while callers query from
/// their own threads.
///
/// `subscribe` must not invoke the handler synchronously before it returns.
pub trait StorageBackend: Send + Sync {
    /// Enumerate all storage devices. Called once per registry.
    fn discover(&self) -> BackendResult<Vec<DeviceDescriptor>>;

    fn fetch_state(&self, id: StorageId) -> BackendResult<StorageState>;

    fn fetch_available_space(&self, id: StorageId) -> BackendResult<u64>;

    fn fetch_path(&self, id: StorageId, kind: DirectoryType) -> BackendResult<PathBuf>;

    /// Start delivering state changes of `id` to `handler`.
    fn subscribe(&self, id: StorageId, handler: ChangeHandler)
        -> BackendResult<SubscriptionHandle>;

    /// Stop a subscription. Best effort; the handler may still fire once
    /// more if a notification was already in flight.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> BackendResult<()>;
}
