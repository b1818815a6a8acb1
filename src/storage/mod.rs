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

//! Storage device registry.
//!
//! - [`StorageRegistry`] owns the discovered [`StorageDevice`] records.
//! - Each record has a [`NotificationChannel`] that shares one backend
//!   subscription across all of its listeners.
//! - [`StorageBackend`] is the boundary to the platform; [`LocalBackend`]
//!   reads the local mount table and [`MockBackend`] is scripted in memory.

pub mod backend;
pub mod channel;
pub mod info;
pub mod mock;
pub mod reader;
pub mod record;
pub mod registry;

pub use backend::{BackendError, BackendResult, ChangeHandler, StorageBackend, SubscriptionHandle};
pub use channel::{ListenerId, ListenerResult, NotificationChannel, StateChange, StateListener};
pub use info::{
    DeviceDescriptor, DirectoryType, StorageArea, StorageId, StorageInfo, StorageState,
};
pub use mock::MockBackend;
pub use reader::{create_storage_backend, resolve_directory, LocalBackend};
pub use record::StorageDevice;
pub use registry::{Devices, StorageRegistry};
