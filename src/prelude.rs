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

//! The storage-registry prelude.
//!
//! ```rust
//! use storage_registry::prelude::*;
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use storage_registry::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let manager = StorageManager::new()?;
//!
//!     let listener = manager.add_listener(StorageId(0), |change| {
//!         println!("storage {} is now {}", change.id, change.state);
//!         Ok(())
//!     })?;
//!     manager.remove_listener(StorageId(0), listener)?;
//!
//!     Ok(())
//! }
//! ```

// Main client API
pub use crate::client::{StorageConfig, StorageManager};

// Error types
pub use crate::error::{Error, FetchReason, Result};

// Core data types
pub use crate::storage::{
    DeviceDescriptor, DirectoryType, ListenerId, StateChange, StorageArea, StorageDevice,
    StorageId, StorageInfo, StorageState,
};

// Registry and backends for advanced usage
pub use crate::storage::{
    BackendError, LocalBackend, MockBackend, StorageBackend, StorageRegistry, SubscriptionHandle,
};
