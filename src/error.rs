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

//! Unified error types for the storage-registry library.
//!
//! Backends report failures with [`BackendError`]; the registry and the
//! [`StorageManager`](crate::StorageManager) translate them into [`enum@Error`]
//! so callers can tell discovery, lookup, subscription and fetch failures apart.
//!
//! # Example
//!
//! ```rust,no_run
//! use storage_registry::{Error, FetchReason, StorageManager, StorageId, DirectoryType};
//!
//! let manager = StorageManager::new()?;
//! match manager.get_absolute_path(StorageId(0), DirectoryType::Ringtones) {
//!     Ok(path) => println!("{}", path.display()),
//!     Err(Error::Fetch { reason: FetchReason::Unsupported, .. }) => println!("not available"),
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), storage_registry::Error>(())
//! ```

use thiserror::Error;

use crate::storage::{BackendError, StorageId};

/// Why a live fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    InvalidArgument,
    ResourceExhausted,
    Unsupported,
    Unknown,
}

impl std::fmt::Display for FetchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchReason::InvalidArgument => write!(f, "invalid argument"),
            FetchReason::ResourceExhausted => write!(f, "resource exhausted"),
            FetchReason::Unsupported => write!(f, "not supported"),
            FetchReason::Unknown => write!(f, "unknown error"),
        }
    }
}

impl From<&BackendError> for FetchReason {
    fn from(err: &BackendError) -> Self {
        match err {
            BackendError::InvalidParameter(_) => FetchReason::InvalidArgument,
            BackendError::OutOfMemory => FetchReason::ResourceExhausted,
            BackendError::NotSupported(_) => FetchReason::Unsupported,
            BackendError::NotFound(_) | BackendError::Io(_) | BackendError::Other(_) => {
                FetchReason::Unknown
            }
        }
    }
}

/// The main error type for storage-registry operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend could not enumerate storage devices.
    ///
    /// The registry stays uninitialized after this error.
    #[error("Storage discovery failed: {0}")]
    Discovery(#[source] BackendError),

    /// The registry was used before a successful `initialize()`.
    #[error("Storage registry is not initialized")]
    Uninitialized,

    /// No device with this id exists in the registry.
    #[error("Storage device {0} not found")]
    NotFound(StorageId),

    /// The backend refused to create a state-change subscription.
    #[error("Failed to subscribe to state changes of storage {id}: {source}")]
    Subscribe {
        id: StorageId,
        #[source]
        source: BackendError,
    },

    /// The backend failed to release a subscription.
    ///
    /// `remove_listener` logs this instead of returning it.
    #[error("Failed to unsubscribe from state changes of storage {id}: {source}")]
    Unsubscribe {
        id: StorageId,
        #[source]
        source: BackendError,
    },

    /// A live read of state, space or path failed.
    #[error("Failed to fetch {what} for storage {id}: {reason} ({source})")]
    Fetch {
        id: StorageId,
        what: &'static str,
        reason: FetchReason,
        #[source]
        source: BackendError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serializing output failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn fetch(id: StorageId, what: &'static str, source: BackendError) -> Self {
        Error::Fetch {
            id,
            what,
            reason: FetchReason::from(&source),
            source,
        }
    }

    /// The fetch sub-reason, if this is a fetch failure.
    pub fn fetch_reason(&self) -> Option<FetchReason> {
        match self {
            Error::Fetch { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// A specialized Result type for storage-registry operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound(StorageId(7));
        assert_eq!(err.to_string(), "Storage device 7 not found");

        let err = Error::Uninitialized;
        assert_eq!(err.to_string(), "Storage registry is not initialized");

        let err = Error::Discovery(BackendError::NotSupported("sysinfo".to_string()));
        assert_eq!(
            err.to_string(),
            "Storage discovery failed: Not supported: sysinfo"
        );
    }

    #[test]
    fn test_fetch_reason_translation() {
        let cases = [
            (
                BackendError::InvalidParameter("id".to_string()),
                FetchReason::InvalidArgument,
            ),
            (BackendError::OutOfMemory, FetchReason::ResourceExhausted),
            (
                BackendError::NotSupported("ringtones".to_string()),
                FetchReason::Unsupported,
            ),
            (BackendError::NotFound(StorageId(1)), FetchReason::Unknown),
            (BackendError::Other("boom".to_string()), FetchReason::Unknown),
        ];

        for (source, expected) in cases {
            let err = Error::fetch(StorageId(1), "path", source);
            assert_eq!(err.fetch_reason(), Some(expected));
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.fetch_reason(), None);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
