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

//! Process-wide capability checks.
//!
//! A [`FeatureGate`] runs its probe at most once per process (until reset) and
//! remembers the answer as an explicit [`FeatureStatus`].

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, error};

use crate::storage::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FeatureStatus {
    Unknown = 0,
    Unsupported = 1,
    Supported = 2,
}

impl FeatureStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => FeatureStatus::Unsupported,
            2 => FeatureStatus::Supported,
            _ => FeatureStatus::Unknown,
        }
    }
}

pub struct FeatureGate {
    key: &'static str,
    status: AtomicU8,
}

impl FeatureGate {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            status: AtomicU8::new(FeatureStatus::Unknown as u8),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn status(&self) -> FeatureStatus {
        FeatureStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Return whether the feature is supported, running `probe` only if the
    /// status is still unknown.
    pub fn check(&self, probe: impl FnOnce() -> bool) -> bool {
        match self.status() {
            FeatureStatus::Supported => return true,
            FeatureStatus::Unsupported => return false,
            FeatureStatus::Unknown => {}
        }

        let status = if probe() {
            FeatureStatus::Supported
        } else {
            FeatureStatus::Unsupported
        };
        // First probe to finish wins
        let _ = self.status.compare_exchange(
            FeatureStatus::Unknown as u8,
            status as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug!("Feature {} checked: {:?}", self.key, self.status());
        self.status() == FeatureStatus::Supported
    }

    /// Like [`check`](Self::check) but fails with `NotSupported`.
    pub fn ensure(&self, probe: impl FnOnce() -> bool) -> Result<(), BackendError> {
        if self.check(probe) {
            Ok(())
        } else {
            error!("Feature {} is not supported", self.key);
            Err(BackendError::NotSupported(self.key.to_string()))
        }
    }

    /// Forget the cached answer.
    pub fn reset(&self) {
        self.status
            .store(FeatureStatus::Unknown as u8, Ordering::Release);
    }
}
