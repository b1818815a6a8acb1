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

use std::time::Duration;

use crate::storage::DirectoryType;

/// Application configuration constants
pub struct AppConfig;

impl AppConfig {
    // Watcher Configuration
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
    pub const MIN_POLL_INTERVAL_MS: u64 = 50;
    pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

    // Logging
    pub const DEFAULT_LOG_FILTER: &'static str = "storage_registry=info";
    pub const VERBOSE_LOG_FILTER: &'static str = "storage_registry=debug";

    /// Directory name used for `kind` under a storage root.
    pub fn directory_name(kind: DirectoryType) -> &'static str {
        match kind {
            DirectoryType::Images => "Images",
            DirectoryType::Sounds => "Sounds",
            DirectoryType::Videos => "Videos",
            DirectoryType::Camera => "DCIM",
            DirectoryType::Downloads => "Downloads",
            DirectoryType::Music => "Music",
            DirectoryType::Documents => "Documents",
            DirectoryType::Others => "Others",
            DirectoryType::Ringtones => "Ringtones",
        }
    }
}

/// Environment-specific configuration
pub struct EnvConfig;

impl EnvConfig {
    /// Clamp a requested poll interval into the supported range.
    pub fn poll_interval(requested_ms: u64) -> Duration {
        Duration::from_millis(requested_ms.clamp(
            AppConfig::MIN_POLL_INTERVAL_MS,
            AppConfig::MAX_POLL_INTERVAL_MS,
        ))
    }

    pub fn log_filter(verbose: bool) -> &'static str {
        if verbose {
            AppConfig::VERBOSE_LOG_FILTER
        } else {
            AppConfig::DEFAULT_LOG_FILTER
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_is_clamped() {
        assert_eq!(EnvConfig::poll_interval(0), Duration::from_millis(50));
        assert_eq!(EnvConfig::poll_interval(500), Duration::from_millis(500));
        assert_eq!(
            EnvConfig::poll_interval(u64::MAX),
            Duration::from_millis(60_000)
        );
    }

    #[test]
    fn test_directory_names_are_distinct() {
        let mut names: Vec<_> = DirectoryType::ALL
            .iter()
            .map(|kind| AppConfig::directory_name(*kind))
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DirectoryType::ALL.len());
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(EnvConfig::log_filter(false), "storage_registry=info");
        assert_eq!(EnvConfig::log_filter(true), "storage_registry=debug");
    }
}
