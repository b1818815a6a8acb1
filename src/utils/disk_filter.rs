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

//! Mount filtering for local storage discovery.
//!
//! Pseudo filesystems, system directories and container file bind mounts are
//! not storage devices a user cares about, so discovery skips them.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use sysinfo::{Disk, Disks};

/// A device with more mounts than this is treated as a bind-mount source.
const BIND_MOUNT_THRESHOLD: usize = 5;

pub struct MountFilter {
    excluded_prefixes: Vec<&'static str>,
    excluded_exact: HashSet<&'static str>,
}

impl MountFilter {
    pub fn new() -> Self {
        let excluded_prefixes = vec![
            // Linux pseudo and system trees
            "/dev/",
            "/proc/",
            "/sys/",
            "/run/",
            "/snap/",
            "/usr/",
            "/var/lib/",
            "/var/log/",
            "/var/cache/",
            "/var/spool/",
            "/var/tmp/",
            "/tmp/",
            // macOS system volumes
            "/System/",
            "/Library/",
            "/private/",
            "/Volumes/VM/",
        ];

        let excluded_exact = HashSet::from([
            "/boot",
            "/boot/efi",
            "/tmp",
            "/etc/hosts",
            "/etc/hostname",
            "/etc/resolv.conf",
            "/etc/timezone",
            "/etc/localtime",
            "/Volumes",
            "/cores",
        ]);

        Self {
            excluded_prefixes,
            excluded_exact,
        }
    }

    pub fn should_include(&self, mount_point: &str) -> bool {
        if self.excluded_exact.contains(mount_point) {
            return false;
        }
        !self
            .excluded_prefixes
            .iter()
            .any(|prefix| mount_point.starts_with(prefix))
    }
}

impl Default for MountFilter {
    fn default() -> Self {
        Self::new()
    }
}

static MOUNT_FILTER: OnceLock<MountFilter> = OnceLock::new();

/// Select the disks that represent real storage devices.
///
/// Devices that back many mounts (container bind mounts) only contribute
/// their directory-like mount points.
pub fn filter_storage_mounts(disks: &Disks) -> Vec<&Disk> {
    let filter = MOUNT_FILTER.get_or_init(MountFilter::new);

    let mut by_device: HashMap<String, Vec<&Disk>> = HashMap::new();
    for disk in disks.list() {
        let mount_point = disk.mount_point().to_string_lossy();
        if !filter.should_include(&mount_point) {
            continue;
        }
        by_device
            .entry(disk.name().to_string_lossy().to_string())
            .or_default()
            .push(disk);
    }

    let mut selected = Vec::new();
    for disks_for_device in by_device.into_values() {
        if disks_for_device.len() > BIND_MOUNT_THRESHOLD {
            selected.extend(
                disks_for_device
                    .into_iter()
                    .filter(|disk| is_directory_mount(&disk.mount_point().to_string_lossy())),
            );
        } else {
            selected.extend(disks_for_device);
        }
    }
    selected
}

/// Heuristic for bind mounts: file mounts look like files.
fn is_directory_mount(mount_point: &str) -> bool {
    const FILE_SUFFIXES: &[&str] = &[".so", ".json", ".py", ".sh", ".md", ".conf"];

    if mount_point == "/" {
        return true;
    }
    !FILE_SUFFIXES
        .iter()
        .any(|suffix| mount_point.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_paths_excluded() {
        let filter = MountFilter::new();
        assert!(!filter.should_include("/proc/sys"));
        assert!(!filter.should_include("/boot/efi"));
        assert!(!filter.should_include("/etc/hosts"));
        assert!(!filter.should_include("/System/Volumes/Data"));
    }

    #[test]
    fn test_storage_paths_included() {
        let filter = MountFilter::new();
        assert!(filter.should_include("/"));
        assert!(filter.should_include("/home"));
        assert!(filter.should_include("/media/usb0"));
        assert!(filter.should_include("/Volumes/External"));
    }

    #[test]
    fn test_directory_mount_heuristic() {
        assert!(is_directory_mount("/"));
        assert!(is_directory_mount("/data"));
        assert!(!is_directory_mount("/opt/kernel/libcuda.so"));
        assert!(!is_directory_mount("/etc/app/config.json"));
    }
}
