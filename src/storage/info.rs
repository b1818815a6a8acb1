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

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable identifier of a storage device, assigned by the backend at discovery.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct StorageId(pub u32);

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StorageId {
    fn from(value: u32) -> Self {
        StorageId(value)
    }
}

/// Where a storage device lives relative to the machine.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StorageArea {
    /// Built-in storage.
    Internal,
    /// Removable storage such as SD cards or USB drives.
    External,
    /// External storage formatted as an extension of internal storage.
    ExtendedInternal,
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageArea::Internal => write!(f, "internal"),
            StorageArea::External => write!(f, "external"),
            StorageArea::ExtendedInternal => write!(f, "extended-internal"),
        }
    }
}

/// Mount state of a storage device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StorageState {
    /// Present but cannot be mounted.
    Unmountable,
    /// Not present.
    Removed,
    /// Mounted with read/write access.
    Mounted,
    /// Mounted with read-only access.
    MountedReadOnly,
}

impl StorageState {
    pub fn is_mounted(self) -> bool {
        matches!(self, StorageState::Mounted | StorageState::MountedReadOnly)
    }
}

impl fmt::Display for StorageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageState::Unmountable => write!(f, "unmountable"),
            StorageState::Removed => write!(f, "removed"),
            StorageState::Mounted => write!(f, "mounted"),
            StorageState::MountedReadOnly => write!(f, "mounted (read-only)"),
        }
    }
}

/// Well-known directories that can be resolved inside a storage device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryType {
    Images,
    Sounds,
    Videos,
    Camera,
    Downloads,
    Music,
    Documents,
    Others,
    /// Only available on internal storage.
    Ringtones,
}

impl DirectoryType {
    pub const ALL: [DirectoryType; 9] = [
        DirectoryType::Images,
        DirectoryType::Sounds,
        DirectoryType::Videos,
        DirectoryType::Camera,
        DirectoryType::Downloads,
        DirectoryType::Music,
        DirectoryType::Documents,
        DirectoryType::Others,
        DirectoryType::Ringtones,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DirectoryType::Images => "images",
            DirectoryType::Sounds => "sounds",
            DirectoryType::Videos => "videos",
            DirectoryType::Camera => "camera",
            DirectoryType::Downloads => "downloads",
            DirectoryType::Music => "music",
            DirectoryType::Documents => "documents",
            DirectoryType::Others => "others",
            DirectoryType::Ringtones => "ringtones",
        }
    }
}

impl fmt::Display for DirectoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirectoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        DirectoryType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| format!("unknown directory type: {s}"))
    }
}

/// Identity and capacity of one device as reported by discovery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: StorageId,
    pub area: StorageArea,
    pub root_directory: PathBuf,
    pub total_space: u64,
    /// State observed at discovery time.
    pub state: StorageState,
}

/// Point-in-time snapshot of a device, suitable for display or export.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StorageInfo {
    pub id: StorageId,
    pub area: StorageArea,
    pub root_directory: String,
    pub total_bytes: u64,
    pub available_bytes: Option<u64>,
    pub state: Option<StorageState>,
}
