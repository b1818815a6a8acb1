pub mod disk_filter;
pub mod feature;
pub mod units;

pub use disk_filter::{filter_storage_mounts, MountFilter};
pub use feature::{FeatureGate, FeatureStatus};
pub use units::{format_bytes, usage_percent};
