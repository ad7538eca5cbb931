#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Point cloud data structure.
pub mod pointcloud;
pub use pointcloud::{PointCloud, PointCloudError};
