#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::LinalgError;

/// Rigid 3D transform type and helpers.
pub mod transform;
pub use transform::{rotation_from_axis_angle, RigidTransform};

/// Least-squares rigid alignment of paired point sets.
pub mod rigid;
pub use rigid::estimate_rigid;
