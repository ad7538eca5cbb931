#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use rigel_3d as cloud;

#[doc(inline)]
pub use rigel_kdtree as kdtree;

#[doc(inline)]
pub use rigel_linalg as linalg;

#[doc(inline)]
pub use rigel_icp as icp;
