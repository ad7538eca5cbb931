#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod tree;
pub use tree::{KdTree, KdTreeError, DEFAULT_BUCKET_SIZE};
