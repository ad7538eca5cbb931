use thiserror::Error;

/// Errors produced by the rigid transform and alignment routines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinalgError {
    /// Source and target point sets must be paired one-to-one.
    #[error("source ({0}) and target ({1}) point counts differ")]
    MismatchedLengths(usize, usize),

    /// Not enough correspondences to determine a rigid transform.
    #[error("rigid estimation requires at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimum number of paired points required.
        required: usize,
        /// Number of paired points provided.
        actual: usize,
    },

    /// The correspondences lie on a line, so the rotation is not unique.
    #[error("correspondences are collinear, rotation is not uniquely determined")]
    CollinearCorrespondences,

    /// A rotation axis must have a non-zero length.
    #[error("rotation axis must be non-zero")]
    ZeroAxis,
}
