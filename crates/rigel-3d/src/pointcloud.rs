use rigel_linalg::RigidTransform;
use thiserror::Error;

/// Tolerance for the unit-norm check on normals.
const UNIT_NORM_TOL: f64 = 1e-6;

/// Errors produced when constructing or indexing a [`PointCloud`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PointCloudError {
    /// A point index was outside the cloud.
    #[error("point index {index} is out of range for a cloud of {len} points")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of points in the cloud.
        len: usize,
    },

    /// An optional attribute array must pair with the points one-to-one.
    #[error("{attribute} count ({actual}) does not match point count ({expected})")]
    MismatchedAttributeLengths {
        /// Name of the attribute array.
        attribute: &'static str,
        /// Number of points in the cloud.
        expected: usize,
        /// Length of the attribute array.
        actual: usize,
    },

    /// Point coordinates must be finite.
    #[error("point {index} has a non-finite coordinate")]
    NonFinitePoint {
        /// Index of the offending point.
        index: usize,
    },

    /// Normals must have unit length.
    #[error("normal {index} is not unit-norm")]
    InvalidNormal {
        /// Index of the offending normal.
        index: usize,
    },

    /// Color channels must lie in `[0, 1]`.
    #[error("color {index} has a channel outside [0, 1]")]
    InvalidColor {
        /// Index of the offending color.
        index: usize,
    },
}

/// An ordered, immutable collection of 3D points with optional per-point
/// unit normals and `[0, 1]` RGB colors.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    points: Vec<[f64; 3]>,
    normals: Option<Vec<[f64; 3]>>,
    colors: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a point cloud from points and optional normals and colors.
    ///
    /// Validates that every coordinate is finite, that the optional arrays
    /// pair with the points one-to-one, that normals are unit-norm, and that
    /// color channels lie in `[0, 1]`.
    pub fn new(
        points: Vec<[f64; 3]>,
        normals: Option<Vec<[f64; 3]>>,
        colors: Option<Vec<[f64; 3]>>,
    ) -> Result<Self, PointCloudError> {
        for (index, point) in points.iter().enumerate() {
            if !point.iter().all(|v| v.is_finite()) {
                return Err(PointCloudError::NonFinitePoint { index });
            }
        }

        if let Some(normals) = &normals {
            if normals.len() != points.len() {
                return Err(PointCloudError::MismatchedAttributeLengths {
                    attribute: "normal",
                    expected: points.len(),
                    actual: normals.len(),
                });
            }
            for (index, normal) in normals.iter().enumerate() {
                let norm_sq = normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2];
                if !norm_sq.is_finite() || (norm_sq.sqrt() - 1.0).abs() > UNIT_NORM_TOL {
                    return Err(PointCloudError::InvalidNormal { index });
                }
            }
        }

        if let Some(colors) = &colors {
            if colors.len() != points.len() {
                return Err(PointCloudError::MismatchedAttributeLengths {
                    attribute: "color",
                    expected: points.len(),
                    actual: colors.len(),
                });
            }
            for (index, color) in colors.iter().enumerate() {
                if !color.iter().all(|c| (0.0..=1.0).contains(c)) {
                    return Err(PointCloudError::InvalidColor { index });
                }
            }
        }

        Ok(Self {
            points,
            normals,
            colors,
        })
    }

    /// Create a point cloud with points only.
    pub fn from_points(points: Vec<[f64; 3]>) -> Result<Self, PointCloudError> {
        Self::new(points, None, None)
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[f64; 3]]> {
        self.colors.as_deref()
    }

    /// Get the point at `index`, failing when the index is out of range.
    pub fn get(&self, index: usize) -> Result<&[f64; 3], PointCloudError> {
        self.points
            .get(index)
            .ok_or(PointCloudError::IndexOutOfRange {
                index,
                len: self.points.len(),
            })
    }

    /// Produce a new point cloud with every point transformed by `transform`.
    ///
    /// Normals are rotated but not translated; colors are carried over
    /// unchanged. The original cloud is untouched.
    pub fn transformed(&self, transform: &RigidTransform) -> Self {
        let points = self.points.iter().map(|p| transform.apply(p)).collect();
        let normals = self
            .normals
            .as_ref()
            .map(|normals| normals.iter().map(|n| transform.rotate(n)).collect());
        Self {
            points,
            normals,
            colors: self.colors.clone(),
        }
    }

    /// The per-axis minimum over all points, or zeros for an empty cloud.
    pub fn min_bound(&self) -> [f64; 3] {
        self.fold_bound(f64::min)
    }

    /// The per-axis maximum over all points, or zeros for an empty cloud.
    pub fn max_bound(&self) -> [f64; 3] {
        self.fold_bound(f64::max)
    }

    fn fold_bound(&self, pick: fn(f64, f64) -> f64) -> [f64; 3] {
        let Some(first) = self.points.first() else {
            return [0.0; 3];
        };
        self.points.iter().fold(*first, |acc, p| {
            [pick(acc[0], p[0]), pick(acc[1], p[1]), pick(acc[2], p[2])]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rigel_linalg::rotation_from_axis_angle;

    #[test]
    fn test_pointcloud_accessors() {
        let cloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            Some(vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
            Some(vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
        )
        .unwrap();

        assert_eq!(cloud.len(), 2);
        assert!(!cloud.is_empty());
        assert_eq!(cloud.points().len(), 2);
        assert_eq!(cloud.normals().map(|n| n.len()), Some(2));
        assert_eq!(cloud.colors().map(|c| c.len()), Some(2));
        assert_eq!(cloud.get(1).unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_get_out_of_range() {
        let cloud = PointCloud::from_points(vec![[0.0; 3]]).unwrap();
        assert_eq!(
            cloud.get(1),
            Err(PointCloudError::IndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_rejects_non_finite_point() {
        let result = PointCloud::from_points(vec![[0.0, f64::NAN, 0.0]]);
        assert_eq!(result, Err(PointCloudError::NonFinitePoint { index: 0 }));
    }

    #[test]
    fn test_rejects_mismatched_normals() {
        let result = PointCloud::new(
            vec![[0.0; 3], [1.0, 0.0, 0.0]],
            Some(vec![[0.0, 0.0, 1.0]]),
            None,
        );
        assert_eq!(
            result,
            Err(PointCloudError::MismatchedAttributeLengths {
                attribute: "normal",
                expected: 2,
                actual: 1,
            })
        );
    }

    #[test]
    fn test_rejects_non_unit_normal() {
        let result = PointCloud::new(vec![[0.0; 3]], Some(vec![[0.0, 0.0, 2.0]]), None);
        assert_eq!(result, Err(PointCloudError::InvalidNormal { index: 0 }));
    }

    #[test]
    fn test_rejects_out_of_range_color() {
        let result = PointCloud::new(vec![[0.0; 3]], None, Some(vec![[0.0, 1.5, 0.0]]));
        assert_eq!(result, Err(PointCloudError::InvalidColor { index: 0 }));
    }

    #[test]
    fn test_transformed_identity_preserves_points() {
        let cloud = PointCloud::from_points(vec![[1.0, 2.0, 3.0], [-4.0, 5.0, 0.5]]).unwrap();
        let transformed = cloud.transformed(&RigidTransform::identity());
        for (p, q) in cloud.points().iter().zip(transformed.points().iter()) {
            for (a, b) in p.iter().zip(q.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_transformed_rotates_normals_without_translation() {
        let rotation =
            rotation_from_axis_angle(&[0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2).unwrap();
        let transform = RigidTransform::new(rotation, [5.0, 5.0, 5.0]);
        let cloud = PointCloud::new(
            vec![[1.0, 0.0, 0.0]],
            Some(vec![[1.0, 0.0, 0.0]]),
            None,
        )
        .unwrap();

        let transformed = cloud.transformed(&transform);

        // the point picks up the translation
        let p = transformed.points()[0];
        assert_relative_eq!(p[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 6.0, epsilon = 1e-12);
        assert_relative_eq!(p[2], 5.0, epsilon = 1e-12);

        // the normal is only rotated
        let n = transformed.normals().unwrap()[0];
        assert_relative_eq!(n[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(n[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(n[2], 0.0, epsilon = 1e-12);

        // the original cloud is untouched
        assert_eq!(cloud.points()[0], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bounds() {
        let cloud =
            PointCloud::from_points(vec![[1.0, -2.0, 3.0], [-1.0, 4.0, 0.0], [0.5, 0.0, -7.0]])
                .unwrap();
        assert_eq!(cloud.min_bound(), [-1.0, -2.0, -7.0]);
        assert_eq!(cloud.max_bound(), [1.0, 4.0, 3.0]);

        let empty = PointCloud::from_points(vec![]).unwrap();
        assert_eq!(empty.min_bound(), [0.0; 3]);
        assert_eq!(empty.max_bound(), [0.0; 3]);
    }
}
