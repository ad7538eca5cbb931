use glam::{DMat3, DVec3};

use crate::error::LinalgError;

/// A rigid 3D transformation: a proper rotation followed by a translation.
///
/// The rotation matrix is stored row-major and maps coordinates from the
/// source to the target frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidTransform {
    /// Rotation matrix (orthonormal, determinant +1).
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Create a transform from a rotation matrix and a translation vector.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// Apply the transform to a single point.
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        let rotated = self.rotate(point);
        [
            rotated[0] + self.translation[0],
            rotated[1] + self.translation[1],
            rotated[2] + self.translation[2],
        ]
    }

    /// Apply only the rotation part, e.g. to direction vectors or normals.
    pub fn rotate(&self, vector: &[f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        [
            r[0][0] * vector[0] + r[0][1] * vector[1] + r[0][2] * vector[2],
            r[1][0] * vector[0] + r[1][1] * vector[1] + r[1][2] * vector[2],
            r[2][0] * vector[0] + r[2][1] * vector[1] + r[2][2] * vector[2],
        ]
    }

    /// Transform a batch of points into a pre-allocated destination buffer.
    ///
    /// PRECONDITION: `dst` has the same length as `src`.
    pub fn apply_many(&self, src: &[[f64; 3]], dst: &mut [[f64; 3]]) {
        assert_eq!(src.len(), dst.len());
        for (point, out) in src.iter().zip(dst.iter_mut()) {
            *out = self.apply(point);
        }
    }

    /// Compose two transforms: the returned transform applies `other` first,
    /// then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        let ra = self.to_dmat3();
        let rb = other.to_dmat3();
        let ta = DVec3::from_array(self.translation);
        let tb = DVec3::from_array(other.translation);
        Self {
            rotation: dmat3_to_rows(&(ra * rb)),
            translation: (ra * tb + ta).to_array(),
        }
    }

    /// The exact inverse transform.
    pub fn inverse(&self) -> Self {
        let rt = self.to_dmat3().transpose();
        let t = DVec3::from_array(self.translation);
        Self {
            rotation: dmat3_to_rows(&rt),
            translation: (-(rt * t)).to_array(),
        }
    }

    /// The rotation angle in radians, in `[0, pi]`.
    pub fn rotation_angle(&self) -> f64 {
        let trace = self.rotation[0][0] + self.rotation[1][1] + self.rotation[2][2];
        (((trace - 1.0) / 2.0).clamp(-1.0, 1.0)).acos()
    }

    /// The Euclidean norm of the translation vector.
    pub fn translation_norm(&self) -> f64 {
        DVec3::from_array(self.translation).length()
    }

    /// Re-orthonormalize the rotation matrix in place (Gram-Schmidt on the
    /// column basis), restoring the proper-rotation invariant after
    /// accumulated floating-point drift.
    pub fn orthonormalize(&mut self) {
        let m = self.to_dmat3();
        let x = m.x_axis.normalize();
        let z = x.cross(m.y_axis).normalize();
        let y = z.cross(x);
        self.rotation = dmat3_to_rows(&DMat3::from_cols(x, y, z));
    }

    pub(crate) fn to_dmat3(&self) -> DMat3 {
        let r = &self.rotation;
        DMat3::from_cols(
            DVec3::new(r[0][0], r[1][0], r[2][0]),
            DVec3::new(r[0][1], r[1][1], r[2][1]),
            DVec3::new(r[0][2], r[1][2], r[2][2]),
        )
    }
}

pub(crate) fn dmat3_to_rows(m: &DMat3) -> [[f64; 3]; 3] {
    [
        [m.x_axis.x, m.y_axis.x, m.z_axis.x],
        [m.x_axis.y, m.y_axis.y, m.z_axis.y],
        [m.x_axis.z, m.y_axis.z, m.z_axis.z],
    ]
}

/// Compute the rotation matrix for a rotation of `angle` radians around
/// `axis` (Rodrigues formula). The axis does not need to be normalized but
/// must be non-zero.
pub fn rotation_from_axis_angle(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], LinalgError> {
    let v = DVec3::from_array(*axis);
    let length = v.length();
    if length < 1e-10 {
        return Err(LinalgError::ZeroAxis);
    }
    let n = v / length;

    let (s, c) = angle.sin_cos();
    let t = 1.0 - c;
    let (x, y, z) = (n.x, n.y, n.z);

    Ok([
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_transform_relative_eq(a: &RigidTransform, b: &RigidTransform, epsilon: f64) {
        for (row_a, row_b) in a.rotation.iter().zip(b.rotation.iter()) {
            for (va, vb) in row_a.iter().zip(row_b.iter()) {
                assert_relative_eq!(va, vb, epsilon = epsilon);
            }
        }
        for (va, vb) in a.translation.iter().zip(b.translation.iter()) {
            assert_relative_eq!(va, vb, epsilon = epsilon);
        }
    }

    fn random_transform() -> RigidTransform {
        let axis = [
            rand::random::<f64>() - 0.5,
            rand::random::<f64>() - 0.5,
            rand::random::<f64>() + 0.1,
        ];
        let angle = rand::random::<f64>() * std::f64::consts::PI;
        let rotation = rotation_from_axis_angle(&axis, angle).unwrap();
        let translation = [
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
        ];
        RigidTransform::new(rotation, translation)
    }

    #[test]
    fn test_identity_apply() {
        let t = RigidTransform::identity();
        let p = [1.0, -2.0, 3.5];
        assert_eq!(t.apply(&p), p);
        assert_eq!(t.rotation_angle(), 0.0);
        assert_eq!(t.translation_norm(), 0.0);
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        for _ in 0..10 {
            let t = random_transform();
            let composed = t.compose(&t.inverse());
            assert_transform_relative_eq(&composed, &RigidTransform::identity(), 1e-12);
        }
    }

    #[test]
    fn test_apply_roundtrip() {
        let t = random_transform();
        let p = [0.3, 1.7, -0.9];
        let q = t.inverse().apply(&t.apply(&p));
        for (a, b) in q.iter().zip(p.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let a = random_transform();
        let b = random_transform();
        let p = [0.1, 0.2, 0.3];
        let chained = a.apply(&b.apply(&p));
        let composed = a.compose(&b).apply(&p);
        for (x, y) in composed.iter().zip(chained.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rotation_angle_matches_axis_angle() {
        let angle = 0.42;
        let rotation = rotation_from_axis_angle(&[0.0, 1.0, 0.0], angle).unwrap();
        let t = RigidTransform::new(rotation, [0.0; 3]);
        assert_relative_eq!(t.rotation_angle(), angle, epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_does_not_translate() {
        let rotation = rotation_from_axis_angle(&[0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2)
            .unwrap();
        let t = RigidTransform::new(rotation, [10.0, 20.0, 30.0]);
        let v = t.rotate(&[1.0, 0.0, 0.0]);
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(v[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_orthonormalize_restores_rotation() {
        let mut t = random_transform();
        // perturb the rotation slightly
        t.rotation[0][0] += 1e-4;
        t.rotation[1][2] -= 1e-4;
        t.orthonormalize();
        let r = t.to_dmat3();
        let should_be_identity = r.transpose() * r;
        let identity = DMat3::IDENTITY;
        for j in 0..3 {
            for i in 0..3 {
                assert_relative_eq!(
                    should_be_identity.col(j)[i],
                    identity.col(j)[i],
                    epsilon = 1e-9
                );
            }
        }
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_axis_angle_zero_axis_fails() {
        let result = rotation_from_axis_angle(&[0.0, 0.0, 0.0], 1.0);
        assert_eq!(result, Err(LinalgError::ZeroAxis));
    }

    #[test]
    fn test_axis_angle_quarter_turn() {
        let rotation =
            rotation_from_axis_angle(&[1.0, 0.0, 0.0], std::f64::consts::FRAC_PI_2).unwrap();
        let t = RigidTransform::new(rotation, [0.0; 3]);
        let v = t.apply(&[0.0, 1.0, 0.0]);
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(v[2], 1.0, epsilon = 1e-12);
    }
}
