//! Least-squares rigid alignment (Kabsch).

use glam::{DMat3, DVec3};

use crate::error::LinalgError;
use crate::transform::{dmat3_to_rows, RigidTransform};

/// Minimum number of paired points for a well-posed rigid estimate.
const MIN_CORRESPONDENCES: usize = 3;

/// Relative singular-value threshold below which the paired points are
/// treated as collinear.
const COLLINEAR_TOL: f64 = 1e-9;

/// Estimate the rigid transform that best maps `src` onto `dst` in the
/// least-squares sense.
///
/// The point sets must be paired one-to-one (`src[i]` corresponds to
/// `dst[i]`) and contain at least 3 non-collinear pairs. The rotation is
/// recovered from the SVD of the cross-covariance; a reflection solution is
/// corrected to the nearest proper rotation.
///
/// # Arguments
///
/// * `src` - Source points.
/// * `dst` - Target points, same length as `src`.
///
/// # Returns
///
/// The transform minimizing the sum of squared distances between
/// transformed source points and target points.
pub fn estimate_rigid(
    src: &[[f64; 3]],
    dst: &[[f64; 3]],
) -> Result<RigidTransform, LinalgError> {
    if src.len() != dst.len() {
        return Err(LinalgError::MismatchedLengths(src.len(), dst.len()));
    }
    if src.len() < MIN_CORRESPONDENCES {
        return Err(LinalgError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            actual: src.len(),
        });
    }

    // Identical sets map to themselves exactly.
    if src == dst {
        return Ok(RigidTransform::identity());
    }

    let (mu_src, mu_dst) = centroids(src, dst);

    // cross-covariance h[r][c] = sum over pairs of dst_centered[r] * src_centered[c]
    let mut h = [[0.0f64; 3]; 3];
    for (p_src, p_dst) in src.iter().zip(dst.iter()) {
        let sc = (DVec3::from_array(*p_src) - mu_src).to_array();
        let dc = (DVec3::from_array(*p_dst) - mu_dst).to_array();
        for (r, &dc_r) in dc.iter().enumerate() {
            for (c, &sc_c) in sc.iter().enumerate() {
                h[r][c] += dc_r * sc_c;
            }
        }
    }

    let h_mat = faer::mat![
        [h[0][0], h[0][1], h[0][2]],
        [h[1][0], h[1][1], h[1][2]],
        [h[2][0], h[2][1], h[2][2]],
    ];
    let svd = h_mat.svd();
    let s = svd.s_diagonal();

    // A vanishing second singular value means the centered points span a
    // line, leaving a rotation about that line undetermined.
    if s[1] <= COLLINEAR_TOL * s[0] {
        return Err(LinalgError::CollinearCorrespondences);
    }

    let u = dmat3_from_faer(svd.u());
    let v = dmat3_from_faer(svd.v());

    // R = U * V^T, with the reflection case folded back onto SO(3)
    let mut r = u * v.transpose();
    if r.determinant() < 0.0 {
        let correction = DMat3::from_diagonal(DVec3::new(1.0, 1.0, -1.0));
        r = u * correction * v.transpose();
    }

    let t = mu_dst - r * mu_src;

    let mut transform = RigidTransform::new(dmat3_to_rows(&r), t.to_array());
    transform.orthonormalize();
    Ok(transform)
}

/// Centroids of two paired point sets.
fn centroids(src: &[[f64; 3]], dst: &[[f64; 3]]) -> (DVec3, DVec3) {
    let mut mu_src = DVec3::ZERO;
    let mut mu_dst = DVec3::ZERO;
    for (p_src, p_dst) in src.iter().zip(dst.iter()) {
        mu_src += DVec3::from_array(*p_src);
        mu_dst += DVec3::from_array(*p_dst);
    }
    let n = src.len() as f64;
    (mu_src / n, mu_dst / n)
}

fn dmat3_from_faer(m: faer::MatRef<'_, f64>) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(m.read(0, 0), m.read(1, 0), m.read(2, 0)),
        DVec3::new(m.read(0, 1), m.read(1, 1), m.read(2, 1)),
        DVec3::new(m.read(0, 2), m.read(1, 2), m.read(2, 2)),
    )
}
