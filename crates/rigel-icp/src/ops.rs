use rigel_kdtree::KdTree;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Correspondences surviving the distance gate for one iteration.
#[derive(Debug, Default)]
pub(crate) struct Correspondences {
    /// Matched source points (already transformed by the running estimate).
    pub source: Vec<[f64; 3]>,
    /// Matched target points.
    pub target: Vec<[f64; 3]>,
    /// Squared distances of the surviving pairs.
    pub squared_distances: Vec<f64>,
    /// Number of source points rejected by the distance gate.
    pub discarded: usize,
}

/// For every source point, find its exact nearest neighbor in the target
/// tree and keep the pair when the distance is within `max_distance`.
///
/// The per-point queries are independent; with the `parallel` feature they
/// run on the rayon pool in input order, so the output is identical to the
/// sequential path.
pub(crate) fn find_correspondences(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    tree: &KdTree<'_>,
    max_distance: f64,
) -> Correspondences {
    #[cfg(feature = "parallel")]
    let matches = source
        .par_iter()
        .map(|p| tree.nearest(p))
        .collect::<Vec<_>>();

    #[cfg(not(feature = "parallel"))]
    let matches = source.iter().map(|p| tree.nearest(p)).collect::<Vec<_>>();

    let mut correspondences = Correspondences::default();
    for (point, nearest) in source.iter().zip(matches) {
        match nearest {
            Some((index, distance)) if distance <= max_distance => {
                correspondences.source.push(*point);
                correspondences.target.push(target[index]);
                correspondences.squared_distances.push(distance * distance);
            }
            _ => correspondences.discarded += 1,
        }
    }
    correspondences
}
