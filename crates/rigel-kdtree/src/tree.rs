use std::collections::BinaryHeap;

use thiserror::Error;

/// Default maximum number of points held by a leaf.
pub const DEFAULT_BUCKET_SIZE: usize = 10;

/// Errors produced by invalid query arguments.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KdTreeError {
    /// `k` must be greater than zero.
    #[error("neighbor count k must be greater than zero")]
    InvalidNeighborCount,

    /// The search radius must be non-negative (and not NaN).
    #[error("search radius must be non-negative, got {0}")]
    InvalidRadius(f64),
}

/// A candidate neighbor ordered by squared distance, ties broken by the
/// lowest original point index.
#[derive(Debug, PartialEq)]
struct Neighbor {
    dist_sq: f64,
    index: u32,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
enum Node {
    /// A contiguous range into the permuted index array.
    Leaf { start: u32, len: u32 },
    /// An axis-aligned split: points with `coord <= split` are in `left`,
    /// points with `coord >= split` are in `right`.
    Branch {
        axis: u8,
        split: f64,
        left: u32,
        right: u32,
    },
}

/// An exact k-d tree over a borrowed snapshot of 3D coordinates.
///
/// The tree is built once by recursive median splits along the axis of
/// largest spread; nodes live in an arena indexed by position. Queries are
/// exact, and ties on distance resolve to the lowest original point index.
/// The tree never outlives the coordinate slice it indexes, and rebuilding
/// is the only mutation path.
#[derive(Debug)]
pub struct KdTree<'a> {
    points: &'a [[f64; 3]],
    indices: Vec<u32>,
    nodes: Vec<Node>,
}

impl<'a> KdTree<'a> {
    /// Build a tree over `points` with the default leaf bucket size.
    pub fn new(points: &'a [[f64; 3]]) -> Self {
        Self::with_bucket_size(points, DEFAULT_BUCKET_SIZE)
    }

    /// Build a tree over `points` with a custom leaf bucket size (clamped
    /// to at least 1). Construction is deterministic for identical input.
    pub fn with_bucket_size(points: &'a [[f64; 3]], bucket_size: usize) -> Self {
        let bucket_size = bucket_size.max(1);
        let mut indices = (0..points.len() as u32).collect::<Vec<_>>();
        let mut nodes = Vec::new();
        if !points.is_empty() {
            build(points, &mut indices, 0, points.len(), bucket_size, &mut nodes);
        }
        Self {
            points,
            indices,
            nodes,
        }
    }

    /// Number of indexed points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the tree indexes no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Exact nearest neighbor of `query` as `(index, distance)`, or `None`
    /// for an empty tree. Ties resolve to the lowest original index.
    pub fn nearest(&self, query: &[f64; 3]) -> Option<(usize, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let mut best = Neighbor {
            dist_sq: f64::INFINITY,
            index: u32::MAX,
        };
        self.nearest_rec(self.root(), query, &mut best);
        Some((best.index as usize, best.dist_sq.sqrt()))
    }

    /// The `min(k, len)` nearest neighbors of `query`, ascending by
    /// `(distance, index)`. Fails when `k` is zero; an empty tree yields an
    /// empty result.
    pub fn k_nearest(
        &self,
        query: &[f64; 3],
        k: usize,
    ) -> Result<Vec<(usize, f64)>, KdTreeError> {
        if k == 0 {
            return Err(KdTreeError::InvalidNeighborCount);
        }
        let mut heap = BinaryHeap::with_capacity(k);
        if !self.points.is_empty() {
            self.k_nearest_rec(self.root(), query, k, &mut heap);
        }
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|n| (n.index as usize, n.dist_sq.sqrt()))
            .collect())
    }

    /// Indices of all points within `radius` of `query`, in no guaranteed
    /// order. Fails when the radius is negative or NaN; an empty tree yields
    /// an empty result.
    pub fn within_radius(&self, query: &[f64; 3], radius: f64) -> Result<Vec<usize>, KdTreeError> {
        if radius.is_nan() || radius < 0.0 {
            return Err(KdTreeError::InvalidRadius(radius));
        }
        let mut found = Vec::new();
        if !self.points.is_empty() {
            self.within_radius_rec(self.root(), query, radius * radius, &mut found);
        }
        Ok(found)
    }

    #[inline]
    fn root(&self) -> u32 {
        // nodes are pushed post-order, the root is always last
        (self.nodes.len() - 1) as u32
    }

    fn nearest_rec(&self, node: u32, query: &[f64; 3], best: &mut Neighbor) {
        match &self.nodes[node as usize] {
            Node::Leaf { start, len } => {
                for &index in &self.indices[*start as usize..(*start + *len) as usize] {
                    let candidate = Neighbor {
                        dist_sq: dist_sq(&self.points[index as usize], query),
                        index,
                    };
                    if candidate < *best {
                        *best = candidate;
                    }
                }
            }
            Node::Branch {
                axis,
                split,
                left,
                right,
            } => {
                let diff = query[*axis as usize] - split;
                let (near, far) = if diff < 0.0 {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                self.nearest_rec(near, query, best);
                // <= so an equally distant, lower-index point across the
                // plane can still win the tie
                if diff * diff <= best.dist_sq {
                    self.nearest_rec(far, query, best);
                }
            }
        }
    }

    fn k_nearest_rec(
        &self,
        node: u32,
        query: &[f64; 3],
        k: usize,
        heap: &mut BinaryHeap<Neighbor>,
    ) {
        match &self.nodes[node as usize] {
            Node::Leaf { start, len } => {
                for &index in &self.indices[*start as usize..(*start + *len) as usize] {
                    let candidate = Neighbor {
                        dist_sq: dist_sq(&self.points[index as usize], query),
                        index,
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if let Some(worst) = heap.peek() {
                        if candidate < *worst {
                            heap.pop();
                            heap.push(candidate);
                        }
                    }
                }
            }
            Node::Branch {
                axis,
                split,
                left,
                right,
            } => {
                let diff = query[*axis as usize] - split;
                let (near, far) = if diff < 0.0 {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                self.k_nearest_rec(near, query, k, heap);
                let worst = heap.peek().map_or(f64::INFINITY, |n| n.dist_sq);
                if heap.len() < k || diff * diff <= worst {
                    self.k_nearest_rec(far, query, k, heap);
                }
            }
        }
    }

    fn within_radius_rec(
        &self,
        node: u32,
        query: &[f64; 3],
        radius_sq: f64,
        found: &mut Vec<usize>,
    ) {
        match &self.nodes[node as usize] {
            Node::Leaf { start, len } => {
                for &index in &self.indices[*start as usize..(*start + *len) as usize] {
                    if dist_sq(&self.points[index as usize], query) <= radius_sq {
                        found.push(index as usize);
                    }
                }
            }
            Node::Branch {
                axis,
                split,
                left,
                right,
            } => {
                let diff = query[*axis as usize] - split;
                let (near, far) = if diff < 0.0 {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                self.within_radius_rec(near, query, radius_sq, found);
                if diff * diff <= radius_sq {
                    self.within_radius_rec(far, query, radius_sq, found);
                }
            }
        }
    }
}

/// Recursively partition `indices[start..end]`, appending nodes post-order
/// and returning the subtree root's arena index.
fn build(
    points: &[[f64; 3]],
    indices: &mut [u32],
    start: usize,
    end: usize,
    bucket_size: usize,
    nodes: &mut Vec<Node>,
) -> u32 {
    let count = end - start;
    if count <= bucket_size {
        nodes.push(Node::Leaf {
            start: start as u32,
            len: count as u32,
        });
        return (nodes.len() - 1) as u32;
    }

    // pick the axis with the largest value spread in this node
    let mut min = points[indices[start] as usize];
    let mut max = min;
    for &index in &indices[start..end] {
        let p = &points[index as usize];
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    let mut axis = 0;
    for candidate in 1..3 {
        if max[candidate] - min[candidate] > max[axis] - min[axis] {
            axis = candidate;
        }
    }

    // median split; equal coordinates order by original index so the
    // partition is deterministic
    indices[start..end].sort_unstable_by(|&a, &b| {
        points[a as usize][axis]
            .total_cmp(&points[b as usize][axis])
            .then(a.cmp(&b))
    });
    let mid = start + count / 2;
    let split = points[indices[mid] as usize][axis];

    let left = build(points, indices, start, mid, bucket_size, nodes);
    let right = build(points, indices, mid, end, bucket_size, nodes);
    nodes.push(Node::Branch {
        axis: axis as u8,
        split,
        left,
        right,
    });
    (nodes.len() - 1) as u32
}

#[inline]
fn dist_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}
