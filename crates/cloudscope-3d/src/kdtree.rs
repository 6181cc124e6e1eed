//! A balanced kd-tree over the positions of a [`PointStore`].
//!
//! The tree does not own the points. [`KdTree::build`] reorders the store in
//! place so that every node covers a contiguous index range `[lo, hi)` of it,
//! and the nodes live in a flat arena addressed by index. Query results are
//! indices into the store as ordered by the last build.
//!
//! A tree is only meaningful for the exact ordering it was built over. Every
//! query takes the store again and fails with [`KdTreeError::StaleTree`] when
//! the store generation no longer matches, instead of returning indices into
//! a sequence that has been reordered or resized since.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use cloudscope_linalg::vector;

use crate::point::{Point, PointStore};

/// Number of spatial dimensions; the split axis at depth `d` is `d % DIMS`.
const DIMS: usize = 3;

/// Error types for the kd-tree module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum KdTreeError {
    /// The store was reordered or resized after the tree was built.
    #[error("Kd-tree built for store generation {built} queried with generation {current}")]
    StaleTree {
        /// Generation the tree was built against.
        built: u64,
        /// Generation of the store passed to the query.
        current: u64,
    },
}

#[derive(Debug, Clone)]
struct KdNode {
    // index range of the store governed by this node
    lo: usize,
    hi: usize,
    // coordinate of the point at `mid` along the split axis, unused for leaves
    split: f64,
    left: Option<usize>,
    right: Option<usize>,
}

impl KdNode {
    #[inline]
    fn children(&self) -> Option<(usize, usize)> {
        self.left.zip(self.right)
    }
}

/// Balanced kd-tree over a [`PointStore`].
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    root: Option<usize>,
    generation: u64,
    len: usize,
    depth: usize,
}

impl KdTree {
    /// Build a tree over `store`.
    ///
    /// The points of the store are partitioned in place: at depth `d` the
    /// point of rank `n / 2` along axis `d % 3` is selected into the middle of
    /// the current range, points with a smaller or equal coordinate before it
    /// and points with a larger or equal coordinate after it. This changes the
    /// store generation, so trees built earlier over the same store become
    /// stale.
    ///
    /// PRECONDITION: all coordinates are finite.
    ///
    /// Example:
    ///
    /// ```
    /// use cloudscope_3d::kdtree::KdTree;
    /// use cloudscope_3d::point::PointStore;
    ///
    /// let mut store = PointStore::from_positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
    /// let tree = KdTree::build(&mut store);
    /// let nearest = tree.nearest_neighbor(&store, &[0.9, 0.1, 0.0]).unwrap();
    /// assert_eq!(store.position(nearest.unwrap()), &[1.0, 0.0, 0.0]);
    /// ```
    pub fn build(store: &mut PointStore) -> Self {
        let mut nodes = Vec::with_capacity(2 * store.len());
        let mut depth = 0;

        let points = store.as_mut_slice();
        let len = points.len();
        let root = match len {
            0 => None,
            _ => Some(build_node(points, 0, len, 0, &mut nodes, &mut depth)),
        };

        log::debug!(
            "built kd-tree over {} points: {} nodes, depth {}",
            len,
            nodes.len(),
            depth
        );

        Self {
            nodes,
            root,
            generation: store.generation(),
            len,
            depth,
        }
    }

    /// Number of points indexed by the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the tree indexes no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of nodes in the arena.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf, the root being at depth 0.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Store generation the tree was built against.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the tree still describes the ordering of `store`.
    #[inline]
    pub fn is_valid_for(&self, store: &PointStore) -> bool {
        self.generation == store.generation() && self.len == store.len()
    }

    fn check(&self, store: &PointStore) -> Result<(), KdTreeError> {
        if self.is_valid_for(store) {
            Ok(())
        } else {
            Err(KdTreeError::StaleTree {
                built: self.generation,
                current: store.generation(),
            })
        }
    }

    /// Find all points inside the axis-aligned box `[min, max]`.
    ///
    /// Bounds are inclusive on every axis. A subtree is entered on the left
    /// when `min[axis] <= split` and on the right when `max[axis] >= split`.
    /// The right test is inclusive because the point at the split position is
    /// stored in the right subtree; with a strict test a point lying exactly
    /// on both `max[axis]` and the split value would be skipped. This differs
    /// on purpose from a strict `max[axis] > split` right descent.
    ///
    /// # Returns
    ///
    /// The indices of the points inside the box, in tree order. Empty when
    /// nothing matches or `min > max` on some axis.
    pub fn range_query(
        &self,
        store: &PointStore,
        min: &[f64; 3],
        max: &[f64; 3],
    ) -> Result<Vec<usize>, KdTreeError> {
        self.check(store)?;
        let mut indices = Vec::new();
        if let Some(root) = self.root {
            self.range_query_node(store.points(), root, 0, min, max, &mut indices);
        }
        Ok(indices)
    }

    fn range_query_node(
        &self,
        points: &[Point],
        node: usize,
        depth: usize,
        min: &[f64; 3],
        max: &[f64; 3],
        indices: &mut Vec<usize>,
    ) {
        let node = &self.nodes[node];
        match node.children() {
            Some((left, right)) => {
                let axis = depth % DIMS;
                if min[axis] <= node.split {
                    self.range_query_node(points, left, depth + 1, min, max, indices);
                }
                if max[axis] >= node.split {
                    self.range_query_node(points, right, depth + 1, min, max, indices);
                }
            }
            None => {
                for index in node.lo..node.hi {
                    if in_range(&points[index].position, min, max) {
                        indices.push(index);
                    }
                }
            }
        }
    }

    /// Find all points within Euclidean distance `radius` of `center`.
    ///
    /// The bounding box of the sphere is queried first, then candidates
    /// farther than `radius` are discarded.
    pub fn sphere_query(
        &self,
        store: &PointStore,
        center: &[f64; 3],
        radius: f64,
    ) -> Result<Vec<usize>, KdTreeError> {
        let min = [center[0] - radius, center[1] - radius, center[2] - radius];
        let max = [center[0] + radius, center[1] + radius, center[2] + radius];

        let mut indices = self.range_query(store, &min, &max)?;
        indices.retain(|&i| vector::distance(store.position(i), center) <= radius);
        Ok(indices)
    }

    /// Find the point closest to `query`.
    ///
    /// Descends to the leaf on the side of each split that contains `query`,
    /// then unwinds and visits the other side of a split only when the
    /// splitting plane is closer than the best point found so far.
    ///
    /// # Returns
    ///
    /// The index of a closest point, `None` for an empty tree.
    pub fn nearest_neighbor(
        &self,
        store: &PointStore,
        query: &[f64; 3],
    ) -> Result<Option<usize>, KdTreeError> {
        self.check(store)?;
        let mut best = None;
        if let Some(root) = self.root {
            self.nearest_node(store.points(), root, 0, query, &mut best);
        }
        Ok(best.map(|(index, _)| index))
    }

    fn nearest_node(
        &self,
        points: &[Point],
        node: usize,
        depth: usize,
        query: &[f64; 3],
        best: &mut Option<(usize, f64)>,
    ) {
        let node = &self.nodes[node];
        let Some((left, right)) = node.children() else {
            for index in node.lo..node.hi {
                let d2 = vector::distance_squared(&points[index].position, query);
                if best.map_or(true, |(_, best_d2)| d2 < best_d2) {
                    *best = Some((index, d2));
                }
            }
            return;
        };

        let axis = depth % DIMS;
        let diff = query[axis] - node.split;
        let (near, far) = if diff <= 0.0 {
            (left, right)
        } else {
            (right, left)
        };

        self.nearest_node(points, near, depth + 1, query, best);

        if best.map_or(true, |(_, best_d2)| diff * diff < best_d2) {
            self.nearest_node(points, far, depth + 1, query, best);
        }
    }

    /// Find the `k` points closest to `query`.
    ///
    /// # Returns
    ///
    /// Pairs of `(index, distance)` sorted by ascending distance. Fewer than
    /// `k` pairs when the tree holds fewer points.
    pub fn k_nearest(
        &self,
        store: &PointStore,
        query: &[f64; 3],
        k: usize,
    ) -> Result<Vec<(usize, f64)>, KdTreeError> {
        self.check(store)?;
        let k = k.min(self.len);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap = BinaryHeap::with_capacity(k);
        if let Some(root) = self.root {
            self.knn_node(store.points(), root, 0, query, k, &mut heap);
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.index, c.distance_sq.sqrt()))
            .collect())
    }

    fn knn_node(
        &self,
        points: &[Point],
        node: usize,
        depth: usize,
        query: &[f64; 3],
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        let node = &self.nodes[node];
        let Some((left, right)) = node.children() else {
            for index in node.lo..node.hi {
                let distance_sq = vector::distance_squared(&points[index].position, query);
                if heap.len() < k {
                    heap.push(Candidate { distance_sq, index });
                } else if heap.peek().is_some_and(|top| distance_sq < top.distance_sq) {
                    heap.pop();
                    heap.push(Candidate { distance_sq, index });
                }
            }
            return;
        };

        let axis = depth % DIMS;
        let diff = query[axis] - node.split;
        let (near, far) = if diff <= 0.0 {
            (left, right)
        } else {
            (right, left)
        };

        self.knn_node(points, near, depth + 1, query, k, heap);

        let worst = match heap.len() < k {
            true => f64::INFINITY,
            false => heap.peek().map_or(f64::INFINITY, |top| top.distance_sq),
        };
        if diff * diff < worst {
            self.knn_node(points, far, depth + 1, query, k, heap);
        }
    }
}

fn build_node(
    points: &mut [Point],
    lo: usize,
    hi: usize,
    depth: usize,
    nodes: &mut Vec<KdNode>,
    max_depth: &mut usize,
) -> usize {
    let index = nodes.len();
    nodes.push(KdNode {
        lo,
        hi,
        split: 0.0,
        left: None,
        right: None,
    });
    *max_depth = (*max_depth).max(depth);

    let n = hi - lo;
    if n <= 1 {
        return index;
    }

    let axis = depth % DIMS;
    let half = n / 2;
    let mid = lo + half;

    // linear time selection, [lo, mid) <= points[mid] <= [mid + 1, hi)
    points[lo..hi].select_nth_unstable_by(half, |a, b| axis_cmp(a, b, axis));
    let split = points[mid].position[axis];

    let left = build_node(points, lo, mid, depth + 1, nodes, max_depth);
    let right = build_node(points, mid, hi, depth + 1, nodes, max_depth);

    let node = &mut nodes[index];
    node.split = split;
    node.left = Some(left);
    node.right = Some(right);
    index
}

#[inline]
fn axis_cmp(a: &Point, b: &Point, axis: usize) -> Ordering {
    a.position[axis].total_cmp(&b.position[axis])
}

/// Check whether `point` lies inside the box `[min, max]`, bounds included.
#[inline]
pub fn in_range(point: &[f64; 3], min: &[f64; 3], max: &[f64; 3]) -> bool {
    (0..DIMS).all(|axis| point[axis] >= min[axis] && point[axis] <= max[axis])
}

#[derive(Debug, PartialEq)]
struct Candidate {
    distance_sq: f64,
    index: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
