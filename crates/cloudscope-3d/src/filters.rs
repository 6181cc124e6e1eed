//! Neighborhood filters built on kd-tree sphere queries.
//!
//! All filters take the store together with a tree built over it. They fail
//! with [`FilterError::KdTree`] when the tree is stale for the store.

use rayon::prelude::*;

use cloudscope_linalg::vector;

use crate::kdtree::{KdTree, KdTreeError};
use crate::plane;
use crate::point::{Point, PointStore};

/// Minimum number of points in a neighborhood to estimate a normal.
pub const MIN_NORMAL_NEIGHBORS: usize = 3;

/// Error types for the filters module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FilterError {
    /// The neighborhood radius is not a positive finite number.
    #[error("Invalid neighborhood radius: {0}")]
    InvalidRadius(f64),

    /// The kd-tree does not match the store.
    #[error(transparent)]
    KdTree(#[from] KdTreeError),
}

fn check_radius(radius: f64) -> Result<(), FilterError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidRadius(radius))
    }
}

/// Smooth the positions of a point cloud.
///
/// Every point is moved to the weighted mean of its neighbors within
/// `radius`, itself included, with weights `exp(-distance / radius)`. Normals
/// and colors are kept. Points are processed in parallel; each one reads the
/// input store only and writes its own output slot.
///
/// # Arguments
///
/// * `store` - The input points.
/// * `tree` - A tree built over `store`.
/// * `radius` - The neighborhood radius.
///
/// # Returns
///
/// A new store with the smoothed points, in the order of `store`.
pub fn smooth(store: &PointStore, tree: &KdTree, radius: f64) -> Result<PointStore, FilterError> {
    check_radius(radius)?;

    let points = store
        .points()
        .par_iter()
        .map(|p| -> Result<Point, KdTreeError> {
            let neighbors = tree.sphere_query(store, &p.position, radius)?;
            Ok(smooth_point(store, p, &neighbors, radius))
        })
        .collect::<Result<Vec<Point>, KdTreeError>>()?;

    log::debug!("smoothed {} points with radius {}", points.len(), radius);

    Ok(PointStore::from_points(points))
}

fn smooth_point(store: &PointStore, p: &Point, neighbors: &[usize], radius: f64) -> Point {
    if neighbors.is_empty() {
        return *p;
    }

    let mut sum = [0.0; 3];
    let mut weight_sum = 0.0;
    for &i in neighbors {
        let q = store.position(i);
        let w = (-vector::distance(&p.position, q) / radius).exp();
        sum = vector::add(&sum, &vector::scale(q, w));
        weight_sum += w;
    }

    Point {
        position: vector::scale(&sum, 1.0 / weight_sum),
        ..*p
    }
}

/// Mark the points removed by greedy thinning.
///
/// Points are visited in store order. Each point not yet removed removes
/// every other point within `radius` of it, so earlier points survive
/// preferentially. The pass is sequential because every decision depends on
/// the flags set before it.
fn thinning_flags(store: &PointStore, tree: &KdTree, radius: f64) -> Result<Vec<bool>, FilterError> {
    check_radius(radius)?;

    let mut removed = vec![false; store.len()];
    for (i, p) in store.points().iter().enumerate() {
        if removed[i] {
            continue;
        }
        for j in tree.sphere_query(store, &p.position, radius)? {
            if j != i {
                removed[j] = true;
            }
        }
    }
    Ok(removed)
}

/// Thin a point cloud so that no two points are within `radius`.
///
/// # Returns
///
/// A new store holding the surviving points in their original relative
/// order. Applying the filter again with the same radius removes nothing.
pub fn thin(store: &PointStore, tree: &KdTree, radius: f64) -> Result<PointStore, FilterError> {
    let removed = thinning_flags(store, tree, radius)?;

    let survivors = store
        .points()
        .iter()
        .zip(removed.iter())
        .filter(|&(_, &removed)| !removed)
        .map(|(p, _)| *p)
        .collect::<PointStore>();

    log::debug!(
        "thinned {} points to {} with radius {}",
        store.len(),
        survivors.len(),
        radius
    );

    Ok(survivors)
}

/// Thin a point cloud in place.
///
/// Flags the removed points on the store and then compacts it. The store
/// generation changes when anything is removed, so `tree` must be rebuilt
/// before it is queried again.
///
/// # Returns
///
/// The number of points removed.
pub fn thin_in_place(
    store: &mut PointStore,
    tree: &KdTree,
    radius: f64,
) -> Result<usize, FilterError> {
    let removed = thinning_flags(store, tree, radius)?;
    for (i, removed) in removed.into_iter().enumerate() {
        store.set_removed(i, removed);
    }
    Ok(store.compact())
}

/// Estimate the normal of every point from its neighborhood.
///
/// The normal of a point is the normal of the plane fitted to its neighbors
/// within `radius`, itself included, see [`plane::fit_normal`]. Points with
/// fewer than [`MIN_NORMAL_NEIGHBORS`] neighbors, or with collinear
/// neighbors, get the zero vector. The orientation of each normal is
/// arbitrary.
///
/// Normals are computed in parallel and written afterwards without
/// reordering the store, so `tree` stays valid.
///
/// # Returns
///
/// The number of points for which no normal could be estimated.
pub fn estimate_normals(
    store: &mut PointStore,
    tree: &KdTree,
    radius: f64,
) -> Result<usize, FilterError> {
    check_radius(radius)?;

    let normals = {
        let store: &PointStore = store;
        store
            .points()
            .par_iter()
            .map(|p| -> Result<[f64; 3], KdTreeError> {
                let neighbors = tree.sphere_query(store, &p.position, radius)?;
                if neighbors.len() < MIN_NORMAL_NEIGHBORS {
                    return Ok([0.0; 3]);
                }
                Ok(plane::fit_normal(&store.positions_at(&neighbors)))
            })
            .collect::<Result<Vec<[f64; 3]>, KdTreeError>>()?
    };

    let mut failed = 0;
    for (i, normal) in normals.into_iter().enumerate() {
        if normal == [0.0; 3] {
            failed += 1;
        }
        store.set_normal(i, normal);
    }

    if failed > 0 {
        log::info!(
            "no normal for {} of {} points with radius {}",
            failed,
            store.len(),
            radius
        );
    }

    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::grid_cloud;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn sorted_positions(store: &PointStore) -> Vec<[f64; 3]> {
        let mut positions = store.positions();
        positions.sort_by(|a, b| a.partial_cmp(b).unwrap());
        positions
    }

    fn random_store(n: usize, seed: u64) -> PointStore {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                Point::new([
                    rng.random_range(0.0..5.0),
                    rng.random_range(0.0..5.0),
                    rng.random_range(0.0..5.0),
                ])
            })
            .collect()
    }

    #[test]
    fn test_invalid_radius() {
        let mut store = random_store(10, 0);
        let tree = KdTree::build(&mut store);
        for radius in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                smooth(&store, &tree, radius),
                Err(FilterError::InvalidRadius(_))
            ));
            assert!(thin(&store, &tree, radius).is_err());
            assert!(estimate_normals(&mut store, &tree, radius).is_err());
        }
    }

    #[test]
    fn test_stale_tree() {
        let mut store = random_store(10, 0);
        let tree = KdTree::build(&mut store);
        store.push(Point::new([0.0; 3]));
        assert!(matches!(
            smooth(&store, &tree, 1.0),
            Err(FilterError::KdTree(KdTreeError::StaleTree { .. }))
        ));
    }

    #[test]
    fn test_smooth_single_point() -> Result<(), FilterError> {
        let mut store = PointStore::from_points(vec![Point::with_color(
            [1.0, 2.0, 3.0],
            [0.2, 0.4, 0.6],
        )]);
        let tree = KdTree::build(&mut store);
        let smoothed = smooth(&store, &tree, 1.0)?;
        assert_eq!(smoothed.points(), store.points());
        Ok(())
    }

    #[test]
    fn test_smooth_symmetric_cluster() -> Result<(), FilterError> {
        let center = [1.0, -2.0, 0.5];
        let offsets = [
            [0.1, 0.0, 0.0],
            [-0.1, 0.0, 0.0],
            [0.0, 0.1, 0.0],
            [0.0, -0.1, 0.0],
            [0.0, 0.0, 0.1],
            [0.0, 0.0, -0.1],
        ];
        let mut positions = vec![center];
        positions.extend(offsets.iter().map(|o| vector::add(&center, o)));
        let mut store = PointStore::from_positions(&positions);
        let tree = KdTree::build(&mut store);

        let smoothed = smooth(&store, &tree, 0.5)?;
        let index = (0..store.len())
            .find(|&i| store.position(i) == &center)
            .unwrap();
        let p = smoothed.position(index);
        for axis in 0..3 {
            assert_relative_eq!(p[axis], center[axis], epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_smooth_pair_moves_towards_each_other() -> Result<(), FilterError> {
        let mut store = PointStore::from_positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let tree = KdTree::build(&mut store);
        let smoothed = smooth(&store, &tree, 2.0)?;

        // self weight 1, neighbor weight exp(-1/2)
        let w = (-0.5f64).exp();
        for i in 0..2 {
            let x = store.position(i)[0];
            let other = 1.0 - x;
            let expected = (x + other * w) / (1.0 + w);
            assert_relative_eq!(smoothed.position(i)[0], expected, epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_smooth_keeps_attributes() -> Result<(), FilterError> {
        let mut store = PointStore::from_points(vec![
            Point::with_color([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            Point::with_color([0.5, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ]);
        store.set_normal(0, [0.0, 0.0, 1.0]);
        let tree = KdTree::build(&mut store);
        let smoothed = smooth(&store, &tree, 1.0)?;
        for (a, b) in store.points().iter().zip(smoothed.points()) {
            assert_eq!(a.color, b.color);
            assert_eq!(a.normal, b.normal);
        }
        Ok(())
    }

    #[test]
    fn test_thin_min_separation() -> Result<(), FilterError> {
        let radius = 0.5;
        let mut store = random_store(2000, 8);
        let tree = KdTree::build(&mut store);
        let thinned = thin(&store, &tree, radius)?;
        assert!(thinned.len() < store.len());
        assert!(!thinned.is_empty());

        let positions = thinned.positions();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                assert!(vector::distance(&positions[i], &positions[j]) > radius);
            }
        }
        Ok(())
    }

    #[test]
    fn test_thin_keeps_order_and_earlier_points() -> Result<(), FilterError> {
        let mut store = PointStore::from_positions(&[[0.0; 3], [0.1, 0.0, 0.0], [5.0, 0.0, 0.0]]);
        let tree = KdTree::build(&mut store);
        let order = store.positions();
        let thinned = thin(&store, &tree, 0.5)?;
        assert_eq!(thinned.len(), 2);

        // the first of the close pair in store order survives
        let first_close = order
            .iter()
            .find(|p| p[0] < 1.0)
            .copied()
            .unwrap();
        let expected = order
            .iter()
            .filter(|p| p[0] > 1.0 || **p == first_close)
            .copied()
            .collect::<Vec<_>>();
        assert_eq!(thinned.positions(), expected);
        Ok(())
    }

    #[test]
    fn test_thin_idempotent() -> Result<(), FilterError> {
        let radius = 0.4;
        let mut store = random_store(3000, 9);
        let tree = KdTree::build(&mut store);
        let mut once = thin(&store, &tree, radius)?;

        let tree = KdTree::build(&mut once);
        let twice = thin(&once, &tree, radius)?;
        assert_eq!(sorted_positions(&twice), sorted_positions(&once));
        Ok(())
    }

    #[test]
    fn test_thin_in_place() -> Result<(), FilterError> {
        let mut store = random_store(500, 10);
        let tree = KdTree::build(&mut store);
        let expected = thin(&store, &tree, 0.6)?;

        let removed = thin_in_place(&mut store, &tree, 0.6)?;
        assert_eq!(removed, 500 - expected.len());
        assert_eq!(store.positions(), expected.positions());
        assert!(!tree.is_valid_for(&store));
        Ok(())
    }

    #[test]
    fn test_estimate_normals_plane() -> Result<(), FilterError> {
        // a tilted grid on the plane z = x
        let mut positions = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                let x = i as f64 * 0.1;
                positions.push([x, j as f64 * 0.1, x]);
            }
        }
        let mut store = PointStore::from_positions(&positions);
        let tree = KdTree::build(&mut store);
        let failed = estimate_normals(&mut store, &tree, 0.25)?;
        assert_eq!(failed, 0);
        assert!(tree.is_valid_for(&store));

        let expected = vector::normalize(&[1.0, 0.0, -1.0]);
        for p in store.points() {
            let cos = vector::dot(&p.normal, &expected).abs();
            assert_relative_eq!(cos, 1.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_estimate_normals_isolated_points() -> Result<(), FilterError> {
        let mut store = PointStore::from_positions(&[[0.0; 3], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
        let tree = KdTree::build(&mut store);
        let failed = estimate_normals(&mut store, &tree, 1.0)?;
        assert_eq!(failed, 3);
        assert!(store.points().iter().all(|p| !p.has_normal()));
        Ok(())
    }

    #[test]
    fn test_estimate_normals_collinear() -> Result<(), FilterError> {
        let positions = (0..10)
            .map(|i| [i as f64 * 0.1, 0.0, 0.0])
            .collect::<Vec<_>>();
        let mut store = PointStore::from_positions(&positions);
        let tree = KdTree::build(&mut store);
        assert_eq!(estimate_normals(&mut store, &tree, 0.5)?, 10);
        Ok(())
    }

    #[test]
    fn test_estimate_normals_grid_faces() -> Result<(), FilterError> {
        let mut store = grid_cloud(10, 1.0);
        let tree = KdTree::build(&mut store);
        estimate_normals(&mut store, &tree, 0.15)?;

        // interior points of the z = 0 face have an axis aligned normal
        for p in store.points() {
            let [x, y, z] = p.position;
            if z == 0.0 && x > 0.15 && x < 0.85 && y > 0.15 && y < 0.85 {
                assert_relative_eq!(p.normal[2].abs(), 1.0, epsilon = 1e-9);
            }
        }
        Ok(())
    }
}
