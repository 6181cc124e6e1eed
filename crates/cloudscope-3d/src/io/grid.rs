use crate::point::{Point, PointStore};

/// Generate the points of a wireframe cube lattice.
///
/// Samples the six faces of the cube `[0, size]^3` on a regular lattice with
/// `resolution` steps per edge. Points on shared edges are emitted once, for
/// a total of `2(r+1)^2 + 2(r+1)(r-1) + 2(r-1)^2` points.
///
/// # Arguments
///
/// * `resolution` - Number of lattice steps per cube edge.
/// * `size` - Edge length of the cube.
///
/// # Returns
///
/// The lattice points, empty when `resolution` is zero.
///
/// Example:
/// ```
/// use cloudscope_3d::io::grid_cloud;
///
/// let cube = grid_cloud(1, 2.0);
/// assert_eq!(cube.len(), 8);
/// ```
pub fn grid_cloud(resolution: usize, size: f64) -> PointStore {
    if resolution == 0 {
        return PointStore::new();
    }

    let r = resolution;
    let step = size / r as f64;
    let mut points = Vec::with_capacity(2 * (r + 1) * (r + 1) + 2 * (r + 1) * (r - 1) + 2 * (r - 1) * (r - 1));

    // bottom and top faces, including all edges
    for i in 0..=r {
        for j in 0..=r {
            let (a, b) = (i as f64 * step, j as f64 * step);
            points.push(Point::new([a, b, 0.0]));
            points.push(Point::new([a, b, size]));
        }
    }
    // faces at x = 0 and x = size, without the top and bottom rows
    for i in 0..=r {
        for j in 1..r {
            let (a, b) = (i as f64 * step, j as f64 * step);
            points.push(Point::new([0.0, a, b]));
            points.push(Point::new([size, a, b]));
        }
    }
    // faces at y = 0 and y = size, interior only
    for i in 1..r {
        for j in 1..r {
            let (a, b) = (i as f64 * step, j as f64 * step);
            points.push(Point::new([a, 0.0, b]));
            points.push(Point::new([a, size, b]));
        }
    }

    PointStore::from_points(points)
}
