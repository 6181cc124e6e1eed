//! Least squares plane fitting.
//!
//! The plane minimizing the summed squared perpendicular distance to a set of
//! points passes through their mean, and its normal is the eigenvector of the
//! smallest eigenvalue of the covariance matrix.

use cloudscope_linalg::{eigen, symmetric::Symmetric3x3, vector};

use crate::colormap;
use crate::point::PointStore;

/// Error types for the plane module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlaneError {
    /// At least three points are needed to fit a plane.
    #[error("At least three points are needed to fit a plane, got {0}")]
    TooFewPoints(usize),

    /// The points are collinear or coincident and do not span a plane.
    #[error("The points do not span a plane")]
    Degenerate,
}

/// Mean and covariance of the points, failing when they do not span a plane.
fn plane_covariance(points: &[[f64; 3]]) -> Result<([f64; 3], Symmetric3x3), PlaneError> {
    if points.len() < 3 {
        return Err(PlaneError::TooFewPoints(points.len()));
    }
    let mean = vector::mean(points).ok_or(PlaneError::TooFewPoints(0))?;
    let covariance = Symmetric3x3::covariance(points, &mean);
    if covariance.max_diagonal_cofactor() <= 0.0 {
        return Err(PlaneError::Degenerate);
    }
    Ok((mean, covariance))
}

/// Fit a plane to a set of points and return its unit normal.
///
/// # Arguments
///
/// * `points` - The points to fit, at least three.
///
/// # Returns
///
/// The unit normal of the best fitting plane, with arbitrary orientation. The
/// zero vector when fewer than three points are given or when the points are
/// collinear; callers must treat it as a failure.
///
/// Example:
/// ```
/// use cloudscope_3d::plane::fit_normal;
///
/// let normal = fit_normal(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
/// assert_eq!(normal[2].abs(), 1.0);
///
/// assert_eq!(fit_normal(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]), [0.0; 3]);
/// ```
pub fn fit_normal(points: &[[f64; 3]]) -> [f64; 3] {
    match plane_covariance(points) {
        Ok((_, covariance)) => vector::normalize(&eigen::symmetric_eigen(&covariance).smallest()),
        Err(_) => [0.0; 3],
    }
}

/// A plane fitted to a point cloud, bounded by the cloud's footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedPlane {
    /// Mean of the points, a point on the plane.
    pub center: [f64; 3],
    /// Unit normal of the plane.
    pub normal: [f64; 3],
    /// Unit in-plane axes: the directions of largest and second largest
    /// variance.
    pub axes: [[f64; 3]; 2],
    /// Corners of the rectangle spanned by `axes` that bounds the projection
    /// of every point onto the plane, in winding order.
    pub corners: [[f64; 3]; 4],
}

impl FittedPlane {
    /// Signed perpendicular distance of `point` to the plane, positive on the
    /// side the normal points to.
    pub fn signed_distance(&self, point: &[f64; 3]) -> f64 {
        vector::dot(&vector::sub(point, &self.center), &self.normal)
    }

    /// Side lengths of the bounding rectangle along `axes[0]` and `axes[1]`.
    pub fn extent(&self) -> [f64; 2] {
        [
            vector::distance(&self.corners[0], &self.corners[1]),
            vector::distance(&self.corners[1], &self.corners[2]),
        ]
    }
}

/// Fit a plane to a whole point cloud.
///
/// # Arguments
///
/// * `points` - The points to fit.
///
/// # Returns
///
/// The fitted plane through the mean of the points. Its corners are
/// `center + e0 * axes[0] + e1 * axes[1]` where `e0` and `e1` take the
/// extreme projections of the points on each axis.
pub fn best_fit_plane(points: &[[f64; 3]]) -> Result<FittedPlane, PlaneError> {
    let (center, covariance) = plane_covariance(points).inspect_err(|e| {
        log::warn!("cannot fit a plane to {} points: {}", points.len(), e);
    })?;

    let eig = eigen::symmetric_eigen(&covariance);
    let normal = vector::normalize(&eig.vectors[0]);
    let ev0 = eig.vectors[2];
    let ev1 = eig.vectors[1];

    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for p in points {
        let r = vector::sub(p, &center);
        for (axis, ev) in [ev0, ev1].iter().enumerate() {
            let d = vector::dot(&r, ev);
            min[axis] = min[axis].min(d);
            max[axis] = max[axis].max(d);
        }
    }

    let corner = |e0: f64, e1: f64| {
        vector::add(
            &center,
            &vector::add(&vector::scale(&ev0, e0), &vector::scale(&ev1, e1)),
        )
    };

    let plane = FittedPlane {
        center,
        normal,
        axes: [ev0, ev1],
        corners: [
            corner(min[0], min[1]),
            corner(max[0], min[1]),
            corner(max[0], max[1]),
            corner(min[0], max[1]),
        ],
    };

    log::debug!(
        "fitted plane to {} points: center {:?}, normal {:?}",
        points.len(),
        plane.center,
        plane.normal
    );

    Ok(plane)
}

/// Color every point by its signed distance to `plane`.
///
/// Distances are normalized over the cloud to `[0, 1]` and mapped through
/// [`colormap::gradient_hsv`], blue below the plane and red above. When all
/// points lie on the plane they are colored with the middle of the ramp.
///
/// # Returns
///
/// The largest absolute distance of a point to the plane.
pub fn color_by_plane_distance(store: &mut PointStore, plane: &FittedPlane) -> f64 {
    let distances = store
        .points()
        .iter()
        .map(|p| plane.signed_distance(&p.position))
        .collect::<Vec<_>>();

    let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    for (i, d) in distances.iter().enumerate() {
        let t = if range > 0.0 { (d - min) / range } else { 0.5 };
        store.set_color(i, colormap::gradient_hsv(t));
    }

    min.abs().max(max.abs())
}
