/// Component-wise sum of two vectors.
#[inline]
pub fn add(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Component-wise difference `a - b`.
#[inline]
pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Multiply a vector by a scalar.
#[inline]
pub fn scale(a: &[f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Dot product of two vectors.
#[inline]
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product `a x b`.
#[inline]
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Euclidean norm of a vector.
#[inline]
pub fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Squared Euclidean distance between two points.
#[inline]
pub fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let d = sub(a, b);
    dot(&d, &d)
}

/// Euclidean distance between two points.
///
/// Example:
/// ```
/// use cloudscope_linalg::vector::distance;
///
/// let d = distance(&[1.0, 2.0, 3.0], &[4.0, 6.0, 3.0]);
/// assert_eq!(d, 5.0);
/// ```
#[inline]
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    distance_squared(a, b).sqrt()
}

/// Normalize a vector to unit length.
///
/// Returns the zero vector when the input has no length, so callers can
/// keep using the zero vector as a failure marker.
pub fn normalize(a: &[f64; 3]) -> [f64; 3] {
    let n = norm(a);
    if n <= f64::EPSILON {
        return [0.0; 3];
    }
    scale(a, 1.0 / n)
}

/// Arithmetic mean of a set of points, or `None` for an empty set.
pub fn mean(points: &[[f64; 3]]) -> Option<[f64; 3]> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold([0.0; 3], |acc, p| add(&acc, p));
    Some(scale(&sum, 1.0 / points.len() as f64))
}
