use std::sync::atomic::{AtomicU64, Ordering};

/// Default color of a point, white.
pub const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// A single point of a cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// The position of the point.
    pub position: [f64; 3],
    /// The normal of the point. The zero vector means undefined.
    pub normal: [f64; 3],
    /// RGB color with channels in `[0, 1]`.
    pub color: [f32; 3],
    /// Whether the point was flagged for removal.
    pub removed: bool,
}

impl Point {
    /// Create a white point without a normal.
    pub fn new(position: [f64; 3]) -> Self {
        Self {
            position,
            normal: [0.0; 3],
            color: DEFAULT_COLOR,
            removed: false,
        }
    }

    /// Create a point with the given color.
    pub fn with_color(position: [f64; 3], color: [f32; 3]) -> Self {
        Self {
            color,
            ..Self::new(position)
        }
    }

    /// Whether the point carries a defined (non-zero) normal.
    #[inline]
    pub fn has_normal(&self) -> bool {
        self.normal != [0.0; 3]
    }
}

impl From<[f64; 3]> for Point {
    fn from(position: [f64; 3]) -> Self {
        Self::new(position)
    }
}

/// Hand out a generation value never seen before in this process.
fn next_generation() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// An owned, ordered sequence of points.
///
/// The store keeps a generation value that changes on every operation that
/// may reorder or resize the sequence. Generations are unique per process, so
/// two independently created stores never share one. A [`crate::kdtree::KdTree`] remembers
/// the generation it was built against and refuses to answer queries once the
/// store has moved on. Attribute setters ([`PointStore::set_normal`],
/// [`PointStore::set_color`], [`PointStore::set_removed`]) keep the generation.
#[derive(Debug, Clone)]
pub struct PointStore {
    points: Vec<Point>,
    generation: u64,
}

impl PointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_points(Vec::new())
    }

    /// Create a store from a vector of points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            points,
            generation: next_generation(),
        }
    }

    /// Create a store of white points from positions.
    pub fn from_positions(positions: &[[f64; 3]]) -> Self {
        Self::from_points(positions.iter().copied().map(Point::new).collect())
    }

    /// Get the number of points in the store.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the store is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The current generation of the store.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Get as reference the points in the store.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Get the point at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    /// Get the position of the point at `index`.
    ///
    /// PRECONDITION: `index < self.len()`.
    #[inline]
    pub fn position(&self, index: usize) -> &[f64; 3] {
        &self.points[index].position
    }

    /// Collect the positions of all points.
    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Collect the positions of the points at `indices`.
    pub fn positions_at(&self, indices: &[usize]) -> Vec<[f64; 3]> {
        indices.iter().map(|&i| self.points[i].position).collect()
    }

    /// Mutable access to the points.
    ///
    /// The caller may reorder the points, so this invalidates any tree built
    /// over the store.
    pub fn as_mut_slice(&mut self) -> &mut [Point] {
        self.bump();
        &mut self.points
    }

    /// Append a point.
    pub fn push(&mut self, point: Point) {
        self.bump();
        self.points.push(point);
    }

    /// Append all points of another store, keeping their order.
    pub fn append(&mut self, other: &PointStore) {
        self.bump();
        self.points.extend_from_slice(&other.points);
    }

    /// Remove all points.
    pub fn clear(&mut self) {
        self.bump();
        self.points.clear();
    }

    /// Set the normal of the point at `index`.
    pub fn set_normal(&mut self, index: usize, normal: [f64; 3]) {
        self.points[index].normal = normal;
    }

    /// Set the color of the point at `index`.
    pub fn set_color(&mut self, index: usize, color: [f32; 3]) {
        self.points[index].color = color;
    }

    /// Set the removed flag of the point at `index`.
    pub fn set_removed(&mut self, index: usize, removed: bool) {
        self.points[index].removed = removed;
    }

    /// Drop every point flagged as removed, keeping the relative order of the
    /// others. Returns the number of points dropped.
    pub fn compact(&mut self) -> usize {
        let before = self.points.len();
        self.points.retain(|p| !p.removed);
        let dropped = before - self.points.len();
        if dropped > 0 {
            self.bump();
        }
        dropped
    }

    /// Axis-aligned bounds `(min, max)` of the positions, `None` when empty.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = self.points.first()?.position;
        Some(self.points.iter().fold((first, first), |(mut lo, mut hi), p| {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(p.position[axis]);
                hi[axis] = hi[axis].max(p.position[axis]);
            }
            (lo, hi)
        }))
    }

    /// Mean position of the points, `None` when empty.
    pub fn center_of_gravity(&self) -> Option<[f64; 3]> {
        cloudscope_linalg::vector::mean(&self.positions())
    }

    fn bump(&mut self) {
        self.generation = next_generation();
    }
}

impl Default for PointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Point> for PointStore {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}

impl From<Vec<Point>> for PointStore {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}
