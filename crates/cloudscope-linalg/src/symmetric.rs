use crate::vector;

/// A symmetric 3x3 matrix, storing only the upper triangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Symmetric3x3 {
    /// Element at row 0, column 0.
    pub m_00: f64,
    /// Element at row 0, column 1, equal to `m_10`.
    pub m_01: f64,
    /// Element at row 0, column 2, equal to `m_20`.
    pub m_02: f64,
    /// Element at row 1, column 1.
    pub m_11: f64,
    /// Element at row 1, column 2, equal to `m_21`.
    pub m_12: f64,
    /// Element at row 2, column 2.
    pub m_22: f64,
}

impl Symmetric3x3 {
    /// Create a symmetric matrix from its upper triangle.
    pub fn new(m_00: f64, m_01: f64, m_02: f64, m_11: f64, m_12: f64, m_22: f64) -> Self {
        Self {
            m_00,
            m_01,
            m_02,
            m_11,
            m_12,
            m_22,
        }
    }

    /// Create a diagonal matrix.
    pub fn from_diagonal(d: [f64; 3]) -> Self {
        Self::new(d[0], 0.0, 0.0, d[1], 0.0, d[2])
    }

    /// Expand into a full row-major 3x3 array.
    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.m_00, self.m_01, self.m_02],
            [self.m_01, self.m_11, self.m_12],
            [self.m_02, self.m_12, self.m_22],
        ]
    }

    /// Build from a full 3x3 array, reading only the upper triangle.
    pub fn from_array(m: &[[f64; 3]; 3]) -> Self {
        Self::new(m[0][0], m[0][1], m[0][2], m[1][1], m[1][2], m[2][2])
    }

    /// The covariance matrix `C[i][j] = 1/n * sum((p[i] - mean[i]) * (p[j] - mean[j]))`.
    ///
    /// # Arguments
    ///
    /// * `points` - The sample points.
    /// * `mean` - The mean of `points`, see [`vector::mean`].
    ///
    /// Returns the zero matrix for an empty set.
    pub fn covariance(points: &[[f64; 3]], mean: &[f64; 3]) -> Self {
        if points.is_empty() {
            return Self::default();
        }

        let mut c = Self::default();
        for p in points {
            let r = vector::sub(p, mean);
            c.m_00 += r[0] * r[0];
            c.m_01 += r[0] * r[1];
            c.m_02 += r[0] * r[2];
            c.m_11 += r[1] * r[1];
            c.m_12 += r[1] * r[2];
            c.m_22 += r[2] * r[2];
        }

        let inv_n = 1.0 / points.len() as f64;
        c.m_00 *= inv_n;
        c.m_01 *= inv_n;
        c.m_02 *= inv_n;
        c.m_11 *= inv_n;
        c.m_12 *= inv_n;
        c.m_22 *= inv_n;
        c
    }

    /// The three 2x2 cofactor determinants along the diagonal.
    ///
    /// Entry `i` is the determinant of the minor obtained by deleting row and
    /// column `i`. For a covariance matrix all three are non-positive exactly
    /// when the samples are collinear or coincident.
    pub fn diagonal_cofactors(&self) -> [f64; 3] {
        [
            self.m_11 * self.m_22 - self.m_12 * self.m_12,
            self.m_00 * self.m_22 - self.m_02 * self.m_02,
            self.m_00 * self.m_11 - self.m_01 * self.m_01,
        ]
    }

    /// Largest of [`Self::diagonal_cofactors`].
    pub fn max_diagonal_cofactor(&self) -> f64 {
        let [a, b, c] = self.diagonal_cofactors();
        a.max(b).max(c)
    }

    /// Multiply the matrix with a vector.
    pub fn mul_vec(&self, v: &[f64; 3]) -> [f64; 3] {
        let m = self.to_array();
        [
            vector::dot(&m[0], v),
            vector::dot(&m[1], v),
            vector::dot(&m[2], v),
        ]
    }

    /// Sum of the diagonal elements.
    pub fn trace(&self) -> f64 {
        self.m_00 + self.m_11 + self.m_22
    }
}
