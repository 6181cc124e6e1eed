//! Eigen-decomposition of symmetric 3x3 matrices with the cyclic Jacobi method.
//!
//! Each sweep applies one plane rotation per off-diagonal pair `(0, 1)`,
//! `(0, 2)`, `(1, 2)`, zeroing that element. The accumulated rotations form the
//! eigenvector basis. For 3x3 matrices the method converges quadratically and a
//! handful of sweeps reach machine precision.

use crate::symmetric::Symmetric3x3;

const MAX_SWEEPS: usize = 32;

/// Eigenvalues and eigenvectors of a symmetric 3x3 matrix.
///
/// Eigenvalues are sorted in ascending order and `vectors[i]` is the unit
/// eigenvector paired with `values[i]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricEigen {
    /// Eigenvalues in ascending order.
    pub values: [f64; 3],
    /// Unit eigenvectors, `vectors[i]` belongs to `values[i]`.
    pub vectors: [[f64; 3]; 3],
}

impl SymmetricEigen {
    /// Eigenvector of the smallest eigenvalue.
    #[inline]
    pub fn smallest(&self) -> [f64; 3] {
        self.vectors[0]
    }

    /// Eigenvector of the largest eigenvalue.
    #[inline]
    pub fn largest(&self) -> [f64; 3] {
        self.vectors[2]
    }
}

/// Compute the eigen-decomposition of a symmetric 3x3 matrix.
///
/// # Arguments
///
/// * `m` - The symmetric matrix to decompose.
///
/// # Returns
///
/// The eigenvalues in ascending order and their unit eigenvectors. The
/// eigenvectors form an orthonormal basis, also for repeated eigenvalues.
///
/// Example:
///
/// ```
/// use cloudscope_linalg::eigen::symmetric_eigen;
/// use cloudscope_linalg::symmetric::Symmetric3x3;
///
/// let m = Symmetric3x3::from_diagonal([3.0, 1.0, 2.0]);
/// let eig = symmetric_eigen(&m);
/// assert_eq!(eig.values, [1.0, 2.0, 3.0]);
/// assert_eq!(eig.smallest(), [0.0, 1.0, 0.0]);
/// ```
pub fn symmetric_eigen(m: &Symmetric3x3) -> SymmetricEigen {
    let mut a = m.to_array();
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .map(|x| x * x)
        .sum::<f64>();

    for _ in 0..MAX_SWEEPS {
        let off_diag_sq = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
        if off_diag_sq <= f64::EPSILON * f64::EPSILON * scale {
            break;
        }
        for (p, q) in [(0, 1), (0, 2), (1, 2)] {
            jacobi_rotate(&mut a, &mut v, p, q);
        }
    }

    // columns of v are the eigenvectors
    let mut pairs = [
        (a[0][0], [v[0][0], v[1][0], v[2][0]]),
        (a[1][1], [v[0][1], v[1][1], v[2][1]]),
        (a[2][2], [v[0][2], v[1][2], v[2][2]]),
    ];
    pairs.sort_by(|x, y| x.0.total_cmp(&y.0));

    SymmetricEigen {
        values: [pairs[0].0, pairs[1].0, pairs[2].0],
        vectors: [pairs[0].1, pairs[1].1, pairs[2].1],
    }
}

/// Apply the rotation that zeroes `a[p][q]`: `a <- Jᵀ a J`, `v <- v J`.
fn jacobi_rotate(a: &mut [[f64; 3]; 3], v: &mut [[f64; 3]; 3], p: usize, q: usize) {
    let apq = a[p][q];
    if apq == 0.0 {
        return;
    }

    let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
    // smaller root of t^2 + 2 theta t - 1 = 0 keeps the rotation angle below pi/4
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    for row in a.iter_mut() {
        let (akp, akq) = (row[p], row[q]);
        row[p] = c * akp - s * akq;
        row[q] = s * akp + c * akq;
    }
    for k in 0..3 {
        let (apk, aqk) = (a[p][k], a[q][k]);
        a[p][k] = c * apk - s * aqk;
        a[q][k] = s * apk + c * aqk;
    }
    // the rotation zeroes the pair analytically, remove the rounding residue
    a[p][q] = 0.0;
    a[q][p] = 0.0;

    for row in v.iter_mut() {
        let (vkp, vkq) = (row[p], row[q]);
        row[p] = c * vkp - s * vkq;
        row[q] = s * vkp + c * vkq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const EPS: f64 = 1e-9;

    fn verify_decomposition(m: &Symmetric3x3, eig: &SymmetricEigen) {
        for i in 0..3 {
            // A v = lambda v
            let av = m.mul_vec(&eig.vectors[i]);
            let lv = vector::scale(&eig.vectors[i], eig.values[i]);
            for k in 0..3 {
                assert_relative_eq!(av[k], lv[k], epsilon = EPS);
            }
            assert_relative_eq!(vector::norm(&eig.vectors[i]), 1.0, epsilon = EPS);
            for j in (i + 1)..3 {
                assert_relative_eq!(
                    vector::dot(&eig.vectors[i], &eig.vectors[j]),
                    0.0,
                    epsilon = EPS
                );
            }
        }
        assert!(eig.values[0] <= eig.values[1]);
        assert!(eig.values[1] <= eig.values[2]);
    }

    #[test]
    fn test_eigen_diagonal_sorted() {
        let m = Symmetric3x3::from_diagonal([2.0, 3.0, 1.0]);
        let eig = symmetric_eigen(&m);
        assert_eq!(eig.values, [1.0, 2.0, 3.0]);
        assert_eq!(eig.smallest(), [0.0, 0.0, 1.0]);
        assert_eq!(eig.largest(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_eigen_zero() {
        let eig = symmetric_eigen(&Symmetric3x3::default());
        assert_eq!(eig.values, [0.0; 3]);
        verify_decomposition(&Symmetric3x3::default(), &eig);
    }

    #[test]
    fn test_eigen_known_values() {
        // eigenvalues of [[2, 1, 0], [1, 2, 0], [0, 0, 5]] are 1, 3, 5
        let m = Symmetric3x3::new(2.0, 1.0, 0.0, 2.0, 0.0, 5.0);
        let eig = symmetric_eigen(&m);
        assert_relative_eq!(eig.values[0], 1.0, epsilon = EPS);
        assert_relative_eq!(eig.values[1], 3.0, epsilon = EPS);
        assert_relative_eq!(eig.values[2], 5.0, epsilon = EPS);
        let v0 = eig.smallest();
        assert_relative_eq!(v0[0].abs(), std::f64::consts::FRAC_1_SQRT_2, epsilon = EPS);
        assert_relative_eq!(v0[0], -v0[1], epsilon = EPS);
        verify_decomposition(&m, &eig);
    }

    #[test]
    fn test_eigen_rank1() {
        // outer product of (1, 2, 3)
        let m = Symmetric3x3::new(1.0, 2.0, 3.0, 4.0, 6.0, 9.0);
        let eig = symmetric_eigen(&m);
        assert_relative_eq!(eig.values[0], 0.0, epsilon = EPS);
        assert_relative_eq!(eig.values[1], 0.0, epsilon = EPS);
        assert_relative_eq!(eig.values[2], 14.0, epsilon = EPS);
        verify_decomposition(&m, &eig);
    }

    #[test]
    fn test_eigen_random_covariances() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let points = (0..16)
                .map(|_| {
                    [
                        rng.random_range(-5.0..5.0),
                        rng.random_range(-5.0..5.0),
                        rng.random_range(-5.0..5.0),
                    ]
                })
                .collect::<Vec<[f64; 3]>>();
            let mean = vector::mean(&points).unwrap();
            let m = Symmetric3x3::covariance(&points, &mean);
            let eig = symmetric_eigen(&m);
            verify_decomposition(&m, &eig);
            assert_relative_eq!(
                eig.values.iter().sum::<f64>(),
                m.trace(),
                epsilon = 1e-9
            );
        }
    }
}
