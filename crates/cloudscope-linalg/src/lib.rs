#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Eigen-decomposition of symmetric 3x3 matrices.
pub mod eigen;

/// Symmetric 3x3 matrices and point covariance.
pub mod symmetric;

/// Helpers for 3d vectors stored as `[f64; 3]`.
pub mod vector;
