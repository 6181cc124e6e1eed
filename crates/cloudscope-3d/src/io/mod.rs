/// Synthetic point cloud generators.
pub mod grid;

/// Whitespace separated ASCII point files.
pub mod xyz;

pub use grid::grid_cloud;
pub use xyz::{parse_xyz, read_xyz_ascii, write_xyz_ascii, AsciiXyzLoader};

use std::path::Path;

use crate::point::PointStore;

/// Error types for the io module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoaderError {
    /// Failed to read or write a point file
    #[error("Failed to access point file")]
    Io(#[from] std::io::Error),
}

/// A source of point clouds.
pub trait PointLoader {
    /// Load all points stored at `path`.
    fn load(&self, path: &Path) -> Result<PointStore, LoaderError>;
}
