#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Color ramps for per-point attributes.
pub mod colormap;

/// Neighborhood filters: smoothing, thinning and normal estimation.
pub mod filters;

/// I/O utilities for reading, writing and generating point clouds.
pub mod io;

/// Balanced kd-tree over a point store.
pub mod kdtree;

/// Plane fitting.
pub mod plane;

/// Points and point stores.
pub mod point;

/// Editing sessions with undo.
pub mod session;
