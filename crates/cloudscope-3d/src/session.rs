//! A point cloud editing session with one level of undo.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::filters::{self, FilterError};
use crate::io::{self, LoaderError, PointLoader};
use crate::kdtree::{KdTree, KdTreeError};
use crate::plane::{self, FittedPlane, PlaneError};
use crate::point::PointStore;

/// Default parameters of a session.
///
/// Missing fields take their default value when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Neighborhood radius used for smoothing.
    pub smooth_radius: f64,
    /// Minimum spacing kept by thinning.
    pub thin_radius: f64,
    /// Neighborhood radius used for normal estimation.
    pub normal_radius: f64,
    /// Lattice steps per edge of the generated cube.
    pub grid_resolution: usize,
    /// Edge length of the generated cube.
    pub grid_size: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            smooth_radius: 0.1,
            thin_radius: 0.05,
            normal_radius: 0.1,
            grid_resolution: 20,
            grid_size: 1.0,
        }
    }
}

/// Error types for the session module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Loading a point file failed.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// A neighborhood filter failed.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A spatial query failed.
    #[error(transparent)]
    KdTree(#[from] KdTreeError),

    /// Plane fitting failed.
    #[error(transparent)]
    Plane(#[from] PlaneError),
}

/// Owns the current point cloud, the snapshot taken before the last filter and
/// the spatial index over the current cloud.
///
/// The index is built on first use and rebuilt whenever the current cloud has
/// changed since, which may reorder the points. Indices returned by queries
/// refer to the order of [`Session::current`] right after the query.
#[derive(Debug, Default)]
pub struct Session {
    current: PointStore,
    previous: Option<PointStore>,
    tree: Option<KdTree>,
    config: SessionConfig,
}

impl Session {
    /// Create a session with an empty cloud.
    pub fn new(config: SessionConfig) -> Self {
        Self::from_store(PointStore::new(), config)
    }

    /// Create a session editing `store`.
    pub fn from_store(store: PointStore, config: SessionConfig) -> Self {
        Self {
            current: store,
            previous: None,
            tree: None,
            config,
        }
    }

    /// The session parameters.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The cloud being edited.
    pub fn current(&self) -> &PointStore {
        &self.current
    }

    /// The snapshot restored by [`Session::swap`], if any.
    pub fn previous(&self) -> Option<&PointStore> {
        self.previous.as_ref()
    }

    /// Load points through `loader`.
    ///
    /// With `append` the loaded points are added after the current ones,
    /// otherwise they replace the current cloud and the undo snapshot is
    /// dropped. On error the session is left unchanged.
    ///
    /// # Returns
    ///
    /// The number of points read.
    pub fn load<L: PointLoader + ?Sized>(
        &mut self,
        loader: &L,
        path: &Path,
        append: bool,
    ) -> Result<usize, SessionError> {
        let loaded = loader.load(path).inspect_err(|e| {
            log::warn!("failed to load {}: {}", path.display(), e);
        })?;
        let count = loaded.len();

        if append {
            self.current.append(&loaded);
        } else {
            self.current = loaded;
            self.previous = None;
        }
        self.tree = None;

        log::info!(
            "loaded {} points from {}, {} in session",
            count,
            path.display(),
            self.current.len()
        );
        Ok(count)
    }

    /// Replace the current cloud with a generated cube lattice.
    ///
    /// See [`io::grid_cloud`]. Returns the number of points generated.
    pub fn load_grid(&mut self, resolution: usize, size: f64) -> usize {
        self.current = io::grid_cloud(resolution, size);
        self.previous = None;
        self.tree = None;
        log::info!(
            "generated cube lattice with {} points (resolution {}, size {})",
            self.current.len(),
            resolution,
            size
        );
        self.current.len()
    }

    /// Get a tree valid for the current cloud, building it when needed.
    pub fn ensure_tree(&mut self) -> &KdTree {
        self.indexed().0
    }

    fn indexed(&mut self) -> (&KdTree, &mut PointStore) {
        let Self { current, tree, .. } = self;
        let tree = match tree.take() {
            Some(t) if t.is_valid_for(current) => tree.insert(t),
            _ => tree.insert(KdTree::build(current)),
        };
        (&*tree, current)
    }

    /// Find the points inside the box `[min, max]`, see [`KdTree::range_query`].
    pub fn range_query(&mut self, min: &[f64; 3], max: &[f64; 3]) -> Result<Vec<usize>, SessionError> {
        let (tree, store) = self.indexed();
        Ok(tree.range_query(store, min, max)?)
    }

    /// Find the points within `radius` of `center`, see [`KdTree::sphere_query`].
    pub fn sphere_query(&mut self, center: &[f64; 3], radius: f64) -> Result<Vec<usize>, SessionError> {
        let (tree, store) = self.indexed();
        Ok(tree.sphere_query(store, center, radius)?)
    }

    /// Find the point closest to `query`.
    pub fn nearest_neighbor(&mut self, query: &[f64; 3]) -> Result<Option<usize>, SessionError> {
        let (tree, store) = self.indexed();
        Ok(tree.nearest_neighbor(store, query)?)
    }

    /// Find the `k` points closest to `query` with their distances.
    pub fn k_nearest(&mut self, query: &[f64; 3], k: usize) -> Result<Vec<(usize, f64)>, SessionError> {
        let (tree, store) = self.indexed();
        Ok(tree.k_nearest(store, query, k)?)
    }

    /// Smooth the current cloud, keeping the unsmoothed cloud as snapshot.
    pub fn smooth(&mut self, radius: f64) -> Result<(), SessionError> {
        let (tree, store) = self.indexed();
        let smoothed = filters::smooth(store, tree, radius)?;
        log::info!("smoothed {} points with radius {}", smoothed.len(), radius);
        self.replace(smoothed);
        Ok(())
    }

    /// Thin the current cloud, keeping the unthinned cloud as snapshot.
    ///
    /// # Returns
    ///
    /// The number of points removed.
    pub fn thin(&mut self, radius: f64) -> Result<usize, SessionError> {
        let (tree, store) = self.indexed();
        let before = store.len();
        let thinned = filters::thin(store, tree, radius)?;
        let removed = before - thinned.len();
        log::info!(
            "thinning with radius {} removed {} of {} points",
            radius,
            removed,
            before
        );
        self.replace(thinned);
        Ok(removed)
    }

    /// Estimate the normals of the current cloud in place.
    ///
    /// # Returns
    ///
    /// The number of points left without a normal.
    pub fn estimate_normals(&mut self, radius: f64) -> Result<usize, SessionError> {
        let (tree, store) = self.indexed();
        let failed = filters::estimate_normals(store, tree, radius)?;
        log::info!("estimated normals for {} points", store.len() - failed);
        Ok(failed)
    }

    /// Fit a plane to the current cloud.
    ///
    /// With `colorize` every point is colored by its signed distance to the
    /// plane, see [`plane::color_by_plane_distance`].
    pub fn best_fit_plane(&mut self, colorize: bool) -> Result<FittedPlane, SessionError> {
        let fitted = plane::best_fit_plane(&self.current.positions())?;
        if colorize {
            let max_distance = plane::color_by_plane_distance(&mut self.current, &fitted);
            log::info!("colored points by plane distance, max {}", max_distance);
        }
        Ok(fitted)
    }

    /// Exchange the current cloud and the snapshot.
    ///
    /// Calling it twice restores the original state. Returns `false` and does
    /// nothing when there is no snapshot.
    pub fn swap(&mut self) -> bool {
        match self.previous.as_mut() {
            Some(previous) => {
                std::mem::swap(&mut self.current, previous);
                self.tree = None;
                log::info!("swapped to snapshot with {} points", self.current.len());
                true
            }
            None => false,
        }
    }

    /// Restore the snapshot taken before the last filter.
    ///
    /// Same as [`Session::swap`]; a second call redoes the filter.
    pub fn undo(&mut self) -> bool {
        self.swap()
    }

    fn replace(&mut self, store: PointStore) {
        self.previous = Some(std::mem::replace(&mut self.current, store));
        self.tree = None;
    }
}
