//! Waypoint generation strategies.
//!
//! Two independent reducers turn a keyframe path into waypoints:
//! - [`SpatialGridReducer`]: best-scoring keyframe per occupied grid cell
//! - [`ArclengthResampler`]: evenly spaced points along the path
//!
//! A run uses exactly one of them; [`WaypointSet`] holds whichever ran.

pub mod arclength;
pub mod grid;

use nalgebra::Vector3;
use serde::Serialize;

pub use arclength::{
    cumulative_arclength, uniform_indices, ArclengthResampler, ArclengthResampling,
    ArclengthWaypoint, PathSample, ResampleMode,
};
pub use grid::{
    CellIndex, GridCandidate, GridReduction, GridWaypoint, PositionMode, SelectionMethod,
    SpatialGridReducer, WaypointStatistics,
};

/// Waypoints produced by one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum WaypointSet {
    Grid(GridReduction),
    Resample(ArclengthResampling),
}

impl WaypointSet {
    pub fn len(&self) -> usize {
        match self {
            WaypointSet::Grid(g) => g.waypoints.len(),
            WaypointSet::Resample(r) => r.waypoints.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reported positions, in output order, to be matched back to keyframes.
    pub fn target_positions(&self) -> Vec<Vector3<f64>> {
        match self {
            WaypointSet::Grid(g) => g.waypoints.iter().map(|w| w.position).collect(),
            WaypointSet::Resample(r) => r.waypoints.iter().map(|w| w.position).collect(),
        }
    }
}
