//! SpatialGridReducer - One best keyframe per occupied 3D grid cell.
//!
//! The bounding box of all scored keyframes is divided into cubic cells of
//! `grid_size` meters, anchored at the minimum corner. Within each occupied
//! cell the candidates are ranked by the configured selection rule and the
//! top one becomes the cell's waypoint.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::atlas::KeyFrameId;
use crate::config::GridConfig;
use crate::error::{Result, WaypointError};
use crate::scoring::{ScoreRecord, ScoredKeyFrame};

/// Integer cell coordinate (x, y, z).
pub type CellIndex = [i64; 3];

/// Rule used to rank candidates inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Direction,
    Quality,
    /// 0.6 · direction + 0.4 · quality
    #[default]
    Balanced,
    Final,
}

impl SelectionMethod {
    /// Selection score of one keyframe under this rule.
    pub fn score(self, scores: &ScoreRecord) -> f64 {
        match self {
            SelectionMethod::Direction => scores.direction,
            SelectionMethod::Quality => scores.quality,
            SelectionMethod::Balanced => 0.6 * scores.direction + 0.4 * scores.quality,
            SelectionMethod::Final => scores.final_score,
        }
    }
}

impl std::str::FromStr for SelectionMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "direction" => Ok(SelectionMethod::Direction),
            "quality" => Ok(SelectionMethod::Quality),
            "balanced" => Ok(SelectionMethod::Balanced),
            "final" => Ok(SelectionMethod::Final),
            other => Err(format!(
                "unknown selection method '{}' (expected balanced|quality|direction|final)",
                other
            )),
        }
    }
}

/// Which position a grid waypoint reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// The chosen keyframe's own position.
    #[default]
    Keyframe,
    /// Geometric center of the cell.
    GridCenter,
}

impl std::str::FromStr for PositionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "keyframe" => Ok(PositionMode::Keyframe),
            "grid_center" | "grid-center" => Ok(PositionMode::GridCenter),
            other => Err(format!(
                "unknown position mode '{}' (expected keyframe|grid_center)",
                other
            )),
        }
    }
}

/// One ranked member of a cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCandidate {
    pub keyframe_id: KeyFrameId,
    pub position: Vector3<f64>,
    pub scores: ScoreRecord,
    pub selection_score: f64,
}

/// The waypoint chosen for one occupied cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridWaypoint {
    pub cell: CellIndex,
    pub keyframe_id: KeyFrameId,
    /// Reported position, per the configured [`PositionMode`].
    pub position: Vector3<f64>,
    pub keyframe_position: Vector3<f64>,
    pub scores: ScoreRecord,
    pub selection_score: f64,
    pub num_candidates: usize,
    /// All candidates of the cell, best first.
    pub candidates: Vec<GridCandidate>,
}

/// Spacing and score summary of the chosen waypoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaypointStatistics {
    pub num_waypoints: usize,
    /// Distances between consecutive reported positions.
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub avg_direction_score: f64,
    pub avg_quality_score: f64,
    pub avg_final_score: f64,
}

impl WaypointStatistics {
    pub fn compute(waypoints: &[GridWaypoint]) -> Self {
        if waypoints.is_empty() {
            return Self::default();
        }

        let distances: Vec<f64> = waypoints
            .windows(2)
            .map(|w| (w[1].position - w[0].position).norm())
            .collect();
        let n = waypoints.len() as f64;
        let mean_of = |f: fn(&ScoreRecord) -> f64| {
            waypoints.iter().map(|w| f(&w.scores)).sum::<f64>() / n
        };

        let (avg_distance, min_distance, max_distance) = if distances.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                distances.iter().sum::<f64>() / distances.len() as f64,
                distances.iter().copied().fold(f64::INFINITY, f64::min),
                distances.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        Self {
            num_waypoints: waypoints.len(),
            avg_distance,
            min_distance,
            max_distance,
            avg_direction_score: mean_of(|s| s.direction),
            avg_quality_score: mean_of(|s| s.quality),
            avg_final_score: mean_of(|s| s.final_score),
        }
    }
}

/// Result of a grid reduction pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridReduction {
    pub grid_size: f64,
    pub selection_method: SelectionMethod,
    pub position_mode: PositionMode,
    pub min_corner: Vector3<f64>,
    pub max_corner: Vector3<f64>,
    /// Sorted ascending by chosen keyframe id.
    pub waypoints: Vec<GridWaypoint>,
    pub statistics: WaypointStatistics,
}

impl GridReduction {
    pub fn num_cells(&self) -> usize {
        self.waypoints.len()
    }
}

/// Bins scored keyframes into a 3D grid.
#[derive(Debug, Clone)]
pub struct SpatialGridReducer {
    config: GridConfig,
}

impl SpatialGridReducer {
    /// Create a reducer, rejecting a non-positive or non-finite grid size.
    pub fn new(config: GridConfig) -> Result<Self> {
        if !(config.grid_size > 0.0 && config.grid_size.is_finite()) {
            return Err(WaypointError::InvalidConfig(format!(
                "grid_size must be positive, got {}",
                config.grid_size
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Cell containing `position` for a grid anchored at `min_corner`.
    pub fn cell_of(&self, position: &Vector3<f64>, min_corner: &Vector3<f64>) -> CellIndex {
        let g = self.config.grid_size;
        let rel = position - min_corner;
        [
            (rel.x / g).floor() as i64,
            (rel.y / g).floor() as i64,
            (rel.z / g).floor() as i64,
        ]
    }

    /// Geometric center of a cell.
    pub fn cell_center(&self, cell: &CellIndex, min_corner: &Vector3<f64>) -> Vector3<f64> {
        let g = self.config.grid_size;
        Vector3::new(
            (cell[0] as f64 + 0.5) * g,
            (cell[1] as f64 + 0.5) * g,
            (cell[2] as f64 + 0.5) * g,
        ) + min_corner
    }

    /// Reduce the scored keyframes to one waypoint per occupied cell.
    ///
    /// Ties inside a cell go to the candidate that appears first in `scored`.
    pub fn reduce(&self, scored: &[ScoredKeyFrame]) -> Result<GridReduction> {
        if scored.is_empty() {
            return Err(WaypointError::MissingData(
                "no scored keyframes to reduce".into(),
            ));
        }

        let (min_corner, max_corner) = bounding_box(scored.iter().map(|kf| &kf.position));

        // Members keep input order inside each cell.
        let mut cells: BTreeMap<CellIndex, Vec<&ScoredKeyFrame>> = BTreeMap::new();
        for kf in scored {
            cells
                .entry(self.cell_of(&kf.position, &min_corner))
                .or_default()
                .push(kf);
        }

        let method = self.config.selection_method;
        let mut waypoints: Vec<GridWaypoint> = cells
            .into_iter()
            .filter_map(|(cell, members)| {
                let mut candidates: Vec<GridCandidate> = members
                    .iter()
                    .map(|kf| GridCandidate {
                        keyframe_id: kf.id,
                        position: kf.position,
                        scores: kf.scores,
                        selection_score: method.score(&kf.scores),
                    })
                    .collect();
                // Stable: equal scores keep input order.
                candidates.sort_by(|a, b| b.selection_score.total_cmp(&a.selection_score));

                let best = candidates.first()?.clone();
                let position = match self.config.position_mode {
                    PositionMode::Keyframe => best.position,
                    PositionMode::GridCenter => self.cell_center(&cell, &min_corner),
                };

                Some(GridWaypoint {
                    cell,
                    keyframe_id: best.keyframe_id,
                    position,
                    keyframe_position: best.position,
                    scores: best.scores,
                    selection_score: best.selection_score,
                    num_candidates: candidates.len(),
                    candidates,
                })
            })
            .collect();

        waypoints.sort_by_key(|w| w.keyframe_id);
        let statistics = WaypointStatistics::compute(&waypoints);

        tracing::info!(
            "Grid reduction: {} keyframes → {} waypoints (grid {:.2}m, {:?})",
            scored.len(),
            waypoints.len(),
            self.config.grid_size,
            method
        );

        Ok(GridReduction {
            grid_size: self.config.grid_size,
            selection_method: method,
            position_mode: self.config.position_mode,
            min_corner,
            max_corner,
            waypoints,
            statistics,
        })
    }
}

fn bounding_box<'a, I>(positions: I) -> (Vector3<f64>, Vector3<f64>)
where
    I: IntoIterator<Item = &'a Vector3<f64>>,
{
    positions.into_iter().fold(
        (
            Vector3::repeat(f64::INFINITY),
            Vector3::repeat(f64::NEG_INFINITY),
        ),
        |(lo, hi), p| (lo.inf(p), hi.sup(p)),
    )
}
