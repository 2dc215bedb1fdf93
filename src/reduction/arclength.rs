//! ArclengthResampler - Uniform resampling of an ordered keyframe path.
//!
//! The path is treated as a polyline through the keyframe positions. In
//! arclength mode `m` targets are spread evenly over its total length and
//! each is placed by linear interpolation inside its bracketing segment.
//! Orientation is not interpolated: a waypoint takes the orientation of the
//! nearer segment endpoint.
//!
//! A path with (almost) zero length, and index mode, both pick evenly spaced
//! keyframes instead.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::atlas::KeyFrameId;
use crate::config::ResampleConfig;
use crate::error::{Result, WaypointError};

/// Total path length below which arclength sampling degenerates.
pub const MIN_PATH_LENGTH: f64 = 1e-9;

/// Segment length treated as zero when interpolating.
pub const MIN_SEGMENT_LENGTH: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMode {
    /// Evenly spaced keyframes by index.
    Index,
    /// Evenly spaced points along the path length.
    #[default]
    Arclength,
}

impl std::str::FromStr for ResampleMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "index" => Ok(ResampleMode::Index),
            "arclength" => Ok(ResampleMode::Arclength),
            other => Err(format!("unknown resample mode '{}' (expected index|arclength)", other)),
        }
    }
}

/// One vertex of the input path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    pub id: KeyFrameId,
    pub position: Vector3<f64>,
    /// Missing orientations are treated as identity.
    pub orientation: Option<UnitQuaternion<f64>>,
}

impl PathSample {
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation.unwrap_or_else(UnitQuaternion::identity)
    }
}

/// A resampled waypoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArclengthWaypoint {
    /// 1-based sequence number along the path.
    pub id: usize,
    pub target_arclength: f64,
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// Index into the input path used for attribution (segment start).
    pub source_index: usize,
    pub source_keyframe_id: KeyFrameId,
}

/// Result of a resampling pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArclengthResampling {
    pub mode: ResampleMode,
    pub requested: usize,
    pub total_length: f64,
    /// True when the uniform-index sampler was used for a zero-length path.
    pub degenerate: bool,
    pub waypoints: Vec<ArclengthWaypoint>,
}

/// Resamples an ordered path into a fixed number of waypoints.
#[derive(Debug, Clone)]
pub struct ArclengthResampler {
    config: ResampleConfig,
}

impl ArclengthResampler {
    /// Create a resampler, rejecting a zero waypoint count.
    pub fn new(config: ResampleConfig) -> Result<Self> {
        if config.num_waypoints == 0 {
            return Err(WaypointError::InvalidConfig(
                "num_waypoints must be at least 1".into(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }

    pub fn resample(&self, path: &[PathSample]) -> Result<ArclengthResampling> {
        if path.is_empty() {
            return Err(WaypointError::MissingData("empty keyframe path".into()));
        }

        let positions: Vec<Vector3<f64>> = path.iter().map(|s| s.position).collect();
        let s = cumulative_arclength(&positions);
        let total_length = s.last().copied().unwrap_or(0.0);
        let m = self.config.num_waypoints;

        let (waypoints, degenerate) = match self.config.mode {
            ResampleMode::Index => (sample_by_index(path, &s, m), false),
            ResampleMode::Arclength if total_length < MIN_PATH_LENGTH => {
                tracing::debug!(
                    "Path length {:.3e} is degenerate, falling back to index sampling",
                    total_length
                );
                (sample_by_index(path, &s, m), true)
            }
            ResampleMode::Arclength => (sample_by_arclength(path, &s, m), false),
        };

        tracing::info!(
            "Resampled {} keyframes ({:.2}m) → {} waypoints ({:?})",
            path.len(),
            total_length,
            waypoints.len(),
            self.config.mode
        );

        Ok(ArclengthResampling {
            mode: self.config.mode,
            requested: m,
            total_length,
            degenerate,
            waypoints,
        })
    }
}

/// Cumulative path length at each vertex; starts at 0.
pub fn cumulative_arclength(positions: &[Vector3<f64>]) -> Vec<f64> {
    let mut s = Vec::with_capacity(positions.len());
    let mut acc = 0.0;
    for (i, p) in positions.iter().enumerate() {
        if i > 0 {
            acc += (p - positions[i - 1]).norm();
        }
        s.push(acc);
    }
    s
}

/// `min(m, n)` evenly spaced indices on `[0, n − 1]`.
///
/// Rounded half-to-even, deduplicated and ascending.
pub fn uniform_indices(n: usize, m: usize) -> Vec<usize> {
    if n == 0 || m == 0 {
        return Vec::new();
    }
    let count = m.min(n);
    let mut indices: Vec<usize> = linspace(0.0, (n - 1) as f64, count)
        .into_iter()
        .map(|x| x.round_ties_even() as usize)
        .collect();
    indices.dedup();
    indices
}

/// `count` evenly spaced values on `[start, stop]`, endpoint exact.
fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|k| {
                    if k == count - 1 {
                        stop
                    } else {
                        start + step * k as f64
                    }
                })
                .collect()
        }
    }
}

fn sample_by_index(path: &[PathSample], s: &[f64], m: usize) -> Vec<ArclengthWaypoint> {
    uniform_indices(path.len(), m)
        .into_iter()
        .enumerate()
        .map(|(k, i)| ArclengthWaypoint {
            id: k + 1,
            target_arclength: s[i],
            position: path[i].position,
            orientation: path[i].orientation(),
            source_index: i,
            source_keyframe_id: path[i].id,
        })
        .collect()
}

/// Requires at least two vertices and a positive total length.
fn sample_by_arclength(path: &[PathSample], s: &[f64], m: usize) -> Vec<ArclengthWaypoint> {
    let n = path.len();
    let total = s[n - 1];

    linspace(0.0, total, m)
        .into_iter()
        .enumerate()
        .map(|(k, t)| {
            // Last vertex with s[j] <= t, clamped to a valid segment start.
            let j = s
                .partition_point(|&v| v <= t)
                .saturating_sub(1)
                .min(n - 2);
            let (s0, s1) = (s[j], s[j + 1]);
            let alpha = if s1 - s0 < MIN_SEGMENT_LENGTH {
                0.0
            } else {
                (t - s0) / (s1 - s0)
            };

            let start = &path[j];
            let end = &path[j + 1];
            let nearer = if alpha < 0.5 { start } else { end };

            ArclengthWaypoint {
                id: k + 1,
                target_arclength: t,
                position: start.position * (1.0 - alpha) + end.position * alpha,
                orientation: nearer.orientation(),
                source_index: j,
                source_keyframe_id: start.id,
            }
        })
        .collect()
}
