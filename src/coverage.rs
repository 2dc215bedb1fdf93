//! CoverageAnalyzer - How far each retained keyframe "sees".
//!
//! For every keyframe, the distances from its camera center to the landmarks
//! it observes give an observation radius profile. Large gaps between the
//! radii of neighbouring waypoints hint at areas the reduced map covers
//! poorly.

use serde::Serialize;

use crate::atlas::{KeyFrameId, Map};

/// Observation radius statistics of one keyframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRadius {
    pub keyframe_id: KeyFrameId,
    pub camera_position: nalgebra::Vector3<f64>,
    /// Observed landmarks found in the landmark table.
    pub num_observations: usize,
    pub avg_radius: f64,
    pub p90_radius: f64,
    pub min_radius: f64,
    pub max_radius: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub keyframes: Vec<ObservationRadius>,
    /// Keyframes with no resolvable observation.
    pub skipped: Vec<KeyFrameId>,
}

impl CoverageReport {
    /// Mean of the per-keyframe average radii.
    pub fn mean_avg_radius(&self) -> Option<f64> {
        if self.keyframes.is_empty() {
            return None;
        }
        let sum: f64 = self.keyframes.iter().map(|k| k.avg_radius).sum();
        Some(sum / self.keyframes.len() as f64)
    }
}

pub struct CoverageAnalyzer;

impl CoverageAnalyzer {
    /// Analyze the given keyframes; ids missing from the map are skipped.
    pub fn analyze<I>(map: &Map, keyframe_ids: I) -> CoverageReport
    where
        I: IntoIterator<Item = KeyFrameId>,
    {
        let mut report = CoverageReport::default();

        for id in keyframe_ids {
            let Some(kf) = map.get_keyframe(id) else {
                report.skipped.push(id);
                continue;
            };
            let center = kf.camera_center();

            let mut distances: Vec<f64> = kf
                .landmark_ids
                .iter()
                .filter_map(|lm_id| map.get_landmark(*lm_id))
                .map(|lm| lm.distance_to(&center))
                .collect();
            if distances.is_empty() {
                report.skipped.push(id);
                continue;
            }
            distances.sort_by(f64::total_cmp);

            let n = distances.len();
            report.keyframes.push(ObservationRadius {
                keyframe_id: id,
                camera_position: center,
                num_observations: n,
                avg_radius: distances.iter().sum::<f64>() / n as f64,
                p90_radius: percentile(&distances, 90.0).unwrap_or(0.0),
                min_radius: distances[0],
                max_radius: distances[n - 1],
            });
        }

        if !report.skipped.is_empty() {
            tracing::debug!(
                "Coverage: {} keyframes without resolvable observations",
                report.skipped.len()
            );
        }
        report
    }
}

/// Percentile of ascending-sorted values with linear interpolation.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (q.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
