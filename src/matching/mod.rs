//! NearestMatcher - Map waypoint positions back to source keyframes.
//!
//! Each target is compared against every keyframe position (linear scan);
//! the closest keyframe is accepted when it lies within the distance
//! threshold. Accepted ids form the retain set handed to the pruner.

use std::collections::BTreeSet;

use nalgebra::Vector3;
use serde::Serialize;

use crate::atlas::KeyFrameId;
use crate::config::MatchConfig;
use crate::error::{ConfigWarning, Result, WaypointError};

/// Nearest keyframe for one target, whether or not it was accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub target_index: usize,
    pub target: Vector3<f64>,
    /// None only when no distance could be computed (non-finite input).
    pub nearest_id: Option<KeyFrameId>,
    pub distance: f64,
    pub accepted: bool,
}

/// Aggregate result of matching a batch of targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub outcomes: Vec<MatchOutcome>,
    /// Accepted keyframe ids, deduplicated and ascending.
    pub selected_keyframes: BTreeSet<KeyFrameId>,
    pub matched: usize,
    pub total: usize,
    /// matched / total, 0 when there are no targets.
    pub rate: f64,
}

/// Linear-scan nearest-neighbour matcher with a distance threshold.
#[derive(Debug, Clone)]
pub struct NearestMatcher {
    config: MatchConfig,
}

impl NearestMatcher {
    pub fn new(config: MatchConfig) -> Self {
        let matcher = Self { config };
        if let Some(warning) = matcher.threshold_warning() {
            tracing::warn!("{}", warning);
        }
        matcher
    }

    pub fn threshold(&self) -> f64 {
        self.config.distance_threshold
    }

    pub fn threshold_warning(&self) -> Option<ConfigWarning> {
        let t = self.config.distance_threshold;
        (t <= 0.0).then_some(ConfigWarning::NonPositiveThreshold(t))
    }

    /// Closest keyframe to `target`; the first one wins on equal distance.
    pub fn nearest(
        target: &Vector3<f64>,
        keyframes: &[(KeyFrameId, Vector3<f64>)],
    ) -> Option<(KeyFrameId, f64)> {
        let mut best: Option<(KeyFrameId, f64)> = None;
        let mut min_dist = f64::INFINITY;
        for (id, position) in keyframes {
            let dist = (target - position).norm();
            if dist < min_dist {
                min_dist = dist;
                best = Some((*id, dist));
            }
        }
        best
    }

    /// Match every target against the keyframe positions.
    pub fn match_targets(
        &self,
        targets: &[Vector3<f64>],
        keyframes: &[(KeyFrameId, Vector3<f64>)],
    ) -> Result<MatchReport> {
        if keyframes.is_empty() {
            return Err(WaypointError::MissingData(
                "no keyframes to match against".into(),
            ));
        }

        let threshold = self.config.distance_threshold;
        let mut selected_keyframes = BTreeSet::new();
        let mut outcomes = Vec::with_capacity(targets.len());

        for (target_index, target) in targets.iter().enumerate() {
            let nearest = Self::nearest(target, keyframes);
            let (nearest_id, distance) = match nearest {
                Some((id, dist)) => (Some(id), dist),
                None => (None, f64::INFINITY),
            };
            let accepted = nearest_id.is_some() && distance <= threshold;

            match (accepted, nearest_id) {
                (true, Some(id)) => {
                    selected_keyframes.insert(id);
                    tracing::debug!(
                        "Waypoint {}: matched {} (distance {:.4}m)",
                        target_index + 1,
                        id,
                        distance
                    );
                }
                _ => tracing::debug!(
                    "Waypoint {}: no match (closest {:?}, distance {:.4}m)",
                    target_index + 1,
                    nearest_id,
                    distance
                ),
            }

            outcomes.push(MatchOutcome {
                target_index,
                target: *target,
                nearest_id,
                distance,
                accepted,
            });
        }

        let matched = outcomes.iter().filter(|o| o.accepted).count();
        let total = outcomes.len();
        let rate = if total == 0 {
            0.0
        } else {
            matched as f64 / total as f64
        };

        tracing::info!(
            "Matched {}/{} waypoints ({:.1}%) → {} unique keyframes",
            matched,
            total,
            rate * 100.0,
            selected_keyframes.len()
        );

        Ok(MatchReport {
            outcomes,
            selected_keyframes,
            matched,
            total,
            rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyframes_on_x_axis() -> Vec<(KeyFrameId, Vector3<f64>)> {
        (1..=4)
            .map(|i| (KeyFrameId::new(i), Vector3::new((i - 1) as f64, 0.0, 0.0)))
            .collect()
    }

    fn matcher(distance_threshold: f64) -> NearestMatcher {
        NearestMatcher::new(MatchConfig { distance_threshold })
    }

    #[test]
    fn test_match_within_threshold() {
        let report = matcher(0.1)
            .match_targets(&[Vector3::new(1.05, 0.0, 0.0)], &keyframes_on_x_axis())
            .unwrap();

        assert_eq!(report.matched, 1);
        assert!(report.outcomes[0].accepted);
        assert_eq!(report.outcomes[0].nearest_id, Some(KeyFrameId::new(2)));
        assert!((report.outcomes[0].distance - 0.05).abs() < 1e-9);
        assert!(report.selected_keyframes.contains(&KeyFrameId::new(2)));
    }

    #[test]
    fn test_rejected_target_still_reports_nearest() {
        let report = matcher(0.1)
            .match_targets(&[Vector3::new(1.5, 0.5, 0.0)], &keyframes_on_x_axis())
            .unwrap();

        let outcome = &report.outcomes[0];
        assert!(!outcome.accepted);
        assert!(outcome.nearest_id.is_some());
        assert!(report.selected_keyframes.is_empty());
        assert_eq!(report.rate, 0.0);
    }

    #[test]
    fn test_ties_pick_first_keyframe() {
        let kfs = keyframes_on_x_axis();
        let (id, dist) = NearestMatcher::nearest(&Vector3::new(0.5, 0.0, 0.0), &kfs).unwrap();
        assert_eq!(id, KeyFrameId::new(1));
        assert!((dist - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_duplicates_collapse_and_rate() {
        let targets = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.01, 0.0, 0.0),
            Vector3::new(3.0, 0.0, 0.0),
            Vector3::new(10.0, 0.0, 0.0),
        ];
        let report = matcher(0.1)
            .match_targets(&targets, &keyframes_on_x_axis())
            .unwrap();

        assert_eq!(report.matched, 3);
        assert_eq!(report.total, 4);
        assert!((report.rate - 0.75).abs() < 1e-12);
        let ids: Vec<u32> = report.selected_keyframes.iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn test_no_targets() {
        let report = matcher(0.1).match_targets(&[], &keyframes_on_x_axis()).unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.rate, 0.0);
    }

    #[test]
    fn test_empty_keyframes_is_missing_data() {
        assert!(matches!(
            matcher(0.1).match_targets(&[Vector3::zeros()], &[]),
            Err(WaypointError::MissingData(_))
        ));
    }

    #[test]
    fn test_non_positive_threshold_warns() {
        let m = matcher(0.0);
        assert_eq!(
            m.threshold_warning(),
            Some(ConfigWarning::NonPositiveThreshold(0.0))
        );
        // Exact hits still match at zero threshold.
        let report = m
            .match_targets(&[Vector3::new(2.0, 0.0, 0.0)], &keyframes_on_x_axis())
            .unwrap();
        assert_eq!(report.matched, 1);
    }
}
