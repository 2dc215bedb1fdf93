//! ScoringEngine - Multi-criterion keyframe scoring.
//!
//! Each keyframe receives three partial scores and a weighted final score:
//! 1. Position: Gaussian falloff from a reference point (spatial novelty)
//! 2. Direction: alignment of the optical axis with the direction of travel
//! 3. Quality: min–max normalized sharpness (or landmark count)
//!
//! Scores are pure functions of the input batch; nothing is carried between
//! runs.

use nalgebra::Vector3;
use serde::Serialize;

use crate::atlas::KeyFrameId;
use crate::config::{ScoringConfig, WEIGHT_SUM_TOLERANCE};
use crate::error::{ConfigWarning, Result, WaypointError};
use crate::geometry::WorldPose;

use super::direction::sequential_direction_scores;
use super::position::{position_scores, validate_sigma};
use super::quality::quality_scores;

/// One keyframe's input to the scoring pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub id: KeyFrameId,
    pub pose: WorldPose,
    /// Raw quality measurement before normalization.
    pub raw_quality: f64,
}

/// Partial and combined scores for one keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub position: f64,
    pub direction: f64,
    pub quality: f64,
    #[serde(rename = "final")]
    pub final_score: f64,
}

/// A keyframe together with its scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredKeyFrame {
    pub id: KeyFrameId,
    pub position: Vector3<f64>,
    pub forward: Vector3<f64>,
    pub raw_quality: f64,
    pub scores: ScoreRecord,
}

/// Mean/min/max of one score over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl ScoreSummary {
    fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            mean: sum / count as f64,
            min,
            max,
        }
    }
}

/// Aggregate view of a scored batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreStatistics {
    pub count: usize,
    pub position: ScoreSummary,
    pub direction: ScoreSummary,
    pub quality: ScoreSummary,
    #[serde(rename = "final")]
    pub final_score: ScoreSummary,
    /// Highest final scores first; ties keep input order.
    pub top: Vec<(KeyFrameId, ScoreRecord)>,
}

/// Computes ScoreRecords for an ordered batch of keyframes.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    /// Create an engine, rejecting a non-positive sigma.
    ///
    /// A weight sum far from 1.0 is only warned about.
    pub fn new(config: ScoringConfig) -> Result<Self> {
        validate_sigma(config.sigma)?;
        let engine = Self { config };
        if let Some(warning) = engine.weight_warning() {
            tracing::warn!("{}", warning);
        }
        Ok(engine)
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Warning raised when alpha + beta + gamma is not close to 1.0.
    pub fn weight_warning(&self) -> Option<ConfigWarning> {
        let sum = self.config.weight_sum();
        ((sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE).then_some(ConfigWarning::WeightSum(sum))
    }

    /// Weighted combination of the partial scores. No renormalization.
    pub fn combine(&self, position: f64, direction: f64, quality: f64) -> ScoreRecord {
        let c = &self.config;
        ScoreRecord {
            position,
            direction,
            quality,
            final_score: c.alpha * position + c.beta * direction + c.gamma * quality,
        }
    }

    /// Score an ordered batch (ascending id).
    ///
    /// The position reference is the configured point, or the first sample's
    /// position when none is configured.
    pub fn score_batch(&self, samples: &[PoseSample]) -> Result<Vec<ScoredKeyFrame>> {
        let first = samples
            .first()
            .ok_or_else(|| WaypointError::MissingData("no keyframes to score".into()))?;

        let reference = self
            .config
            .reference
            .map(Vector3::from)
            .unwrap_or(first.pose.position);

        let positions: Vec<Vector3<f64>> = samples.iter().map(|s| s.pose.position).collect();
        let position = position_scores(&positions, &reference, self.config.sigma)?;
        let direction = sequential_direction_scores(
            samples.iter().map(|s| (&s.pose.position, &s.pose.forward)),
        );
        let raw: Vec<f64> = samples.iter().map(|s| s.raw_quality).collect();
        let quality = quality_scores(&raw);

        let scored: Vec<ScoredKeyFrame> = samples
            .iter()
            .enumerate()
            .map(|(i, s)| ScoredKeyFrame {
                id: s.id,
                position: s.pose.position,
                forward: s.pose.forward,
                raw_quality: s.raw_quality,
                scores: self.combine(position[i], direction[i], quality[i]),
            })
            .collect();

        tracing::debug!(
            "Scored {} keyframes against reference ({:.3}, {:.3}, {:.3})",
            scored.len(),
            reference.x,
            reference.y,
            reference.z
        );

        Ok(scored)
    }

    /// Summaries of each score and the top-N keyframes by final score.
    pub fn statistics(&self, scored: &[ScoredKeyFrame]) -> ScoreStatistics {
        let mut ranked: Vec<(KeyFrameId, ScoreRecord)> =
            scored.iter().map(|kf| (kf.id, kf.scores)).collect();
        ranked.sort_by(|a, b| b.1.final_score.total_cmp(&a.1.final_score));
        ranked.truncate(self.config.top_n);

        ScoreStatistics {
            count: scored.len(),
            position: ScoreSummary::from_values(scored.iter().map(|kf| kf.scores.position)),
            direction: ScoreSummary::from_values(scored.iter().map(|kf| kf.scores.direction)),
            quality: ScoreSummary::from_values(scored.iter().map(|kf| kf.scores.quality)),
            final_score: ScoreSummary::from_values(scored.iter().map(|kf| kf.scores.final_score)),
            top: ranked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(id: u32, position: Vector3<f64>, raw_quality: f64) -> PoseSample {
        PoseSample {
            id: KeyFrameId::new(id),
            pose: WorldPose {
                position,
                forward: Vector3::x(),
            },
            raw_quality,
        }
    }

    fn line_samples() -> Vec<PoseSample> {
        (0..5)
            .map(|i| sample(i, Vector3::new(i as f64, 0.0, 0.0), 10.0 * i as f64))
            .collect()
    }

    #[test]
    fn test_final_score_hand_computation() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let record = engine.combine(0.8, 0.6, 0.5);
        assert_relative_eq!(record.final_score, 0.72, epsilon = 1e-12);
    }

    #[test]
    fn test_batch_scores_line() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let scored = engine.score_batch(&line_samples()).unwrap();

        assert_eq!(scored.len(), 5);
        let expected = [1.0, 0.882, 0.607, 0.325, 0.135];
        for (kf, want) in scored.iter().zip(expected) {
            assert_relative_eq!(kf.scores.position, want, epsilon = 1e-3);
        }

        // Looking along +X while travelling along +X.
        assert!(scored.iter().all(|kf| (kf.scores.direction - 1.0).abs() < 1e-12));

        assert_eq!(scored[0].scores.quality, 0.0);
        assert_eq!(scored[4].scores.quality, 1.0);
    }

    #[test]
    fn test_fixed_reference() {
        let config = ScoringConfig {
            reference: Some([4.0, 0.0, 0.0]),
            ..ScoringConfig::default()
        };
        let engine = ScoringEngine::new(config).unwrap();
        let scored = engine.score_batch(&line_samples()).unwrap();

        assert_eq!(scored[4].scores.position, 1.0);
        assert_relative_eq!(scored[0].scores.position, 0.135, epsilon = 1e-3);
    }

    #[test]
    fn test_empty_batch_is_missing_data() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        assert!(matches!(
            engine.score_batch(&[]),
            Err(WaypointError::MissingData(_))
        ));
    }

    #[test]
    fn test_invalid_sigma_rejected() {
        let config = ScoringConfig {
            sigma: 0.0,
            ..ScoringConfig::default()
        };
        assert!(matches!(
            ScoringEngine::new(config),
            Err(WaypointError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_weight_warning_still_computes() {
        let config = ScoringConfig {
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
            ..ScoringConfig::default()
        };
        let engine = ScoringEngine::new(config).unwrap();
        assert_eq!(engine.weight_warning(), Some(ConfigWarning::WeightSum(3.0)));

        let record = engine.combine(1.0, 1.0, 1.0);
        assert_relative_eq!(record.final_score, 3.0);
    }

    #[test]
    fn test_statistics_top_n() {
        let config = ScoringConfig {
            top_n: 2,
            ..ScoringConfig::default()
        };
        let engine = ScoringEngine::new(config).unwrap();
        let scored = engine.score_batch(&line_samples()).unwrap();
        let stats = engine.statistics(&scored);

        assert_eq!(stats.count, 5);
        assert_eq!(stats.top.len(), 2);
        assert!(stats.top[0].1.final_score >= stats.top[1].1.final_score);
        assert_eq!(stats.position.max, 1.0);
        assert_eq!(stats.quality.min, 0.0);
        assert_eq!(stats.quality.max, 1.0);
        assert_relative_eq!(stats.direction.mean, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_final_score_serializes_as_final() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let json = serde_json::to_value(engine.combine(1.0, 0.5, 0.0)).unwrap();
        assert!(json.get("final").is_some());
        assert!(json.get("final_score").is_none());
    }
}
