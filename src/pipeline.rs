//! Pipeline - One complete reduction pass over a loaded map.
//!
//! 1. Recover world poses and raw quality per keyframe
//! 2. Score the keyframes
//! 3. Generate waypoints (grid or resampling)
//! 4. Match waypoints back to keyframes → retain set
//! 5. Prune the map to the retain set
//! 6. Summarize observation coverage of the retained keyframes
//!
//! Configuration errors are checked before any work is done.

use serde::Serialize;
use tracing::{info, warn};

use crate::atlas::{KeyFrameId, Map};
use crate::config::{PipelineConfig, Strategy};
use crate::coverage::{CoverageAnalyzer, CoverageReport};
use crate::error::{MalformedRecord, Result, WaypointError};
use crate::matching::{MatchReport, NearestMatcher};
use crate::pruning::{GraphPruner, PruneReport};
use crate::reduction::{ArclengthResampler, PathSample, SpatialGridReducer, WaypointSet};
use crate::scoring::{PoseSample, ScoreStatistics, ScoredKeyFrame, ScoringEngine, SharpnessTable};

/// Counts surfaced to the caller after a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub keyframes_in: usize,
    /// Records dropped while loading the map.
    pub load_skipped: usize,
    /// Keyframes dropped by the pipeline itself.
    pub malformed_skipped: usize,
    pub keyframes_scored: usize,
    pub waypoints_generated: usize,
    pub matched: usize,
    pub total_targets: usize,
    pub keyframes_retained: usize,
    pub landmarks_retained: usize,
    pub config_warnings: Vec<String>,
}

impl RunSummary {
    pub fn with_load_skipped(mut self, skipped: usize) -> Self {
        self.load_skipped = skipped;
        self
    }

    pub fn total_skipped(&self) -> usize {
        self.load_skipped + self.malformed_skipped
    }
}

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub scores: Vec<ScoredKeyFrame>,
    pub score_statistics: ScoreStatistics,
    pub waypoints: WaypointSet,
    pub matching: MatchReport,
    pub pruned_map: Map,
    pub prune: PruneReport,
    /// None when the pruned map has no landmarks.
    pub coverage: Option<CoverageReport>,
    pub malformed: Vec<MalformedRecord>,
    pub summary: RunSummary,
}

enum Reducer {
    Grid(SpatialGridReducer),
    Resample(ArclengthResampler),
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one pass.
    ///
    /// Raw quality is the keyframe's sharpness when a table is given, otherwise
    /// its feature slot count (unassociated slots included).
    pub fn run(&self, map: &Map, sharpness: Option<&SharpnessTable>) -> Result<PipelineOutput> {
        if map.num_keyframes() == 0 {
            return Err(WaypointError::MissingData("map has no keyframes".into()));
        }

        let engine = ScoringEngine::new(self.config.scoring.clone())?;
        let reducer = match self.config.strategy {
            Strategy::Grid => Reducer::Grid(SpatialGridReducer::new(self.config.grid.clone())?),
            Strategy::Resample => {
                Reducer::Resample(ArclengthResampler::new(self.config.resample.clone())?)
            }
        };
        let matcher = NearestMatcher::new(self.config.matching.clone());
        let pruner = GraphPruner::new(self.config.prune.clone());

        let config_warnings: Vec<String> =
            self.config.check().iter().map(|w| w.to_string()).collect();

        // 1. Pose recovery and quality lookup
        let (samples, malformed) = self.collect_samples(map, sharpness);
        for record in &malformed {
            warn!("Skipping {}", record);
        }
        if samples.is_empty() {
            return Err(WaypointError::MissingData(
                "no keyframe survived validation".into(),
            ));
        }

        // 2. Scoring
        let scores = engine.score_batch(&samples)?;
        let score_statistics = engine.statistics(&scores);
        info!(
            "Scores: final mean {:.4} (min {:.4}, max {:.4}) over {} keyframes",
            score_statistics.final_score.mean,
            score_statistics.final_score.min,
            score_statistics.final_score.max,
            score_statistics.count
        );

        // 3. Waypoints
        let waypoints = match &reducer {
            Reducer::Grid(grid) => WaypointSet::Grid(grid.reduce(&scores)?),
            Reducer::Resample(resampler) => {
                let path: Vec<PathSample> = samples
                    .iter()
                    .map(|s| PathSample {
                        id: s.id,
                        position: s.pose.position,
                        orientation: map
                            .get_keyframe(s.id)
                            .map(|kf| kf.pose_wc().rotation),
                    })
                    .collect();
                WaypointSet::Resample(resampler.resample(&path)?)
            }
        };

        // 4. Matching
        let candidates: Vec<(KeyFrameId, nalgebra::Vector3<f64>)> =
            scores.iter().map(|kf| (kf.id, kf.position)).collect();
        let matching = matcher.match_targets(&waypoints.target_positions(), &candidates)?;

        // 5. Pruning
        let (pruned_map, prune) = pruner.prune(map, &matching.selected_keyframes)?;
        let dangling = pruned_map.dangling_references();
        if !dangling.is_empty() {
            warn!("Pruned map still has {} dangling references", dangling.len());
        }

        // 6. Coverage
        let coverage = (pruned_map.num_landmarks() > 0)
            .then(|| CoverageAnalyzer::analyze(&pruned_map, pruned_map.keyframe_ids()));

        let summary = RunSummary {
            keyframes_in: map.num_keyframes(),
            load_skipped: 0,
            malformed_skipped: malformed.len(),
            keyframes_scored: scores.len(),
            waypoints_generated: waypoints.len(),
            matched: matching.matched,
            total_targets: matching.total,
            keyframes_retained: pruned_map.num_keyframes(),
            landmarks_retained: pruned_map.num_landmarks(),
            config_warnings,
        };
        info!(
            "Run complete: {} keyframes → {} waypoints → {} retained ({} skipped)",
            summary.keyframes_in,
            summary.waypoints_generated,
            summary.keyframes_retained,
            summary.malformed_skipped
        );

        Ok(PipelineOutput {
            scores,
            score_statistics,
            waypoints,
            matching,
            pruned_map,
            prune,
            coverage,
            malformed,
            summary,
        })
    }

    fn collect_samples(
        &self,
        map: &Map,
        sharpness: Option<&SharpnessTable>,
    ) -> (Vec<PoseSample>, Vec<MalformedRecord>) {
        let mut samples = Vec::with_capacity(map.num_keyframes());
        let mut malformed = Vec::new();

        for kf in map.keyframes() {
            let pose = kf.world_pose();
            if !pose.position.iter().chain(pose.forward.iter()).all(|v| v.is_finite()) {
                malformed.push(MalformedRecord::for_keyframe(kf.id, "non-finite pose"));
                continue;
            }

            let raw_quality = match sharpness {
                Some(table) => match table.get(kf.id) {
                    Some(value) => value,
                    None => {
                        malformed.push(MalformedRecord::for_keyframe(
                            kf.id,
                            "no sharpness measurement",
                        ));
                        continue;
                    }
                },
                None => kf.num_feature_slots() as f64,
            };

            samples.push(PoseSample {
                id: kf.id,
                pose,
                raw_quality,
            });
        }

        (samples, malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{KeyFrame, Landmark, LandmarkId};
    use crate::config::{GridConfig, ResampleConfig};
    use crate::geometry::SE3;
    use crate::reduction::ResampleMode;
    use nalgebra::{UnitQuaternion, Vector3};

    /// Keyframes every 0.5 m along +X, looking along +X, chained in a
    /// spanning tree. Keyframe i observes landmarks i and i + 100.
    fn corridor_map(n: u32) -> Map {
        // Camera +Z maps to world +X.
        let r_wc = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let r_cw = r_wc.inverse();

        let mut map = Map::new();
        for i in 0..n {
            let center = Vector3::new(0.5 * i as f64, 0.0, 0.0);
            let mut kf = KeyFrame::new(KeyFrameId::new(i), SE3::new(r_cw, -(r_cw * center)));
            kf.landmark_ids = vec![LandmarkId::new(i), LandmarkId::new(i + 100)];
            map.add_keyframe(kf);
            map.add_landmark(Landmark::new(LandmarkId::new(i), center + Vector3::new(0.0, 2.0, 0.0)));
            map.add_landmark(Landmark::new(
                LandmarkId::new(i + 100),
                center + Vector3::new(0.0, -2.0, 0.0),
            ));
        }
        for i in 1..n {
            map.link_parent(KeyFrameId::new(i), KeyFrameId::new(i - 1));
        }
        map
    }

    #[test]
    fn test_grid_run_is_consistent() {
        let map = corridor_map(9);
        let config = PipelineConfig {
            grid: GridConfig {
                grid_size: 1.0,
                ..GridConfig::default()
            },
            ..PipelineConfig::default()
        };
        let output = Pipeline::new(config).run(&map, None).unwrap();

        // x spans 0..4 → cells 0..4.
        assert_eq!(output.waypoints.len(), 5);
        // Keyframe-position mode: every waypoint matches exactly.
        assert_eq!(output.matching.matched, 5);
        assert_eq!(output.summary.keyframes_retained, 5);
        assert!(output.pruned_map.dangling_references().is_empty());
        assert_eq!(output.summary.landmarks_retained, 10);
        assert_eq!(output.coverage.as_ref().unwrap().keyframes.len(), 5);
        assert!(output.summary.config_warnings.is_empty());
    }

    #[test]
    fn test_resample_run() {
        let map = corridor_map(9);
        let config = PipelineConfig {
            strategy: Strategy::Resample,
            resample: ResampleConfig {
                num_waypoints: 3,
                mode: ResampleMode::Arclength,
            },
            ..PipelineConfig::default()
        };
        let output = Pipeline::new(config).run(&map, None).unwrap();

        // Targets at x = 0, 2, 4 coincide with keyframes 0, 4, 8.
        let ids: Vec<u32> = output
            .matching
            .selected_keyframes
            .iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(ids, vec![0, 4, 8]);
        // Spanning tree links between non-adjacent survivors are cut.
        assert!(output
            .pruned_map
            .keyframes()
            .all(|kf| kf.parent_id.is_none() && kf.children_ids.is_empty()));
    }

    #[test]
    fn test_sharpness_gaps_are_malformed() {
        let map = corridor_map(4);
        let sharpness: SharpnessTable = [(0, 10.0), (1, 20.0), (3, 5.0)]
            .into_iter()
            .map(|(id, v)| (KeyFrameId::new(id), v))
            .collect();

        let output = Pipeline::new(PipelineConfig::default())
            .run(&map, Some(&sharpness))
            .unwrap();

        assert_eq!(output.summary.malformed_skipped, 1);
        assert_eq!(output.malformed[0].keyframe_id, Some(KeyFrameId::new(2)));
        assert_eq!(output.summary.keyframes_scored, 3);
        assert!(output.scores.iter().all(|s| s.id != KeyFrameId::new(2)));
    }

    #[test]
    fn test_quality_fallback_counts_feature_slots() {
        let mut map = corridor_map(3);
        // Same associated landmarks everywhere; only slot counts differ.
        map.get_keyframe_mut(KeyFrameId::new(0)).unwrap().feature_slots = vec![0, 100];
        map.get_keyframe_mut(KeyFrameId::new(1)).unwrap().feature_slots = vec![1, -1, 101, -1];
        map.get_keyframe_mut(KeyFrameId::new(2)).unwrap().feature_slots = vec![-1, 2, -1, 102];

        let output = Pipeline::new(PipelineConfig::default()).run(&map, None).unwrap();

        let raw: Vec<f64> = output.scores.iter().map(|s| s.raw_quality).collect();
        assert_eq!(raw, vec![2.0, 4.0, 4.0]);
        assert_eq!(output.scores[0].scores.quality, 0.0);
        assert_eq!(output.scores[1].scores.quality, 1.0);
    }

    #[test]
    fn test_empty_map_is_missing_data() {
        let result = Pipeline::new(PipelineConfig::default()).run(&Map::new(), None);
        assert!(matches!(result, Err(WaypointError::MissingData(_))));
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let map = corridor_map(3);

        let mut config = PipelineConfig::default();
        config.scoring.sigma = -1.0;
        assert!(matches!(
            Pipeline::new(config).run(&map, None),
            Err(WaypointError::InvalidConfig(_))
        ));

        let mut config = PipelineConfig::default();
        config.strategy = Strategy::Resample;
        config.resample.num_waypoints = 0;
        assert!(matches!(
            Pipeline::new(config).run(&map, None),
            Err(WaypointError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_warnings_are_counted() {
        let map = corridor_map(3);
        let mut config = PipelineConfig::default();
        config.scoring.alpha = 0.9;
        let output = Pipeline::new(config).run(&map, None).unwrap();
        assert_eq!(output.summary.config_warnings.len(), 1);
    }

    #[test]
    fn test_landmark_free_map_without_pruning() {
        let mut map = Map::new();
        for i in 0..3 {
            map.add_keyframe(KeyFrame::new(KeyFrameId::new(i), SE3::identity()));
        }
        let mut config = PipelineConfig::default();
        config.prune.prune_landmarks = false;

        let output = Pipeline::new(config).run(&map, None).unwrap();
        assert!(output.coverage.is_none());
        // All keyframes sit at the origin: one cell, first keyframe wins.
        let ids: Vec<u32> = output
            .matching
            .selected_keyframes
            .iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(ids, vec![0]);
    }
}
