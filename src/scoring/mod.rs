//! Keyframe scoring: position, direction and quality criteria.

pub mod direction;
pub mod engine;
pub mod position;
pub mod quality;

pub use direction::{direction_score, sequential_direction_scores, travel_direction};
pub use engine::{
    PoseSample, ScoreRecord, ScoreStatistics, ScoreSummary, ScoredKeyFrame, ScoringEngine,
};
pub use position::{position_score, position_scores};
pub use quality::{quality_scores, SharpnessTable};
