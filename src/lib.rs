//! Visual-SLAM map reduction: score keyframes, pick waypoints, and prune the
//! pose graph down to the keyframes that match them.

pub mod atlas;
pub mod config;
pub mod coverage;
pub mod error;
pub mod geometry;
pub mod io;
pub mod matching;
pub mod pipeline;
pub mod pruning;
pub mod reduction;
pub mod scoring;
pub mod selection;

pub use config::PipelineConfig;
pub use error::{Result, WaypointError};
pub use pipeline::{Pipeline, PipelineOutput, RunSummary};
