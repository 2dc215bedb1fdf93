//! Atlas module - the stored SLAM map consumed and produced by the reducer.
//!
//! - [`map::KeyFrame`] - KeyFrames with spanning tree and loop edges
//! - [`map::Landmark`] - 3D landmarks
//! - [`map::Map`] - Id-addressed container for both

pub mod map;

// Re-export commonly used types
pub use map::{Attributes, KeyFrame, KeyFrameId, Landmark, LandmarkId, Map};
