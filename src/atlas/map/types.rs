//! Core ID types for the map arena.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Map-file fields the reducer does not interpret (camera models, frame
/// counters, keypoints, descriptors, ...). They ride along with the record
/// they were read from and are written back unchanged.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Unique identifier for a KeyFrame within a Map.
///
/// KeyFrameIds are lightweight handles for cross-referencing parent, child
/// and loop-edge links without Arc/Rc, which keeps ownership flat and avoids
/// cyclic references in the pose graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyFrameId(pub u32);

impl KeyFrameId {
    /// Create a new KeyFrameId with the given value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for KeyFrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KF{}", self.0)
    }
}

/// Unique identifier for a Landmark within a Map.
///
/// A Landmark is a 3D point reconstructed by SLAM and observed by one or
/// more KeyFrames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkId(pub u32);

impl LandmarkId {
    /// Create a new LandmarkId with the given value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LM{}", self.0)
    }
}
