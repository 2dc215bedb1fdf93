//! Landmark - A 3D point reconstructed by SLAM.

use nalgebra::Vector3;

use super::types::{Attributes, LandmarkId};

/// A 3D map point observed by one or more KeyFrames.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    /// Unique identifier for this Landmark.
    pub id: LandmarkId,

    /// 3D position in world frame.
    pub position: Vector3<f64>,

    /// Uninterpreted map-file fields.
    pub attributes: Attributes,
}

impl Landmark {
    pub fn new(id: LandmarkId, position: Vector3<f64>) -> Self {
        Self {
            id,
            position,
            attributes: Attributes::new(),
        }
    }

    /// Euclidean distance from a world point (typically a camera center).
    pub fn distance_to(&self, point: &Vector3<f64>) -> f64 {
        (self.position - point).norm()
    }
}
