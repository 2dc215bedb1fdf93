//! KeyFrame - A recorded camera pose and its place in the pose graph.
//!
//! KeyFrames are the nodes of the stored SLAM graph. Each one carries:
//! - Pose estimate as a camera-from-world transform (T_cw)
//! - The landmarks it observed
//! - Graph relationships (spanning tree parent/children, loop edges)
//!
//! World position and forward direction are derived on demand from the pose
//! and never stored, so they cannot drift out of sync with T_cw.

use nalgebra::Vector3;

use crate::geometry::{world_pose_from_se3, WorldPose, SE3};

use super::types::{Attributes, KeyFrameId, LandmarkId};

/// A KeyFrame in the SLAM map.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFrame {
    /// Unique identifier for this KeyFrame.
    pub id: KeyFrameId,

    /// Pose: transform from world to camera (T_cw).
    /// A world point maps into the camera as p_cam = R_cw * p_world + t_cw.
    pub pose_cw: SE3,

    // ─────────────────────────────────────────────────────────────────────────
    // Observations
    // ─────────────────────────────────────────────────────────────────────────
    /// Landmarks observed by this KeyFrame, in stored order.
    pub landmark_ids: Vec<LandmarkId>,

    /// Per-feature landmark slots as read from a map file, `-1` marking a
    /// feature with no landmark. Index-aligned with the file's keypoints.
    /// Empty for KeyFrames built in memory.
    pub feature_slots: Vec<i64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Spanning Tree
    // ─────────────────────────────────────────────────────────────────────────
    /// Parent KeyFrame in the spanning tree.
    /// None for a root KeyFrame (or one disconnected by pruning).
    pub parent_id: Option<KeyFrameId>,

    /// Children KeyFrames in the spanning tree, in stored order.
    pub children_ids: Vec<KeyFrameId>,

    // ─────────────────────────────────────────────────────────────────────────
    // Loop Closure
    // ─────────────────────────────────────────────────────────────────────────
    /// KeyFrames connected to this one by a loop-closure edge.
    pub loop_edge_ids: Vec<KeyFrameId>,

    /// Uninterpreted map-file fields.
    pub attributes: Attributes,
}

impl KeyFrame {
    /// Create a new KeyFrame with no observations and no graph links.
    pub fn new(id: KeyFrameId, pose_cw: SE3) -> Self {
        Self {
            id,
            pose_cw,
            landmark_ids: Vec::new(),
            feature_slots: Vec::new(),
            parent_id: None,
            children_ids: Vec::new(),
            loop_edge_ids: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// World position and forward direction recovered from T_cw.
    pub fn world_pose(&self) -> WorldPose {
        world_pose_from_se3(&self.pose_cw)
    }

    /// Inverse pose: transform from camera to world (T_wc).
    pub fn pose_wc(&self) -> SE3 {
        self.pose_cw.inverse()
    }

    /// Get the camera position in world frame.
    pub fn camera_center(&self) -> Vector3<f64> {
        self.world_pose().position
    }

    /// Number of observed landmarks.
    pub fn num_landmarks(&self) -> usize {
        self.landmark_ids.len()
    }

    /// Number of feature slots, associated or not.
    ///
    /// Falls back to the observed landmark count when the KeyFrame carries no
    /// slot list.
    pub fn num_feature_slots(&self) -> usize {
        if self.feature_slots.is_empty() {
            self.landmark_ids.len()
        } else {
            self.feature_slots.len()
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Spanning Tree
    // ─────────────────────────────────────────────────────────────────────────

    /// Set the parent KeyFrame in the spanning tree.
    pub fn set_parent(&mut self, parent_id: KeyFrameId) {
        self.parent_id = Some(parent_id);
    }

    /// Disconnect this KeyFrame from its parent.
    pub fn clear_parent(&mut self) {
        self.parent_id = None;
    }

    /// Add a child KeyFrame in the spanning tree (duplicates are ignored).
    pub fn add_child(&mut self, child_id: KeyFrameId) {
        if !self.children_ids.contains(&child_id) {
            self.children_ids.push(child_id);
        }
    }

    /// Add a loop-closure edge (duplicates and self-edges are ignored).
    pub fn add_loop_edge(&mut self, other: KeyFrameId) {
        if other != self.id && !self.loop_edge_ids.contains(&other) {
            self.loop_edge_ids.push(other);
        }
    }

    /// Check if this is a root KeyFrame (no parent).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn create_test_keyframe(id: u32) -> KeyFrame {
        KeyFrame::new(KeyFrameId::new(id), SE3::identity())
    }

    #[test]
    fn test_spanning_tree() {
        let mut kf1 = create_test_keyframe(1);
        let mut kf2 = create_test_keyframe(2);

        assert!(kf1.is_root());

        kf2.set_parent(KeyFrameId::new(1));
        kf1.add_child(KeyFrameId::new(2));
        kf1.add_child(KeyFrameId::new(2));

        assert!(!kf2.is_root());
        assert_eq!(kf2.parent_id, Some(KeyFrameId::new(1)));
        assert_eq!(kf1.children_ids, vec![KeyFrameId::new(2)]);

        kf2.clear_parent();
        assert!(kf2.is_root());
    }

    #[test]
    fn test_loop_edges_skip_self_and_duplicates() {
        let mut kf = create_test_keyframe(3);
        kf.add_loop_edge(KeyFrameId::new(3));
        kf.add_loop_edge(KeyFrameId::new(9));
        kf.add_loop_edge(KeyFrameId::new(9));

        assert_eq!(kf.loop_edge_ids, vec![KeyFrameId::new(9)]);
    }

    #[test]
    fn test_feature_slots_count_unassociated_features() {
        let mut kf = create_test_keyframe(4);
        kf.landmark_ids = vec![LandmarkId::new(3), LandmarkId::new(5)];
        assert_eq!(kf.num_feature_slots(), 2);

        kf.feature_slots = vec![3, -1, 5, -1];
        assert_eq!(kf.num_landmarks(), 2);
        assert_eq!(kf.num_feature_slots(), 4);
    }

    #[test]
    fn test_camera_center_from_pose() {
        // Camera rotated 90° about Y, sitting at (2, 0, 0) in the world.
        let r_cw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let center = Vector3::new(2.0, 0.0, 0.0);
        let t_cw = -(r_cw * center);
        let kf = KeyFrame::new(KeyFrameId::new(1), SE3::new(r_cw, t_cw));

        assert_relative_eq!(kf.camera_center(), center, epsilon = 1e-12);
        assert_relative_eq!(kf.pose_wc().translation, center, epsilon = 1e-12);
        // Optical axis points along R_cwᵀ e_z = -X
        assert_relative_eq!(
            kf.world_pose().forward,
            Vector3::new(-1.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }
}
