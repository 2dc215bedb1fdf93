//! Geometry utilities: SE3 transforms, pose recovery.

pub mod pose;
pub mod se3;

pub use pose::{
    normalize_or_identity, rotation_matrix, world_pose, world_pose_from_se3, WorldPose,
    QUATERNION_NORM_EPSILON,
};
pub use se3::SE3;
