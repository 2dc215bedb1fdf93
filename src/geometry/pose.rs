//! Pose recovery: camera-from-world transforms → world position and heading.
//!
//! Maps store each keyframe as T_cw (rotation + translation taking a world
//! point into the camera frame). Navigation wants the opposite view: where the
//! camera sits in the world and which way it looks. Both come from the
//! inverse transform T_wc, computed here with the orthonormal shortcut
//! (Rᵀ instead of a general 4x4 inverse) everywhere in the crate.
//!
//! Camera convention is RDF: +Z is the optical axis, so the forward
//! direction is the third column of R_wc.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

use super::SE3;

/// Quaternion magnitude below which a stored rotation is treated as missing.
pub const QUATERNION_NORM_EPSILON: f64 = 1e-12;

/// Camera placement in the world frame, derived from a stored T_cw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPose {
    /// Camera center in world coordinates.
    pub position: Vector3<f64>,
    /// Unit optical axis in world coordinates.
    pub forward: Vector3<f64>,
}

/// Canonical unit quaternion → rotation matrix conversion.
///
/// Components are read as (qx, qy, qz, qw). The caller must pass a
/// normalized quaternion; no normalization happens here.
#[rustfmt::skip]
pub fn rotation_matrix(q: &Quaternion<f64>) -> Matrix3<f64> {
    let (qx, qy, qz, qw) = (q.i, q.j, q.k, q.w);
    Matrix3::new(
        1.0 - 2.0 * (qy * qy + qz * qz), 2.0 * (qx * qy - qz * qw),       2.0 * (qx * qz + qy * qw),
        2.0 * (qx * qy + qz * qw),       1.0 - 2.0 * (qx * qx + qz * qz), 2.0 * (qy * qz - qx * qw),
        2.0 * (qx * qz - qy * qw),       2.0 * (qy * qz + qx * qw),       1.0 - 2.0 * (qx * qx + qy * qy),
    )
}

/// Normalize a stored quaternion, falling back to identity when its
/// magnitude is below [`QUATERNION_NORM_EPSILON`].
pub fn normalize_or_identity(q: Quaternion<f64>) -> UnitQuaternion<f64> {
    if q.norm() < QUATERNION_NORM_EPSILON {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::from_quaternion(q)
    }
}

/// Recover the world pose from a camera-from-world rotation and translation.
///
/// position = -Rᵀ t, forward = Rᵀ e_z.
pub fn world_pose(rotation: &UnitQuaternion<f64>, translation: &Vector3<f64>) -> WorldPose {
    let r_wc = rotation_matrix(rotation.quaternion()).transpose();
    WorldPose {
        position: -(r_wc * translation),
        forward: r_wc.column(2).into_owned(),
    }
}

/// Same as [`world_pose`], taking the transform as an [`SE3`].
pub fn world_pose_from_se3(pose_cw: &SE3) -> WorldPose {
    world_pose(&pose_cw.rotation, &pose_cw.translation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Translation3, Unit};

    fn sample_rotations() -> Vec<UnitQuaternion<f64>> {
        vec![
            UnitQuaternion::identity(),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.3),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -1.2),
            UnitQuaternion::from_axis_angle(
                &Unit::new_normalize(Vector3::new(1.0, 2.0, -0.5)),
                2.7,
            ),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 3.1),
        ]
    }

    #[test]
    fn test_rotation_matrix_is_orthonormal() {
        for q in sample_rotations() {
            let r = rotation_matrix(q.quaternion());
            assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-12);
            assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rotation_matrix_matches_nalgebra() {
        for q in sample_rotations() {
            let r = rotation_matrix(q.quaternion());
            let expected = q.to_rotation_matrix().into_inner();
            assert_relative_eq!(r, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_normalize_or_identity() {
        let tiny = Quaternion::new(1e-14, 0.0, 0.0, 0.0);
        assert_eq!(normalize_or_identity(tiny), UnitQuaternion::identity());

        let scaled = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        let unit = normalize_or_identity(scaled);
        assert_relative_eq!(unit.quaternion().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(unit.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_world_pose_identity_rotation() {
        // T_cw with identity rotation: camera center = -t
        let pose = world_pose(&UnitQuaternion::identity(), &Vector3::new(-1.0, 0.0, 0.0));
        assert_relative_eq!(pose.position, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(pose.forward, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_world_pose_matches_general_inverse() {
        let t = Vector3::new(0.4, -1.5, 2.0);
        for q in sample_rotations() {
            let pose_cw = SE3::new(q, t);
            let t_wc = Isometry3::from_parts(Translation3::from(t), q)
                .to_homogeneous()
                .try_inverse()
                .unwrap();
            let recovered = world_pose_from_se3(&pose_cw);

            let expected_pos = Vector3::new(t_wc[(0, 3)], t_wc[(1, 3)], t_wc[(2, 3)]);
            let expected_fwd = Vector3::new(t_wc[(0, 2)], t_wc[(1, 2)], t_wc[(2, 2)]);
            assert_relative_eq!(recovered.position, expected_pos, epsilon = 1e-10);
            assert_relative_eq!(recovered.forward, expected_fwd, epsilon = 1e-10);
            assert_relative_eq!(recovered.forward.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_world_pose_camera_center_maps_to_origin() {
        // The recovered camera center must land on the camera-frame origin.
        for q in sample_rotations() {
            let pose_cw = SE3::new(q, Vector3::new(3.0, 1.0, -2.0));
            let center = world_pose_from_se3(&pose_cw).position;
            let in_camera = pose_cw.rotation * center + pose_cw.translation;
            assert_relative_eq!(in_camera.norm(), 0.0, epsilon = 1e-10);
        }
    }
}
