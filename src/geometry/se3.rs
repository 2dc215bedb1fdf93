//! SE3: 6-DOF rigid transformation (rotation + translation).
//!
//! Stored SLAM maps keep each keyframe's pose as a camera-from-world
//! transform (T_cw). This type holds such a transform and provides the
//! operations needed to move between camera and world frames.

use nalgebra::{UnitQuaternion, Vector3};

/// Rigid transformation: rotation + translation.
///
/// Transforms points as: p' = R * p + t
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Construct from a unit rotation and a translation.
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Inverse transformation.
    ///
    /// For T = [R | t], T⁻¹ = [Rᵀ | -Rᵀ t].
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Translation3};

    fn yaw_90() -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2)
    }

    #[test]
    fn test_identity() {
        let se3 = SE3::identity();
        assert_eq!(se3.rotation, UnitQuaternion::identity());
        assert_eq!(se3.translation, Vector3::zeros());
    }

    #[test]
    fn test_inverse_roundtrip() {
        let se3 = SE3::new(yaw_90(), Vector3::new(1.0, -2.0, 0.5));
        let back = se3.inverse().inverse();

        assert_relative_eq!(back.translation, se3.translation, epsilon = 1e-12);
        assert_relative_eq!(back.rotation.angle_to(&se3.rotation), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_agrees_with_isometry() {
        let t = Vector3::new(1.0, 2.0, 3.0);
        let se3 = SE3::new(yaw_90(), t);
        let general = Isometry3::from_parts(Translation3::from(t), yaw_90()).inverse();
        let shortcut = se3.inverse();

        assert_relative_eq!(shortcut.translation, general.translation.vector, epsilon = 1e-12);
        assert_relative_eq!(
            shortcut.rotation.angle_to(&general.rotation),
            0.0,
            epsilon = 1e-12
        );
    }
}
