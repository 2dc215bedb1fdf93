//! Heading alignment between the camera axis and the direction of travel.

use nalgebra::Vector3;

/// Displacement norm below which the direction of travel is undefined.
pub const MIN_DISPLACEMENT: f64 = 1e-6;

/// Direction of travel assumed when two consecutive keyframes coincide.
pub fn fallback_direction() -> Vector3<f64> {
    Vector3::z()
}

/// `(forward · reference + 1) / 2`, for unit vectors.
///
/// Identical → 1.0, orthogonal → 0.5, opposite → 0.0.
pub fn direction_score(forward: &Vector3<f64>, reference: &Vector3<f64>) -> f64 {
    ((forward.dot(reference) + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Normalized displacement from `from` to `to`, or the fallback axis.
pub fn travel_direction(from: &Vector3<f64>, to: &Vector3<f64>) -> Vector3<f64> {
    let displacement = to - from;
    let norm = displacement.norm();
    if norm < MIN_DISPLACEMENT {
        fallback_direction()
    } else {
        displacement / norm
    }
}

/// Sequential direction pass over an ordered path of (position, forward).
///
/// The first keyframe has no predecessor and scores 1.0. Every later one is
/// compared against the direction of travel from its predecessor, so the
/// pass carries only the previous position.
pub fn sequential_direction_scores<'a, I>(path: I) -> Vec<f64>
where
    I: IntoIterator<Item = (&'a Vector3<f64>, &'a Vector3<f64>)>,
{
    path.into_iter()
        .scan(None::<&Vector3<f64>>, |previous, (position, forward)| {
            let score = match previous.replace(position) {
                None => 1.0,
                Some(prev) => direction_score(forward, &travel_direction(prev, position)),
            };
            Some(score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_angle_values() {
        let x = Vector3::x();
        assert_relative_eq!(direction_score(&x, &x), 1.0);
        assert_relative_eq!(direction_score(&x, &Vector3::y()), 0.5);
        assert_relative_eq!(direction_score(&x, &-x), 0.0);
    }

    #[test]
    fn test_score_bounds() {
        let dirs = [
            Vector3::new(1.0, 1.0, 0.0).normalize(),
            Vector3::new(-0.3, 0.2, 0.9).normalize(),
            Vector3::new(0.0, -1.0, -1.0).normalize(),
        ];
        for a in &dirs {
            for b in &dirs {
                let s = direction_score(a, b);
                assert!((0.0..=1.0).contains(&s));
            }
        }
    }

    #[test]
    fn test_sequential_pass() {
        let positions = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
        ];
        let forward = Vector3::z();
        let scores =
            sequential_direction_scores(positions.iter().map(|p| (p, &forward)));

        assert_eq!(scores.len(), 4);
        assert_eq!(scores[0], 1.0);
        // Moving along +Z while looking along +Z.
        assert_relative_eq!(scores[1], 1.0);
        // Moving along +X while looking along +Z.
        assert_relative_eq!(scores[2], 0.5);
        // No motion: reference falls back to +Z.
        assert_relative_eq!(scores[3], 1.0);
    }

    #[test]
    fn test_empty_path() {
        let scores = sequential_direction_scores(std::iter::empty::<(&Vector3<f64>, &Vector3<f64>)>());
        assert!(scores.is_empty());
    }
}
