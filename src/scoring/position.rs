//! Spatial novelty: Gaussian falloff from a reference position.

use nalgebra::Vector3;

use crate::error::{Result, WaypointError};

/// `exp(-‖p − p_ref‖² / (2σ²))`.
///
/// Exactly 1.0 at zero distance, strictly decreasing with distance.
/// Fails when `sigma` is not strictly positive.
pub fn position_score(position: &Vector3<f64>, reference: &Vector3<f64>, sigma: f64) -> Result<f64> {
    validate_sigma(sigma)?;
    Ok(gaussian((position - reference).norm_squared(), sigma))
}

/// Position scores for a batch against one shared reference.
pub fn position_scores(
    positions: &[Vector3<f64>],
    reference: &Vector3<f64>,
    sigma: f64,
) -> Result<Vec<f64>> {
    validate_sigma(sigma)?;
    Ok(positions
        .iter()
        .map(|p| gaussian((p - reference).norm_squared(), sigma))
        .collect())
}

pub(crate) fn validate_sigma(sigma: f64) -> Result<()> {
    // Also rejects NaN.
    if sigma > 0.0 {
        Ok(())
    } else {
        Err(WaypointError::InvalidConfig(format!(
            "sigma must be positive, got {}",
            sigma
        )))
    }
}

#[inline]
fn gaussian(dist_sq: f64, sigma: f64) -> f64 {
    (-dist_sq / (2.0 * sigma * sigma)).exp()
}
