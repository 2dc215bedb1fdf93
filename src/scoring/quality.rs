//! Image quality: min–max normalization of raw sharpness measurements.

use std::collections::BTreeMap;

use crate::atlas::KeyFrameId;

/// Externally measured sharpness per keyframe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharpnessTable {
    values: BTreeMap<KeyFrameId, f64>,
}

impl SharpnessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a measurement, replacing any earlier one for the same keyframe.
    pub fn insert(&mut self, id: KeyFrameId, sharpness: f64) -> Option<f64> {
        self.values.insert(id, sharpness)
    }

    pub fn get(&self, id: KeyFrameId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(KeyFrameId, f64)> for SharpnessTable {
    fn from_iter<I: IntoIterator<Item = (KeyFrameId, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Spread below which all raw values are treated as equal.
pub const MIN_QUALITY_SPREAD: f64 = 1e-6;

/// Normalize raw values to [0, 1]: `(v − min) / (max − min)`.
///
/// When the spread is degenerate every value scores 1.0.
pub fn quality_scores(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }

    let (min, max) = raw
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let spread = max - min;

    if spread < MIN_QUALITY_SPREAD {
        tracing::debug!("Quality spread {:.3e} is degenerate, all scores set to 1.0", spread);
        return vec![1.0; raw.len()];
    }

    raw.iter().map(|&v| (v - min) / spread).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let scores = quality_scores(&[120.0, 40.0, 80.0, 200.0]);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[3], 1.0);
        assert!((scores[2] - 0.25).abs() < 1e-12);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_degenerate_spread() {
        assert_eq!(quality_scores(&[5.0, 5.0, 5.0]), vec![1.0, 1.0, 1.0]);
        assert_eq!(quality_scores(&[3.0]), vec![1.0]);
    }

    #[test]
    fn test_empty() {
        assert!(quality_scores(&[]).is_empty());
    }

    #[test]
    fn test_sharpness_table() {
        let table: SharpnessTable = [(KeyFrameId::new(2), 31.5), (KeyFrameId::new(0), 12.0)]
            .into_iter()
            .collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(KeyFrameId::new(2)), Some(31.5));
        assert_eq!(table.get(KeyFrameId::new(1)), None);
    }
}
