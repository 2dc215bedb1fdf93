//! Error taxonomy for the reduction core.
//!
//! Only fatal conditions are errors. Per-record problems are reported as
//! [`MalformedRecord`] values and aggregated into the run summary; suspicious
//! but workable settings are [`ConfigWarning`]s.

use thiserror::Error;

use crate::atlas::KeyFrameId;

/// Fatal errors that abort a reduction run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WaypointError {
    /// Required input collection is empty.
    #[error("missing data: {0}")]
    MissingData(String),

    /// A configuration value makes the computation impossible.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two inputs that must line up one-to-one do not.
    #[error("length mismatch: expected {expected} {what}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, WaypointError>;

/// A record excluded from processing; the run continues without it.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRecord {
    /// Raw id as it appeared in the input (may not parse as an integer).
    pub raw_id: String,
    /// Parsed id, when available.
    pub keyframe_id: Option<KeyFrameId>,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(raw_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            raw_id: raw_id.into(),
            keyframe_id: None,
            reason: reason.into(),
        }
    }

    pub fn for_keyframe(id: KeyFrameId, reason: impl Into<String>) -> Self {
        Self {
            raw_id: id.0.to_string(),
            keyframe_id: Some(id),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "keyframe {}: {}", self.raw_id, self.reason)
    }
}

/// Suspicious but non-blocking configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// alpha + beta + gamma is more than 0.01 away from 1.0.
    WeightSum(f64),
    /// Matching threshold is zero or negative; only exact hits (or nothing) match.
    NonPositiveThreshold(f64),
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::WeightSum(sum) => {
                write!(f, "score weights sum to {:.3}, not 1.0", sum)
            }
            ConfigWarning::NonPositiveThreshold(t) => {
                write!(f, "distance threshold {} is not positive", t)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WaypointError::MissingData("no keyframes".into());
        assert_eq!(err.to_string(), "missing data: no keyframes");

        let err = WaypointError::LengthMismatch {
            what: "quality values",
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "length mismatch: expected 3 quality values, got 2");
    }

    #[test]
    fn test_malformed_record_display() {
        let rec = MalformedRecord::for_keyframe(KeyFrameId::new(4), "missing trans_cw");
        assert_eq!(rec.to_string(), "keyframe 4: missing trans_cw");
        assert_eq!(rec.keyframe_id, Some(KeyFrameId::new(4)));
    }

    #[test]
    fn test_warning_display() {
        assert_eq!(
            ConfigWarning::WeightSum(1.2).to_string(),
            "score weights sum to 1.200, not 1.0"
        );
    }
}
