//! GraphPruner - Reduce a map to a retain set without dangling references.
//!
//! Pruning is lossy and local:
//! 1. KeyFrames outside the retain set are dropped
//! 2. A parent that was dropped becomes "none" (no re-parenting)
//! 3. Children and loop edges are filtered to retained KeyFrames
//! 4. Optionally, Landmarks no retained KeyFrame observes are dropped
//!
//! Observation lists and uninterpreted map-file fields on retained records,
//! as well as the map's top-level fields, are left untouched.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::atlas::{KeyFrameId, Map};
use crate::config::PruneConfig;
use crate::error::{Result, WaypointError};

/// What pruning removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PruneReport {
    pub keyframes_before: usize,
    pub keyframes_after: usize,
    /// Retained KeyFrames whose parent was dropped.
    pub parents_disconnected: usize,
    pub children_dropped: usize,
    pub loop_edges_dropped: usize,
    pub landmarks_before: usize,
    pub landmarks_after: usize,
    /// Requested ids that are not in the map.
    pub missing_retain_ids: Vec<KeyFrameId>,
}

impl PruneReport {
    /// Fraction of KeyFrames kept.
    pub fn keyframe_ratio(&self) -> f64 {
        ratio(self.keyframes_after, self.keyframes_before)
    }
}

fn ratio(after: usize, before: usize) -> f64 {
    if before == 0 {
        0.0
    } else {
        after as f64 / before as f64
    }
}

/// Builds a consistent sub-map from a retain set.
#[derive(Debug, Clone, Default)]
pub struct GraphPruner {
    config: PruneConfig,
}

impl GraphPruner {
    pub fn new(config: PruneConfig) -> Self {
        Self { config }
    }

    /// Produce the pruned map. The input map is not modified.
    pub fn prune(&self, map: &Map, retain: &BTreeSet<KeyFrameId>) -> Result<(Map, PruneReport)> {
        if self.config.prune_landmarks && map.num_landmarks() == 0 {
            return Err(WaypointError::MissingData(
                "landmark pruning requested but the map has no landmarks".into(),
            ));
        }

        let mut report = PruneReport {
            keyframes_before: map.num_keyframes(),
            landmarks_before: map.num_landmarks(),
            missing_retain_ids: retain
                .iter()
                .copied()
                .filter(|id| !map.contains_keyframe(*id))
                .collect(),
            ..PruneReport::default()
        };
        if !report.missing_retain_ids.is_empty() {
            tracing::warn!(
                "{} retain ids are not in the map: {:?}",
                report.missing_retain_ids.len(),
                report.missing_retain_ids
            );
        }

        let mut pruned = map.clone();
        let dropped: Vec<KeyFrameId> = map
            .keyframe_ids()
            .filter(|id| !retain.contains(id))
            .collect();
        for id in dropped {
            pruned.remove_keyframe(id);
        }

        let kept: BTreeSet<KeyFrameId> = pruned.keyframe_ids().collect();
        for id in &kept {
            let Some(kf) = pruned.get_keyframe_mut(*id) else {
                continue;
            };

            if let Some(parent) = kf.parent_id {
                if !kept.contains(&parent) {
                    kf.clear_parent();
                    report.parents_disconnected += 1;
                }
            }

            let children_before = kf.children_ids.len();
            kf.children_ids.retain(|c| kept.contains(c));
            report.children_dropped += children_before - kf.children_ids.len();

            let loops_before = kf.loop_edge_ids.len();
            kf.loop_edge_ids.retain(|e| kept.contains(e));
            report.loop_edges_dropped += loops_before - kf.loop_edge_ids.len();
        }

        if self.config.prune_landmarks {
            let observed = pruned.observed_landmarks(&kept);
            pruned.retain_landmarks(|lm| observed.contains(&lm.id));
        }

        report.keyframes_after = pruned.num_keyframes();
        report.landmarks_after = pruned.num_landmarks();

        tracing::info!(
            "Pruned map: keyframes {} → {}, landmarks {} → {} ({} parents disconnected, {} child refs and {} loop edges dropped)",
            report.keyframes_before,
            report.keyframes_after,
            report.landmarks_before,
            report.landmarks_after,
            report.parents_disconnected,
            report.children_dropped,
            report.loop_edges_dropped
        );

        Ok((pruned, report))
    }
}
