//! Map - Container for KeyFrames and Landmarks.
//!
//! The Map is an arena holding the stored SLAM graph:
//! - KeyFrames with their poses, observations and graph links
//! - Landmarks (3D points) observed by those KeyFrames
//!
//! All cross references (parent, children, loop edges, observations) are ids
//! resolved through the lookup tables here. Both tables are ordered by id so
//! iteration is deterministic and ascending.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::keyframe::KeyFrame;
use super::landmark::Landmark;
use super::types::{Attributes, KeyFrameId, LandmarkId};

/// A reference from one KeyFrame to another that does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanglingReference {
    Parent { from: KeyFrameId, to: KeyFrameId },
    Child { from: KeyFrameId, to: KeyFrameId },
    LoopEdge { from: KeyFrameId, to: KeyFrameId },
}

/// Structural summary of a Map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapStatistics {
    pub num_keyframes: usize,
    pub num_landmarks: usize,
    /// KeyFrames without a parent.
    pub num_roots: usize,
    /// Total directed loop-edge references.
    pub num_loop_edge_refs: usize,
    /// Mean number of observed landmarks per KeyFrame.
    pub mean_observations: f64,
    pub min_observations: usize,
    pub max_observations: usize,
}

/// The SLAM map containing KeyFrames and Landmarks.
#[derive(Clone, Default, PartialEq)]
pub struct Map {
    /// All KeyFrames in the map.
    keyframes: BTreeMap<KeyFrameId, KeyFrame>,

    /// All Landmarks in the map.
    landmarks: BTreeMap<LandmarkId, Landmark>,

    /// Top-level map-file fields other than the two tables.
    attributes: Attributes,
}

impl Map {
    /// Create a new empty Map.
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // KeyFrame Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a KeyFrame, replacing any existing one with the same id.
    pub fn add_keyframe(&mut self, kf: KeyFrame) -> Option<KeyFrame> {
        self.keyframes.insert(kf.id, kf)
    }

    /// Get a KeyFrame by ID.
    pub fn get_keyframe(&self, id: KeyFrameId) -> Option<&KeyFrame> {
        self.keyframes.get(&id)
    }

    /// Get a mutable reference to a KeyFrame by ID.
    pub fn get_keyframe_mut(&mut self, id: KeyFrameId) -> Option<&mut KeyFrame> {
        self.keyframes.get_mut(&id)
    }

    /// Check whether a KeyFrame is present.
    pub fn contains_keyframe(&self, id: KeyFrameId) -> bool {
        self.keyframes.contains_key(&id)
    }

    /// Get all KeyFrame IDs in ascending order.
    pub fn keyframe_ids(&self) -> impl Iterator<Item = KeyFrameId> + '_ {
        self.keyframes.keys().copied()
    }

    /// Get all KeyFrames in ascending id order.
    pub fn keyframes(&self) -> impl Iterator<Item = &KeyFrame> {
        self.keyframes.values()
    }

    /// Get the number of KeyFrames.
    pub fn num_keyframes(&self) -> usize {
        self.keyframes.len()
    }

    /// Remove a KeyFrame from the map.
    ///
    /// This does NOT touch links held by other KeyFrames; see
    /// [`crate::pruning::GraphPruner`] for a consistent removal.
    pub fn remove_keyframe(&mut self, id: KeyFrameId) -> Option<KeyFrame> {
        self.keyframes.remove(&id)
    }

    /// Link `child` under `parent` on both sides of the spanning tree.
    ///
    /// Returns false if either KeyFrame is missing.
    pub fn link_parent(&mut self, child: KeyFrameId, parent: KeyFrameId) -> bool {
        if !self.keyframes.contains_key(&child) || !self.keyframes.contains_key(&parent) {
            return false;
        }
        if let Some(kf) = self.keyframes.get_mut(&child) {
            kf.set_parent(parent);
        }
        if let Some(kf) = self.keyframes.get_mut(&parent) {
            kf.add_child(child);
        }
        true
    }

    /// Add a symmetric loop-closure edge between two KeyFrames.
    pub fn link_loop(&mut self, a: KeyFrameId, b: KeyFrameId) -> bool {
        if a == b || !self.keyframes.contains_key(&a) || !self.keyframes.contains_key(&b) {
            return false;
        }
        if let Some(kf) = self.keyframes.get_mut(&a) {
            kf.add_loop_edge(b);
        }
        if let Some(kf) = self.keyframes.get_mut(&b) {
            kf.add_loop_edge(a);
        }
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Landmark Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a Landmark, replacing any existing one with the same id.
    pub fn add_landmark(&mut self, lm: Landmark) -> Option<Landmark> {
        self.landmarks.insert(lm.id, lm)
    }

    /// Get a Landmark by ID.
    pub fn get_landmark(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    /// Get all Landmarks in ascending id order.
    pub fn landmarks(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.values()
    }

    /// Get the number of Landmarks.
    pub fn num_landmarks(&self) -> usize {
        self.landmarks.len()
    }

    /// Keep only Landmarks accepted by the predicate.
    pub fn retain_landmarks<F: FnMut(&Landmark) -> bool>(&mut self, mut keep: F) {
        self.landmarks.retain(|_, lm| keep(lm));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Union of landmark ids observed by the given KeyFrames.
    pub fn observed_landmarks<'a, I>(&self, kf_ids: I) -> BTreeSet<LandmarkId>
    where
        I: IntoIterator<Item = &'a KeyFrameId>,
    {
        kf_ids
            .into_iter()
            .filter_map(|id| self.keyframes.get(id))
            .flat_map(|kf| kf.landmark_ids.iter().copied())
            .collect()
    }

    /// Every parent/child/loop-edge reference that points at a missing KeyFrame.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();

        for kf in self.keyframes.values() {
            if let Some(parent) = kf.parent_id {
                if !self.keyframes.contains_key(&parent) {
                    dangling.push(DanglingReference::Parent {
                        from: kf.id,
                        to: parent,
                    });
                }
            }
            for &child in &kf.children_ids {
                if !self.keyframes.contains_key(&child) {
                    dangling.push(DanglingReference::Child {
                        from: kf.id,
                        to: child,
                    });
                }
            }
            for &other in &kf.loop_edge_ids {
                if !self.keyframes.contains_key(&other) {
                    dangling.push(DanglingReference::LoopEdge {
                        from: kf.id,
                        to: other,
                    });
                }
            }
        }

        dangling
    }

    /// Compute a structural summary of the map.
    pub fn statistics(&self) -> MapStatistics {
        let counts: Vec<usize> = self.keyframes.values().map(|kf| kf.num_landmarks()).collect();
        let total: usize = counts.iter().sum();

        MapStatistics {
            num_keyframes: self.keyframes.len(),
            num_landmarks: self.landmarks.len(),
            num_roots: self.keyframes.values().filter(|kf| kf.is_root()).count(),
            num_loop_edge_refs: self.keyframes.values().map(|kf| kf.loop_edge_ids.len()).sum(),
            mean_observations: if counts.is_empty() {
                0.0
            } else {
                total as f64 / counts.len() as f64
            },
            min_observations: counts.iter().copied().min().unwrap_or(0),
            max_observations: counts.iter().copied().max().unwrap_or(0),
        }
    }

    /// Top-level fields carried over from the map file.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }
}

impl std::fmt::Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map")
            .field("num_keyframes", &self.keyframes.len())
            .field("num_landmarks", &self.landmarks.len())
            .finish()
    }
}
