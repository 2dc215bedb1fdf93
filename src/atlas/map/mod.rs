//! Map module - Stored SLAM map data structures.
//!
//! This module contains:
//! - [`KeyFrame`] - Recorded camera poses with observations and graph links
//! - [`Landmark`] - 3D points observed by KeyFrames
//! - [`Map`] - Arena holding both, addressed by id
//!
//! # Architecture
//!
//! KeyFrames reference Landmarks through `landmark_ids` (KF → LM). The pose
//! graph lives on the KeyFrames themselves:
//! - **Spanning Tree**: `parent_id` / `children_ids`
//! - **Loop Edges**: `loop_edge_ids`, one entry per loop closure
//!
//! Every link is an id looked up in the [`Map`], never an owning pointer, so
//! removing a KeyFrame can leave dangling ids but never a dangling object.
//!
//! # Example
//!
//! ```ignore
//! use vslam_waypoints::atlas::map::{KeyFrame, KeyFrameId, Map};
//! use vslam_waypoints::geometry::SE3;
//!
//! let mut map = Map::new();
//! map.add_keyframe(KeyFrame::new(KeyFrameId::new(0), SE3::identity()));
//! map.add_keyframe(KeyFrame::new(KeyFrameId::new(1), SE3::identity()));
//! map.link_parent(KeyFrameId::new(1), KeyFrameId::new(0));
//! assert!(map.dangling_references().is_empty());
//! ```

pub mod keyframe;
pub mod landmark;
#[allow(clippy::module_inception)]
pub mod map;
pub mod types;

pub use keyframe::KeyFrame;
pub use landmark::Landmark;
pub use map::{DanglingReference, Map, MapStatistics};
pub use types::{Attributes, KeyFrameId, LandmarkId};
