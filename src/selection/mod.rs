//! CustomSelector - Direct keyframe selection without scoring.
//!
//! These selectors work on the id-ordered keyframe path and produce a
//! retain set for the pruner, as an alternative to the scored grid and
//! resampling strategies.

use std::collections::BTreeSet;
use std::f64::consts::PI;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::atlas::{KeyFrameId, Map};
use crate::error::{Result, WaypointError};

/// Inclusive `[min, max]` bound on one axis.
pub type AxisRange = [f64; 2];

/// Selection rule and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SelectionCriterion {
    /// Exactly the given ids (those present in the path).
    Manual { ids: Vec<KeyFrameId> },
    /// Every k-th keyframe, starting with the first.
    Interval { every: usize },
    /// First keyframe, then each one at least `min_distance` from the last pick.
    Distance { min_distance: f64 },
    /// Keyframes inside every given range.
    Region {
        x: Option<AxisRange>,
        y: Option<AxisRange>,
        z: Option<AxisRange>,
    },
    /// Keyframes with the largest planar heading change.
    Turns { count: usize },
    /// Keyframes at evenly spaced indices.
    Milestones { count: usize },
}

/// Selects keyframes from an ordered path of (id, world position).
#[derive(Debug, Clone)]
pub struct CustomSelector {
    path: Vec<(KeyFrameId, Vector3<f64>)>,
}

impl CustomSelector {
    pub fn new(path: Vec<(KeyFrameId, Vector3<f64>)>) -> Self {
        Self { path }
    }

    /// Path of camera centers in ascending id order.
    pub fn from_map(map: &Map) -> Self {
        Self::new(
            map.keyframes()
                .map(|kf| (kf.id, kf.camera_center()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn select(&self, criterion: &SelectionCriterion) -> Result<BTreeSet<KeyFrameId>> {
        let selected = match criterion {
            SelectionCriterion::Manual { ids } => self.manual(ids),
            SelectionCriterion::Interval { every } => self.interval(*every)?,
            SelectionCriterion::Distance { min_distance } => self.distance(*min_distance),
            SelectionCriterion::Region { x, y, z } => self.region(*x, *y, *z)?,
            SelectionCriterion::Turns { count } => self.turns(*count),
            SelectionCriterion::Milestones { count } => self.milestones(*count),
        };
        tracing::info!(
            "Selected {} of {} keyframes ({:?})",
            selected.len(),
            self.path.len(),
            criterion
        );
        Ok(selected)
    }

    /// The requested ids that exist in the path; unknown ids are logged.
    pub fn manual(&self, ids: &[KeyFrameId]) -> BTreeSet<KeyFrameId> {
        let known: BTreeSet<KeyFrameId> = self.path.iter().map(|(id, _)| *id).collect();
        let (present, missing): (Vec<KeyFrameId>, Vec<KeyFrameId>) =
            ids.iter().partition(|id| known.contains(*id));
        if !missing.is_empty() {
            tracing::warn!("Ignoring unknown keyframe ids: {:?}", missing);
        }
        present.into_iter().collect()
    }

    pub fn interval(&self, every: usize) -> Result<BTreeSet<KeyFrameId>> {
        if every == 0 {
            return Err(WaypointError::InvalidConfig(
                "interval must be at least 1".into(),
            ));
        }
        Ok(self.path.iter().step_by(every).map(|(id, _)| *id).collect())
    }

    pub fn distance(&self, min_distance: f64) -> BTreeSet<KeyFrameId> {
        let mut selected = BTreeSet::new();
        let mut last: Option<&Vector3<f64>> = None;
        for (id, position) in &self.path {
            let take = match last {
                None => true,
                Some(prev) => (position - prev).norm() >= min_distance,
            };
            if take {
                selected.insert(*id);
                last = Some(position);
            }
        }
        selected
    }

    pub fn region(
        &self,
        x: Option<AxisRange>,
        y: Option<AxisRange>,
        z: Option<AxisRange>,
    ) -> Result<BTreeSet<KeyFrameId>> {
        if x.is_none() && y.is_none() && z.is_none() {
            return Err(WaypointError::InvalidConfig(
                "region selection needs at least one axis range".into(),
            ));
        }
        let inside = |range: Option<AxisRange>, v: f64| match range {
            Some([lo, hi]) => lo <= v && v <= hi,
            None => true,
        };
        Ok(self
            .path
            .iter()
            .filter(|(_, p)| inside(x, p.x) && inside(y, p.y) && inside(z, p.z))
            .map(|(id, _)| *id)
            .collect())
    }

    /// Keyframes where the planar (x, y) heading changes most.
    ///
    /// Keyframe i is scored by the angle between displacements i−1→i and
    /// i→i+1, wrapped to [0, π]. Paths shorter than 3 return every keyframe.
    pub fn turns(&self, count: usize) -> BTreeSet<KeyFrameId> {
        if self.path.len() < 3 {
            return self.path.iter().map(|(id, _)| *id).collect();
        }

        let headings: Vec<f64> = self
            .path
            .windows(2)
            .map(|w| {
                let d = w[1].1 - w[0].1;
                d.y.atan2(d.x)
            })
            .collect();

        let mut changes: Vec<(usize, f64)> = headings
            .windows(2)
            .enumerate()
            .map(|(k, h)| (k + 1, wrap_heading_change(h[1] - h[0])))
            .collect();
        changes.sort_by(|a, b| b.1.total_cmp(&a.1));

        changes
            .into_iter()
            .take(count)
            .map(|(i, _)| self.path[i].0)
            .collect()
    }

    /// Indices `floor(i · N / count)` for `i < count`; all when count ≥ N.
    pub fn milestones(&self, count: usize) -> BTreeSet<KeyFrameId> {
        let total = self.path.len();
        if count >= total {
            return self.path.iter().map(|(id, _)| *id).collect();
        }
        (0..count)
            .map(|i| self.path[i * total / count].0)
            .collect()
    }
}

/// Absolute heading change wrapped to [0, π].
fn wrap_heading_change(delta: f64) -> f64 {
    let change = delta.abs();
    if change > PI {
        2.0 * PI - change
    } else {
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &BTreeSet<KeyFrameId>) -> Vec<u32> {
        set.iter().map(|id| id.0).collect()
    }

    fn line_path(n: u32) -> CustomSelector {
        CustomSelector::new(
            (0..n)
                .map(|i| (KeyFrameId::new(i), Vector3::new(i as f64, 0.0, 0.0)))
                .collect(),
        )
    }

    /// Straight along +X, then a left turn up +Y, then a right turn to +X.
    fn zigzag_path() -> CustomSelector {
        let points = [
            [0.0, 0.0],
            [1.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [2.0, 2.0],
            [3.0, 2.0],
        ];
        CustomSelector::new(
            points
                .iter()
                .enumerate()
                .map(|(i, p)| (KeyFrameId::new(i as u32), Vector3::new(p[0], p[1], 0.0)))
                .collect(),
        )
    }

    #[test]
    fn test_manual_ignores_unknown() {
        let sel = line_path(5);
        let out = sel.manual(&[KeyFrameId::new(3), KeyFrameId::new(1), KeyFrameId::new(42)]);
        assert_eq!(ids(&out), vec![1, 3]);
    }

    #[test]
    fn test_interval() {
        let sel = line_path(10);
        assert_eq!(ids(&sel.interval(4).unwrap()), vec![0, 4, 8]);
        assert_eq!(sel.interval(1).unwrap().len(), 10);
        assert!(matches!(
            sel.interval(0),
            Err(WaypointError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_distance() {
        let sel = line_path(7);
        assert_eq!(ids(&sel.distance(2.5)), vec![0, 3, 6]);
        assert_eq!(sel.distance(0.0).len(), 7);
    }

    #[test]
    fn test_region() {
        let sel = zigzag_path();
        let out = sel.region(Some([1.5, 3.0]), Some([0.0, 1.0]), None).unwrap();
        assert_eq!(ids(&out), vec![2, 3]);
        assert!(matches!(
            sel.region(None, None, None),
            Err(WaypointError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_turns() {
        let sel = zigzag_path();
        // Turns happen at keyframes 2 and 4 (90° each); the rest are 0°.
        assert_eq!(ids(&sel.turns(2)), vec![2, 4]);
        assert_eq!(sel.turns(100).len(), 4);
        assert_eq!(line_path(2).turns(5).len(), 2);
    }

    #[test]
    fn test_heading_wrap() {
        assert!((wrap_heading_change(1.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert!((wrap_heading_change(-0.25 * PI) - 0.25 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_milestones() {
        let sel = line_path(10);
        assert_eq!(ids(&sel.milestones(3)), vec![0, 3, 6]);
        assert_eq!(sel.milestones(10).len(), 10);
        assert_eq!(sel.milestones(25).len(), 10);
    }

    #[test]
    fn test_select_dispatch() {
        let sel = line_path(6);
        let out = sel
            .select(&SelectionCriterion::Milestones { count: 2 })
            .unwrap();
        assert_eq!(ids(&out), vec![0, 3]);

        let out = sel
            .select(&SelectionCriterion::Manual {
                ids: vec![KeyFrameId::new(5)],
            })
            .unwrap();
        assert_eq!(ids(&out), vec![5]);
    }
}
