//! Map container files.
//!
//! The on-disk shape follows the stella_vslam map dump:
//!
//! ```text
//! keyframes: { "<id>": { rot_cw: [qx, qy, qz, qw], trans_cw: [x, y, z],
//!                        lm_ids: [..], span_parent: u32, span_children: [..],
//!                        loop_edges: [..] } }
//! landmarks: { "<id>": { pos_w: [x, y, z] } }
//! ```
//!
//! `.json` files are read and written as JSON, everything else as msgpack.
//! Any other field (`cameras`, frame counters, keypoints, descriptors, ...)
//! is kept as an opaque value on its record and written back unchanged, and
//! `lm_ids` is written back slot for slot, `-1` entries included.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::atlas::{Attributes, KeyFrame, KeyFrameId, Landmark, LandmarkId, Map};
use crate::error::MalformedRecord;
use crate::geometry::{normalize_or_identity, SE3};

/// Wire value of `span_parent` meaning "no parent".
pub const NO_PARENT: u64 = u32::MAX as u64;

/// Serialization format of a map container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFormat {
    MsgPack,
    Json,
}

impl MapFormat {
    /// `.json` → JSON, anything else → msgpack.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => MapFormat::Json,
            _ => MapFormat::MsgPack,
        }
    }
}

fn no_parent() -> u64 {
    NO_PARENT
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireMap {
    #[serde(default)]
    pub keyframes: BTreeMap<String, WireKeyFrame>,
    #[serde(default)]
    pub landmarks: BTreeMap<String, WireLandmark>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireKeyFrame {
    /// Camera-from-world rotation as [qx, qy, qz, qw].
    #[serde(default)]
    pub rot_cw: Option<Vec<f64>>,
    /// Camera-from-world translation.
    #[serde(default)]
    pub trans_cw: Option<Vec<f64>>,
    /// Observed landmark ids; negative entries are empty feature slots.
    #[serde(default)]
    pub lm_ids: Vec<i64>,
    #[serde(default = "no_parent")]
    pub span_parent: u64,
    #[serde(default)]
    pub span_children: Vec<u64>,
    #[serde(default)]
    pub loop_edges: Vec<u64>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireLandmark {
    #[serde(default)]
    pub pos_w: Option<Vec<f64>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

/// Records that could not be loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub malformed_keyframes: Vec<MalformedRecord>,
    /// Raw ids of landmarks without a usable position.
    pub malformed_landmarks: Vec<String>,
    /// Graph or observation ids that do not fit a 32-bit id.
    pub out_of_range_refs: usize,
}

impl LoadReport {
    pub fn num_skipped(&self) -> usize {
        self.malformed_keyframes.len() + self.malformed_landmarks.len()
    }
}

/// Load a map container, skipping malformed records.
pub fn load_map<P: AsRef<Path>>(path: P) -> Result<(Map, LoadReport)> {
    let path = path.as_ref();
    let wire: WireMap = match MapFormat::from_path(path) {
        MapFormat::Json => {
            let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse JSON map {:?}", path))?
        }
        MapFormat::MsgPack => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
            rmp_serde::from_slice(&bytes)
                .with_context(|| format!("Failed to decode msgpack map {:?}", path))?
        }
    };

    let (map, report) = map_from_wire(wire);
    tracing::info!(
        "Loaded {:?}: {} keyframes, {} landmarks ({} records skipped)",
        path,
        map.num_keyframes(),
        map.num_landmarks(),
        report.num_skipped()
    );
    Ok((map, report))
}

/// Save a map container in the format implied by the extension.
pub fn save_map<P: AsRef<Path>>(map: &Map, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let wire = map_to_wire(map);
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    match MapFormat::from_path(path) {
        MapFormat::Json => serde_json::to_writer_pretty(&mut writer, &wire)
            .with_context(|| format!("Failed to write JSON map {:?}", path))?,
        MapFormat::MsgPack => {
            let bytes = rmp_serde::to_vec_named(&wire).context("Failed to encode msgpack map")?;
            writer
                .write_all(&bytes)
                .with_context(|| format!("Failed to write {:?}", path))?;
        }
    }
    writer.flush()?;

    tracing::info!(
        "Saved {:?}: {} keyframes, {} landmarks",
        path,
        map.num_keyframes(),
        map.num_landmarks()
    );
    Ok(())
}

/// Build the in-memory map. Malformed records are reported, not fatal.
pub fn map_from_wire(wire: WireMap) -> (Map, LoadReport) {
    let mut map = Map::new();
    map.set_attributes(wire.extra);
    let mut report = LoadReport::default();

    for (raw_id, wkf) in wire.keyframes {
        match keyframe_from_wire(&raw_id, wkf, &mut report.out_of_range_refs) {
            Ok(kf) if map.contains_keyframe(kf.id) => {
                // Keys such as "1" and "01" name the same keyframe.
                let record = MalformedRecord {
                    raw_id,
                    keyframe_id: Some(kf.id),
                    reason: "duplicate keyframe id".into(),
                };
                warn!("Skipping malformed {}", record);
                report.malformed_keyframes.push(record);
            }
            Ok(kf) => {
                map.add_keyframe(kf);
            }
            Err(record) => {
                warn!("Skipping malformed {}", record);
                report.malformed_keyframes.push(record);
            }
        }
    }

    for (raw_id, wlm) in wire.landmarks {
        let id = raw_id.trim().parse::<u32>().ok();
        let position = wlm.pos_w.as_deref().and_then(finite_vec3);
        match (id, position) {
            (Some(id), Some(_)) if map.get_landmark(LandmarkId::new(id)).is_some() => {
                warn!("Skipping duplicate landmark {}", raw_id);
                report.malformed_landmarks.push(raw_id);
            }
            (Some(id), Some(position)) => {
                let mut lm = Landmark::new(LandmarkId::new(id), position);
                lm.attributes = wlm.extra;
                map.add_landmark(lm);
            }
            _ => {
                warn!("Skipping malformed landmark {}", raw_id);
                report.malformed_landmarks.push(raw_id);
            }
        }
    }

    if report.out_of_range_refs > 0 {
        warn!("Dropped {} out-of-range id references", report.out_of_range_refs);
    }

    (map, report)
}

fn keyframe_from_wire(
    raw_id: &str,
    wkf: WireKeyFrame,
    out_of_range: &mut usize,
) -> std::result::Result<KeyFrame, MalformedRecord> {
    let id = raw_id
        .trim()
        .parse::<u32>()
        .map(KeyFrameId::new)
        .map_err(|_| MalformedRecord::new(raw_id, "id is not an unsigned integer"))?;

    let rot = wkf
        .rot_cw
        .ok_or_else(|| MalformedRecord::for_keyframe(id, "missing rot_cw"))?;
    if rot.len() != 4 || rot.iter().any(|v| !v.is_finite()) {
        return Err(MalformedRecord::for_keyframe(
            id,
            "rot_cw must be 4 finite values",
        ));
    }
    let translation = wkf
        .trans_cw
        .as_deref()
        .ok_or_else(|| MalformedRecord::for_keyframe(id, "missing trans_cw"))
        .and_then(|t| {
            finite_vec3(t)
                .ok_or_else(|| MalformedRecord::for_keyframe(id, "trans_cw must be 3 finite values"))
        })?;

    // Stored as [qx, qy, qz, qw].
    let rotation = normalize_or_identity(Quaternion::new(rot[3], rot[0], rot[1], rot[2]));
    let mut kf = KeyFrame::new(id, SE3::new(rotation, translation));

    kf.landmark_ids = wkf
        .lm_ids
        .iter()
        .filter(|&&v| v >= 0)
        .filter_map(|&v| match u32::try_from(v) {
            Ok(v) => Some(LandmarkId::new(v)),
            Err(_) => {
                *out_of_range += 1;
                None
            }
        })
        .collect();

    kf.parent_id = match wkf.span_parent {
        NO_PARENT => None,
        v => to_keyframe_id(v, out_of_range),
    };
    kf.children_ids = wkf
        .span_children
        .iter()
        .filter_map(|&v| to_keyframe_id(v, out_of_range))
        .collect();
    kf.loop_edge_ids = wkf
        .loop_edges
        .iter()
        .filter_map(|&v| to_keyframe_id(v, out_of_range))
        .collect();
    kf.feature_slots = wkf.lm_ids;
    kf.attributes = wkf.extra;

    Ok(kf)
}

fn to_keyframe_id(v: u64, out_of_range: &mut usize) -> Option<KeyFrameId> {
    match u32::try_from(v) {
        Ok(v) if v != u32::MAX => Some(KeyFrameId::new(v)),
        _ => {
            *out_of_range += 1;
            None
        }
    }
}

fn finite_vec3(v: &[f64]) -> Option<Vector3<f64>> {
    match v {
        [x, y, z] if v.iter().all(|c| c.is_finite()) => Some(Vector3::new(*x, *y, *z)),
        _ => None,
    }
}

/// Wire form of an in-memory map.
pub fn map_to_wire(map: &Map) -> WireMap {
    let keyframes = map
        .keyframes()
        .map(|kf| {
            let q = kf.pose_cw.rotation.quaternion();
            let t = kf.pose_cw.translation;
            let wkf = WireKeyFrame {
                rot_cw: Some(vec![q.i, q.j, q.k, q.w]),
                trans_cw: Some(vec![t.x, t.y, t.z]),
                lm_ids: if kf.feature_slots.is_empty() {
                    kf.landmark_ids.iter().map(|id| i64::from(id.0)).collect()
                } else {
                    kf.feature_slots.clone()
                },
                span_parent: kf.parent_id.map_or(NO_PARENT, |p| u64::from(p.0)),
                span_children: kf.children_ids.iter().map(|id| u64::from(id.0)).collect(),
                loop_edges: kf.loop_edge_ids.iter().map(|id| u64::from(id.0)).collect(),
                extra: kf.attributes.clone(),
            };
            (kf.id.0.to_string(), wkf)
        })
        .collect();

    let landmarks = map
        .landmarks()
        .map(|lm| {
            let p = lm.position;
            (
                lm.id.0.to_string(),
                WireLandmark {
                    pos_w: Some(vec![p.x, p.y, p.z]),
                    extra: lm.attributes.clone(),
                },
            )
        })
        .collect();

    WireMap {
        keyframes,
        landmarks,
        extra: map.attributes().clone(),
    }
}
