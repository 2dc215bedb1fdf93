//! JSON report files.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::atlas::{KeyFrameId, Map};
use crate::scoring::{ScoreStatistics, ScoredKeyFrame};

/// Write any serializable value as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write {:?}", path))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    tracing::debug!("Wrote {:?}", path);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ScoresDocument<'a> {
    pub keyframes: &'a [ScoredKeyFrame],
    pub statistics: &'a ScoreStatistics,
}

#[derive(Debug, Serialize)]
pub struct SelectionDocument<'a> {
    pub selected_keyframes: &'a BTreeSet<KeyFrameId>,
}

#[derive(Debug, Serialize)]
pub struct KeyFramePositionRecord {
    pub id: KeyFrameId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// World-from-camera rotation as [qx, qy, qz, qw].
    pub orientation: [f64; 4],
    pub num_landmarks: usize,
}

/// Camera centers of every keyframe, ascending by id.
pub fn keyframe_positions(map: &Map) -> Vec<KeyFramePositionRecord> {
    map.keyframes()
        .map(|kf| {
            let p = kf.camera_center();
            let q = kf.pose_wc().rotation;
            KeyFramePositionRecord {
                id: kf.id,
                x: p.x,
                y: p.y,
                z: p.z,
                orientation: [q.i, q.j, q.k, q.w],
                num_landmarks: kf.num_landmarks(),
            }
        })
        .collect()
}
