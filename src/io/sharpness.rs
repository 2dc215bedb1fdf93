//! Sharpness tables: `keyframe_id,sharpness` CSV rows.
//!
//! A leading header row and `#` comments are allowed.

use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use tracing::warn;

use crate::atlas::KeyFrameId;
use crate::scoring::SharpnessTable;

pub fn load_sharpness<P: AsRef<Path>>(path: P) -> Result<SharpnessTable> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut table = SharpnessTable::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("Failed to read {}", path.display()))?;
        if rec.len() < 2 {
            continue;
        }
        let (id, value) = match (rec[0].parse::<u32>(), rec[1].parse::<f64>()) {
            (Ok(id), Ok(value)) if value.is_finite() => (KeyFrameId::new(id), value),
            // Header row.
            _ if line == 0 => continue,
            _ => {
                warn!("Skipping sharpness row {}: {:?}", line + 1, rec);
                continue;
            }
        };
        if table.insert(id, value).is_some() {
            warn!("Duplicate sharpness entry for {}, keeping the last one", id);
        }
    }

    if table.is_empty() {
        bail!("No sharpness values in {}", path.display());
    }
    tracing::info!("Loaded {} sharpness values from {}", table.len(), path.display());
    Ok(table)
}
