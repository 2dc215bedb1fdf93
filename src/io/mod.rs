//! File boundary: map containers, sharpness tables and JSON reports.

pub mod map_file;
pub mod reports;
pub mod sharpness;

pub use map_file::{load_map, save_map, LoadReport, MapFormat, NO_PARENT};
pub use reports::{keyframe_positions, write_json, ScoresDocument, SelectionDocument};
pub use sharpness::load_sharpness;
