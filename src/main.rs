use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use vslam_waypoints::atlas::KeyFrameId;
use vslam_waypoints::config::{PipelineConfig, PruneConfig, Strategy};
use vslam_waypoints::coverage::CoverageAnalyzer;
use vslam_waypoints::io::{
    keyframe_positions, load_map, load_sharpness, save_map, write_json, ScoresDocument,
    SelectionDocument,
};
use vslam_waypoints::pipeline::Pipeline;
use vslam_waypoints::pruning::GraphPruner;
use vslam_waypoints::reduction::{PositionMode, ResampleMode, SelectionMethod};
use vslam_waypoints::selection::{CustomSelector, SelectionCriterion};

/// Reduce a stored visual-SLAM map to a sparse set of waypoint keyframes.
#[derive(Debug, Parser)]
#[command(name = "waypoint-reducer", author, version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score keyframes, generate waypoints, and prune the map to them.
    Run(RunArgs),
    /// Report map structure and keyframe positions.
    Analyze(AnalyzeArgs),
    /// Select keyframes directly and prune the map to them.
    Select(SelectArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Input map (.json, anything else is read as msgpack).
    map: PathBuf,

    /// Directory for reports and the reduced map.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// YAML pipeline config. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV of `keyframe_id,sharpness` used as raw quality.
    #[arg(long)]
    sharpness: Option<PathBuf>,

    #[arg(long)]
    strategy: Option<Strategy>,

    #[arg(long)]
    alpha: Option<f64>,

    #[arg(long)]
    beta: Option<f64>,

    #[arg(long)]
    gamma: Option<f64>,

    #[arg(long)]
    sigma: Option<f64>,

    /// Fixed position-score reference instead of the first keyframe.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    reference: Option<Vec<f64>>,

    #[arg(long)]
    grid_size: Option<f64>,

    #[arg(long)]
    selection_method: Option<SelectionMethod>,

    #[arg(long)]
    position_mode: Option<PositionMode>,

    #[arg(long)]
    num_waypoints: Option<usize>,

    #[arg(long)]
    resample_mode: Option<ResampleMode>,

    #[arg(long)]
    distance_threshold: Option<f64>,

    /// Keep every landmark instead of only those the retained keyframes observe.
    #[arg(long)]
    keep_all_landmarks: bool,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    map: PathBuf,

    #[arg(short, long, default_value = "output")]
    output: PathBuf,
}

#[derive(Debug, Args)]
#[command(group = clap::ArgGroup::new("criterion").required(true).multiple(false))]
struct SelectArgs {
    map: PathBuf,

    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Comma separated keyframe ids.
    #[arg(long, group = "criterion", value_delimiter = ',')]
    ids: Option<Vec<u32>>,

    /// Keep every k-th keyframe.
    #[arg(long, group = "criterion")]
    interval: Option<usize>,

    /// Keep keyframes at least this far apart along the path.
    #[arg(long, group = "criterion")]
    min_distance: Option<f64>,

    /// Keep keyframes inside the given box. Any axis may be omitted.
    #[arg(long, group = "criterion")]
    region: bool,

    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true, requires = "region")]
    x_range: Option<Vec<f64>>,

    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true, requires = "region")]
    y_range: Option<Vec<f64>>,

    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true, requires = "region")]
    z_range: Option<Vec<f64>>,

    /// Keep the keyframes with the sharpest heading changes.
    #[arg(long, group = "criterion")]
    turns: Option<usize>,

    /// Keep evenly spaced keyframes.
    #[arg(long, group = "criterion")]
    milestones: Option<usize>,

    #[arg(long)]
    keep_all_landmarks: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vslam_waypoints=info".parse()?),
        )
        .init();

    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Analyze(args) => analyze(args),
        Command::Select(args) => select(args),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

fn run(args: RunArgs) -> Result<()> {
    let config = build_config(&args)?;
    let (map, load_report) = load_map(&args.map)?;
    let sharpness = args.sharpness.as_ref().map(load_sharpness).transpose()?;

    let output = Pipeline::new(config)
        .run(&map, sharpness.as_ref())
        .with_context(|| format!("Pipeline failed on {:?}", args.map))?;
    let summary = output.summary.clone().with_load_skipped(load_report.num_skipped());

    let out = &args.output;
    write_json(
        out.join("scores.json"),
        &ScoresDocument {
            keyframes: &output.scores,
            statistics: &output.score_statistics,
        },
    )?;
    write_json(out.join("waypoints.json"), &output.waypoints)?;
    write_json(out.join("matching.json"), &output.matching)?;
    write_json(
        out.join("selected_keyframes.json"),
        &SelectionDocument {
            selected_keyframes: &output.matching.selected_keyframes,
        },
    )?;
    write_json(out.join("prune.json"), &output.prune)?;
    if let Some(coverage) = &output.coverage {
        write_json(out.join("coverage.json"), coverage)?;
    }
    write_json(out.join("summary.json"), &summary)?;

    let map_path = reduced_map_path(&args.map, out);
    save_map(&output.pruned_map, &map_path)?;

    println!(
        "{} keyframes → {} waypoints → {} retained ({}/{} matched, {} skipped)",
        summary.keyframes_in,
        summary.waypoints_generated,
        summary.keyframes_retained,
        summary.matched,
        summary.total_targets,
        summary.total_skipped()
    );
    println!("Reduced map written to {:?}", map_path);
    Ok(())
}

fn build_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(v) = args.strategy {
        config.strategy = v;
    }
    if let Some(v) = args.alpha {
        config.scoring.alpha = v;
    }
    if let Some(v) = args.beta {
        config.scoring.beta = v;
    }
    if let Some(v) = args.gamma {
        config.scoring.gamma = v;
    }
    if let Some(v) = args.sigma {
        config.scoring.sigma = v;
    }
    if let Some(v) = &args.reference {
        match v.as_slice() {
            [x, y, z] => config.scoring.reference = Some([*x, *y, *z]),
            _ => bail!("--reference takes three values"),
        }
    }
    if let Some(v) = args.grid_size {
        config.grid.grid_size = v;
    }
    if let Some(v) = args.selection_method {
        config.grid.selection_method = v;
    }
    if let Some(v) = args.position_mode {
        config.grid.position_mode = v;
    }
    if let Some(v) = args.num_waypoints {
        config.resample.num_waypoints = v;
    }
    if let Some(v) = args.resample_mode {
        config.resample.mode = v;
    }
    if let Some(v) = args.distance_threshold {
        config.matching.distance_threshold = v;
    }
    if args.keep_all_landmarks {
        config.prune.prune_landmarks = false;
    }

    Ok(config)
}

/// `<output>/reduced_<input name>`, keeping the input format.
fn reduced_map_path(input: &Path, output_dir: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map.msg".to_string());
    output_dir.join(format!("reduced_{}", name))
}

// ─────────────────────────────────────────────────────────────────────────────
// analyze
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AnalysisDocument<'a> {
    statistics: &'a vslam_waypoints::atlas::map::MapStatistics,
    dangling_references: usize,
    malformed_records: usize,
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let (map, load_report) = load_map(&args.map)?;
    let statistics = map.statistics();
    let dangling = map.dangling_references();

    write_json(
        args.output.join("map_statistics.json"),
        &AnalysisDocument {
            statistics: &statistics,
            dangling_references: dangling.len(),
            malformed_records: load_report.num_skipped(),
        },
    )?;
    write_json(
        args.output.join("keyframe_positions.json"),
        &keyframe_positions(&map),
    )?;
    if map.num_landmarks() > 0 {
        let coverage = CoverageAnalyzer::analyze(&map, map.keyframe_ids());
        write_json(args.output.join("coverage.json"), &coverage)?;
    }

    println!(
        "{} keyframes ({} roots, {} loop edge refs), {} landmarks, {:.1} observations/keyframe",
        statistics.num_keyframes,
        statistics.num_roots,
        statistics.num_loop_edge_refs,
        statistics.num_landmarks,
        statistics.mean_observations
    );
    if !dangling.is_empty() {
        println!("{} dangling references", dangling.len());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// select
// ─────────────────────────────────────────────────────────────────────────────

fn criterion(args: &SelectArgs) -> Result<SelectionCriterion> {
    fn range(values: &Option<Vec<f64>>) -> Option<[f64; 2]> {
        values.as_ref().and_then(|v| match v.as_slice() {
            [lo, hi] => Some([*lo, *hi]),
            _ => None,
        })
    }

    let criterion = if let Some(ids) = &args.ids {
        SelectionCriterion::Manual {
            ids: ids.iter().copied().map(KeyFrameId::new).collect(),
        }
    } else if let Some(every) = args.interval {
        SelectionCriterion::Interval { every }
    } else if let Some(min_distance) = args.min_distance {
        SelectionCriterion::Distance { min_distance }
    } else if args.region {
        SelectionCriterion::Region {
            x: range(&args.x_range),
            y: range(&args.y_range),
            z: range(&args.z_range),
        }
    } else if let Some(count) = args.turns {
        SelectionCriterion::Turns { count }
    } else if let Some(count) = args.milestones {
        SelectionCriterion::Milestones { count }
    } else {
        bail!("No selection criterion given");
    };
    Ok(criterion)
}

fn select(args: SelectArgs) -> Result<()> {
    let criterion = criterion(&args)?;
    let (map, _) = load_map(&args.map)?;

    let selected = CustomSelector::from_map(&map)
        .select(&criterion)
        .context("Keyframe selection failed")?;
    tracing::info!("Selected {} of {} keyframes", selected.len(), map.num_keyframes());

    let pruner = GraphPruner::new(PruneConfig {
        prune_landmarks: !args.keep_all_landmarks && map.num_landmarks() > 0,
    });
    let (pruned, report) = pruner.prune(&map, &selected)?;

    write_json(
        args.output.join("selected_keyframes.json"),
        &SelectionDocument {
            selected_keyframes: &selected,
        },
    )?;
    write_json(args.output.join("prune.json"), &report)?;

    let map_path = reduced_map_path(&args.map, &args.output);
    save_map(&pruned, &map_path)?;

    println!(
        "{} → {} keyframes, {} → {} landmarks",
        report.keyframes_before, report.keyframes_after, report.landmarks_before, report.landmarks_after
    );
    println!("Reduced map written to {:?}", map_path);
    Ok(())
}
