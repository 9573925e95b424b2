//! Command-line topology checker
//!
//! Runs one topology rule over one or two layers and prints the violations
//! as JSON on stdout. Logs go to stderr.
//!
//! Usage:
//!   topol-check --rule "must not have dangles" --layer1 roads.wkt
//!   topol-check --rule "must be inside" --layer1 wells.sqlite \
//!       --layer2 parcels.sqlite --table features

use anyhow::{bail, Context, Result};
use clap::Parser;
use geo_types::Rect;
use std::path::{Path, PathBuf};
use topol_check::topology::{
    CheckerConfig, GeometryKind, Layer, MemoryLayer, SqliteLayer, TopologyEngine, ValidationScope,
    ViolationReport,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "topol-check")]
#[command(about = "Check vector layers against topology rules")]
struct Args {
    /// Rule name, e.g. "must not overlap"
    #[arg(short, long, required_unless_present = "list_rules")]
    rule: Option<String>,

    /// First layer (.wkt/.txt, or .sqlite/.gpkg/.db)
    #[arg(long, required_unless_present = "list_rules")]
    layer1: Option<PathBuf>,

    /// Second layer, for two-layer rules
    #[arg(long)]
    layer2: Option<PathBuf>,

    /// Only check the rectangle minx,miny,maxx,maxy
    #[arg(long, value_parser = parse_extent)]
    extent: Option<Rect<f64>>,

    /// JSON checker settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Table holding the features in SQLite layers
    #[arg(long, default_value = "features")]
    table: String,

    /// Print the available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_extent(s: &str) -> Result<Rect<f64>, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{}: {}", v, e)))
        .collect::<Result<_, _>>()?;
    match values.as_slice() {
        [min_x, min_y, max_x, max_y] => Ok(Rect::new((*min_x, *min_y), (*max_x, *max_y))),
        _ => Err(format!("expected minx,miny,maxx,maxy, got '{}'", s)),
    }
}

fn open_layer(path: &Path, table: &str) -> Result<Box<dyn Layer>> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let layer: Box<dyn Layer> = match ext.as_str() {
        "wkt" | "txt" => Box::new(
            MemoryLayer::read_wkt_file(path, None)
                .with_context(|| format!("Failed to read layer {}", path.display()))?,
        ),
        "sqlite" | "gpkg" | "db" => Box::new(
            SqliteLayer::open(path, table, None)
                .with_context(|| format!("Failed to open table {} in {}", table, path.display()))?,
        ),
        _ => bail!("Unsupported layer file: {}", path.display()),
    };
    debug!("Opened {} as a {} layer", path.display(), layer.geometry_kind());
    Ok(layer)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = match &args.config {
        Some(path) => CheckerConfig::from_json_file(path)?,
        None => CheckerConfig::default(),
    };
    let mut engine = TopologyEngine::new(config);

    if args.list_rules {
        for descriptor in engine.registry().iter() {
            let kinds: Vec<&str> =
                descriptor.layer1_kinds.iter().map(GeometryKind::as_str).collect();
            let second = if descriptor.use_second_layer { " (two layers)" } else { "" };
            println!("{}{} [{}]", descriptor.rule, second, kinds.join(", "));
        }
        return Ok(());
    }

    let (Some(rule), Some(layer1_path)) = (args.rule.as_deref(), args.layer1.as_deref()) else {
        bail!("--rule and --layer1 are required");
    };

    let layer1 = open_layer(layer1_path, &args.table)?;
    let layer2 = args
        .layer2
        .as_deref()
        .map(|path| open_layer(path, &args.table))
        .transpose()?;

    let scope = match args.extent {
        Some(rect) => ValidationScope::Extent(rect),
        None => ValidationScope::WholeLayer,
    };

    info!("Running '{}' on {}", rule, layer1.name());
    let violations = engine
        .try_run_test(rule, Some(layer1.as_ref()), layer2.as_deref(), scope)
        .with_context(|| format!("Rule '{}' could not run", rule))?;

    let reports: Vec<ViolationReport> = violations.iter().map(|v| v.report()).collect();
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
