use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use rootcause::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use h3dexport::data::{read_asset, reader};
use h3dexport::export::{self, ExportOptions, write_asset};
use h3dexport::models::dedup::DedupPolicy;
use h3dexport::models::shape_key::ShapeKeyMode;
use h3dexport::models::vertex::BonesPerVertex;
use h3dexport::scene::json::load_scene;

/// Compile JSON scene descriptions into H3D assets, or inspect existing ones
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level (overridden by RUST_LOG)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a scene to an H3D file
    Export(ExportArgs),
    /// Print the text encoding of an H3D file
    Dump(DumpArgs),
}

#[derive(clap::Args, Debug)]
struct ExportArgs {
    /// Scene description (JSON)
    scene: PathBuf,

    /// Output file
    #[clap(short, long)]
    output: PathBuf,

    /// Export options (JSON). Flags given on the command line take precedence.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Write the text encoding
    #[clap(long)]
    textual: bool,

    /// Write every loop as its own vertex
    #[clap(long)]
    keep_duplicates: bool,

    #[clap(long, value_enum)]
    dedup_policy: Option<DedupArg>,

    /// Influence slots per vertex (1-4)
    #[clap(long)]
    bones_per_vertex: Option<u8>,

    /// Skip armatures and skinning
    #[clap(long)]
    no_armatures: bool,

    /// Export rest poses only
    #[clap(long)]
    no_keyframes: bool,

    #[clap(long, value_enum)]
    shape_keys: Option<ShapeKeyArg>,

    #[clap(long, allow_hyphen_values = true)]
    frame_start: Option<i32>,

    #[clap(long, allow_hyphen_values = true)]
    frame_end: Option<i32>,
}

#[derive(clap::Args, Debug)]
struct DumpArgs {
    /// H3D file to read
    input: PathBuf,

    /// Influence slots per vertex the file was written with
    #[clap(long, default_value_t = 4)]
    bones_per_vertex: u8,

    /// Parse as the text encoding instead of detecting it
    #[clap(long)]
    textual_input: bool,

    /// Write to a file instead of stdout
    #[clap(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DedupArg {
    ExactKey,
    Spatial,
}

impl From<DedupArg> for DedupPolicy {
    fn from(value: DedupArg) -> Self {
        match value {
            DedupArg::ExactKey => DedupPolicy::ExactKey,
            DedupArg::Spatial => DedupPolicy::Spatial,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ShapeKeyArg {
    Export,
    ApplyToBase,
    Ignore,
}

impl From<ShapeKeyArg> for ShapeKeyMode {
    fn from(value: ShapeKeyArg) -> Self {
        match value {
            ShapeKeyArg::Export => ShapeKeyMode::Export,
            ShapeKeyArg::ApplyToBase => ShapeKeyMode::ApplyToBase,
            ShapeKeyArg::Ignore => ShapeKeyMode::Ignore,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn bones_per_vertex(count: u8) -> Result<BonesPerVertex, Report> {
    Ok(BonesPerVertex::try_from(count).context("Invalid --bones-per-vertex")?)
}

fn load_options(args: &ExportArgs) -> Result<ExportOptions, Report> {
    let mut options = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .context(format!("Failed to read options file {}", path.display()))?;
            serde_json::from_str::<ExportOptions>(&text).context(format!("Failed to parse options file {}", path.display()))?
        }
        None => ExportOptions::default(),
    };

    if args.textual {
        options.textual = true;
    }
    if args.keep_duplicates {
        options.remove_duplicate_vertices = false;
    }
    if let Some(policy) = args.dedup_policy {
        options.dedup_policy = policy.into();
    }
    if let Some(count) = args.bones_per_vertex {
        options.bones_per_vertex = bones_per_vertex(count)?;
    }
    if args.no_armatures {
        options.export_armatures = false;
    }
    if args.no_keyframes {
        options.export_keyframes = false;
    }
    if let Some(mode) = args.shape_keys {
        options.shape_keys = mode.into();
    }
    if args.frame_start.is_some() {
        options.frame_start = args.frame_start;
    }
    if args.frame_end.is_some() {
        options.frame_end = args.frame_end;
    }
    Ok(options)
}

fn run_export(args: &ExportArgs) -> Result<(), Report> {
    let options = load_options(args)?;
    let scene = load_scene(&args.scene).context(format!("Failed to load scene {}", args.scene.display()))?;
    let asset = export::export_to_path(&scene, &options, &args.output)
        .context(format!("Failed to export to {}", args.output.display()))?;

    info!(
        groups = asset.groups.len(),
        vertices = asset.groups.iter().map(|g| g.vertices.len()).sum::<usize>(),
        triangles = asset.groups.iter().map(|g| g.triangles.len()).sum::<usize>(),
        "done"
    );
    Ok(())
}

fn read_input(path: &Path, slots: BonesPerVertex, textual: bool) -> Result<h3dexport::models::H3dAsset, Report> {
    if !textual {
        return Ok(read_asset(path, slots).context(format!("Failed to read {}", path.display()))?);
    }
    let text = std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    Ok(reader::parse_text(&text, slots).context(format!("Failed to parse {}", path.display()))?)
}

fn run_dump(args: &DumpArgs) -> Result<(), Report> {
    let slots = bones_per_vertex(args.bones_per_vertex)?;
    let asset = read_input(&args.input, slots, args.textual_input)?;

    match &args.output {
        Some(path) => {
            let file = File::create(path).context(format!("Failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write_asset(&asset, true, &mut out).context("Failed to write dump")?;
            out.flush().context("Failed to write dump")?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_asset(&asset, true, &mut out).context("Failed to write dump")?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Report> {
    let args = Args::parse();
    init_logging(args.verbose);

    match &args.command {
        Command::Export(export_args) => run_export(export_args),
        Command::Dump(dump_args) => run_dump(dump_args),
    }
}
