//! xbake - bake texture maps from a high-poly mesh onto a low-poly UV layout.
//!
//! ```text
//! xbake crate_low.glb crate_high.obj --resolution 4096 --extrusion 0.05
//! ```
//!
//! Writes `crate_normal.png`, `crate_ao.png`, ... next to the low-poly mesh
//! (or into `--output-dir`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use xbake::{
    write_outputs, BakeJob, BakeReport, BakeSettings, CancelToken, NormalFormat, PositionEncoding,
    WriteReport,
};

mod import;
mod png;

#[derive(Parser, Debug)]
#[command(name = "xbake")]
#[command(about = "Cage-projection texture baker", long_about = None)]
struct Cli {
    /// Low-poly mesh with UVs (.gltf, .glb or .obj)
    lowpoly: PathBuf,
    /// High-poly reference mesh (.gltf, .glb or .obj)
    highpoly: PathBuf,
    /// Explicit projection cage with the low-poly topology; replaces extrusion
    #[arg(long)]
    cage: Option<PathBuf>,

    /// TOML file with bake settings; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output directory (default: the low-poly mesh's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Write the bake report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Output width and height in pixels
    #[arg(short, long)]
    resolution: Option<u32>,
    /// Cage extrusion distance in mesh units
    #[arg(short, long)]
    extrusion: Option<f64>,
    /// Projection search distance (default: twice the extrusion)
    #[arg(long)]
    max_ray_distance: Option<f64>,
    /// Normal map convention: OPENGL or DIRECTX
    #[arg(long)]
    normal_format: Option<NormalFormat>,
    /// Inputs are +Y-up (Maya, most engines)
    #[arg(long)]
    maya: bool,
    /// Do not retry missed rays in the opposite direction
    #[arg(long)]
    no_bidirectional: bool,

    /// Skip the tangent-space normal map
    #[arg(long)]
    no_normal: bool,
    /// Skip ambient occlusion
    #[arg(long)]
    no_ao: bool,
    /// Skip curvature
    #[arg(long)]
    no_curvature: bool,
    /// Skip the position map
    #[arg(long)]
    no_position: bool,
    /// Skip the world-space normal map
    #[arg(long)]
    no_world_normal: bool,

    /// Ambient occlusion rays per texel
    #[arg(long)]
    ao_samples: Option<u32>,
    /// Ambient occlusion falloff distance in mesh units
    #[arg(long)]
    ao_distance: Option<f64>,
    /// Curvature probe radius in mesh units
    #[arg(long)]
    curvature_radius: Option<f64>,
    /// Curvature contrast between 0 and 1
    #[arg(long)]
    curvature_contrast: Option<f64>,
    /// Seam dilation in pixels
    #[arg(long)]
    dilation_margin: Option<u32>,
    /// Seam dilation as a percentage of the resolution
    #[arg(long)]
    margin_percentage: Option<f64>,
    /// Worker tile size in pixels
    #[arg(long)]
    tile_size: Option<u32>,
}

impl Cli {
    /// Settings from `--config` (or defaults) with command-line overrides applied.
    fn settings(&self) -> Result<BakeSettings> {
        let mut s = match &self.config {
            Some(path) => load_config(path)?,
            None => BakeSettings::default(),
        };

        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { s.$field = v; })*
            };
        }
        set!(resolution, extrusion, normal_format, ao_samples, ao_distance, curvature_contrast, dilation_margin, tile_size);

        if self.max_ray_distance.is_some() {
            s.max_ray_distance = self.max_ray_distance;
        }
        if self.curvature_radius.is_some() {
            s.curvature_radius = self.curvature_radius;
        }
        if self.margin_percentage.is_some() {
            s.margin_percentage = self.margin_percentage;
        }
        s.use_maya_orientation |= self.maya;
        s.bidirectional &= !self.no_bidirectional;
        s.use_normal &= !self.no_normal;
        s.use_ao &= !self.no_ao;
        s.use_curvature &= !self.no_curvature;
        s.use_position &= !self.no_position;
        s.use_world_normal &= !self.no_world_normal;
        Ok(s)
    }

    fn output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => match self.lowpoly.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }
}

fn load_config(path: &Path) -> Result<BakeSettings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
}

/// JSON written by `--report`.
#[derive(Serialize)]
struct ReportFile<'a> {
    stem: &'a str,
    #[serde(flatten)]
    report: &'a BakeReport,
    position_encoding: Option<&'a PositionEncoding>,
    written: Vec<&'a str>,
    failed: Vec<String>,
}

fn write_report(
    path: &Path,
    stem: &str,
    report: &BakeReport,
    encoding: Option<&PositionEncoding>,
    writes: &WriteReport,
) -> Result<()> {
    let file = ReportFile {
        stem,
        report,
        position_encoding: encoding,
        written: writes.written.iter().map(|(_, p)| p.as_str()).collect(),
        failed: writes
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.channel, f.message))
            .collect(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    fs::write(path, json).with_context(|| format!("Failed to write report: {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings()?;
    let out_dir = cli.output_dir();

    let low = import::load_mesh(&cli.lowpoly)?;
    let high = import::load_mesh(&cli.highpoly)?;
    let cage = cli.cage.as_deref().map(import::load_mesh).transpose()?;

    let job = BakeJob::with_cage(low, high, cage, settings)?;
    let output = job.run(&CancelToken::new())?;
    for warning in &output.report.warnings {
        warn!("{warning}");
    }

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let stem = job.output_stem();
    let sink = png::PngSink::new(&out_dir);
    let writes = write_outputs(&sink, &stem, &output.rasters);

    if let Some(path) = &cli.report {
        write_report(
            path,
            &stem,
            &output.report,
            output.position_encoding.as_ref(),
            &writes,
        )?;
        info!(path = %path.display(), "wrote report");
    }

    if !writes.is_complete() {
        bail!(
            "{} of {} channels could not be written",
            writes.failed.len(),
            output.rasters.len()
        );
    }
    info!(
        files = writes.written.len(),
        dir = %out_dir.display(),
        "done"
    );
    Ok(())
}
