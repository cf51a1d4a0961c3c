//! Command-line front end for the multilayer urban canopy model.
//!
//! `dispersion` turns a building-height raster into per-layer and averaged
//! vertical dispersion potential rasters. `heat` computes the air
//! temperature rise caused by anthropogenic heat from λp/λf rasters.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use canopy_core::heat::{temperature_rise, HeatParams};
use canopy_core::io::{read_raster, write_raster};
use canopy_core::layers::extract_layer;
use canopy_core::{run_dispersion, CanopyConfig, Degenerate, DispersionResult, Extrapolation, HeightField};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "canopy", about = "Multilayer urban canopy dispersion tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Vertical dispersion potential from a building-height raster.
    Dispersion(DispersionArgs),
    /// Temperature rise from anthropogenic heat.
    Heat(HeatArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Tif,
    Json,
}

impl Format {
    fn ext(self) -> &'static str {
        match self {
            Format::Tif => "tif",
            Format::Json => "json",
        }
    }
}

#[derive(clap::Args, Debug)]
struct DispersionArgs {
    /// Building-height raster (GeoTIFF, or JSON grid).
    #[arg(short, long)]
    input: PathBuf,

    /// JSON run configuration; flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Layer depth in metres.
    #[arg(long)]
    layer_depth: Option<f64>,

    /// Aggregation block size in input cells.
    #[arg(long)]
    resolution: Option<usize>,

    /// Reference wind velocity in m/s.
    #[arg(long)]
    reference_velocity: Option<f64>,

    /// Abort when λf falls outside the u*/Uref table instead of clamping.
    #[arg(long)]
    strict_interpolation: bool,

    /// Abort on zero-ventilation cells instead of writing no-data.
    #[arg(long)]
    strict_ventilation: bool,

    /// Output directory (created if absent).
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Prefix for output file names.
    #[arg(short, long, default_value = "dem_layer")]
    name: String,

    /// Also write each layer slice and its λp, λf and exchange velocity to parameters_folder/.
    #[arg(long)]
    keep_intermediates: bool,

    #[arg(long, value_enum, default_value = "tif")]
    format: Format,
}

#[derive(clap::Args, Debug)]
struct HeatArgs {
    /// Anthropogenic heat flux raster Qa.
    #[arg(long)]
    qa: PathBuf,

    /// Site coverage ratio raster λp.
    #[arg(long)]
    lambda_p: PathBuf,

    /// Frontal area density raster λf.
    #[arg(long)]
    lambda_f: PathBuf,

    /// Reference wind velocity in m/s.
    #[arg(long)]
    reference_velocity: f64,

    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(short, long)]
    name: String,

    #[arg(long, value_enum, default_value = "tif")]
    format: Format,
}

// ── Run manifest ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Manifest {
    input: String,
    config: CanopyConfig,
    layers: usize,
    outputs: Vec<String>,
    elapsed_ms: u64,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn resolve_config(args: &DispersionArgs) -> Result<CanopyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read config: {}", path.display()))?;
            CanopyConfig::from_json(&text)
                .with_context(|| format!("Invalid config: {}", path.display()))?
        }
        None => CanopyConfig::default(),
    };
    if let Some(v) = args.layer_depth {
        config.layer_depth = v;
    }
    if let Some(v) = args.resolution {
        config.aggregate_resolution = v;
    }
    if let Some(v) = args.reference_velocity {
        config.reference_velocity = v;
    }
    if args.strict_interpolation {
        config.extrapolation = Extrapolation::Fail;
    }
    if args.strict_ventilation {
        config.on_degenerate = Degenerate::Fail;
    }
    config.validate()?;
    Ok(config)
}

fn output_path(dir: &Path, name: &str, suffix: &str, format: Format) -> PathBuf {
    dir.join(format!("{name}_{suffix}.{}", format.ext()))
}

/// Intermediates to write next to the final products.
struct Intermediates<'a> {
    heights: &'a HeightField,
    layer_depth: f64,
}

/// Write every product of `result`; returns the written paths.
fn write_products(
    result: &DispersionResult,
    dir: &Path,
    name: &str,
    format: Format,
    intermediates: Option<Intermediates<'_>>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if let Some(inter) = intermediates {
        let params_dir = dir.join("parameters_folder");
        fs::create_dir_all(&params_dir)
            .with_context(|| format!("Cannot create {}", params_dir.display()))?;
        for layer in &result.layers {
            let i = layer.index;
            // The pipeline drops slices once reduced; re-slicing is cheap.
            let slice = extract_layer(inter.heights, inter.layer_depth, i)?;
            let path = output_path(&params_dir, name, &i.to_string(), format);
            write_raster(&slice, &path).with_context(|| format!("Write failed: {}", path.display()))?;
            written.push(path);

            for (suffix, grid) in [
                (format!("{i}_scr"), &layer.coverage),
                (format!("{i}_fad"), &layer.frontal_area),
                (format!("{i}_Udi"), &layer.exchange_velocity),
            ] {
                let path = output_path(&params_dir, name, &suffix, format);
                write_raster(grid, &path).with_context(|| format!("Write failed: {}", path.display()))?;
                written.push(path);
            }
        }
    }

    for (i, potential) in result.potentials.iter().enumerate() {
        let path = output_path(dir, name, &format!("{}_V", i + 1), format);
        write_raster(potential, &path).with_context(|| format!("Write failed: {}", path.display()))?;
        written.push(path);
    }

    let path = output_path(dir, name, "avg_V", format);
    write_raster(&result.average, &path).with_context(|| format!("Write failed: {}", path.display()))?;
    written.push(path);

    Ok(written)
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn dispersion(args: &DispersionArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let hf = read_raster(&args.input)
        .with_context(|| format!("Cannot read height raster: {}", args.input.display()))?;
    info!(
        input = %args.input.display(),
        width = hf.width,
        height = hf.height,
        max_height = hf.max_value().unwrap_or(0.0),
        "height raster loaded"
    );

    let result = run_dispersion(&hf, &config)?;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Cannot create {}", args.output_dir.display()))?;
    let intermediates = args.keep_intermediates.then_some(Intermediates {
        heights: &hf,
        layer_depth: config.layer_depth,
    });
    let written = write_products(&result, &args.output_dir, &args.name, args.format, intermediates)?;

    let manifest = Manifest {
        input: args.input.display().to_string(),
        config,
        layers: result.layer_count(),
        outputs: written.iter().map(|p| p.display().to_string()).collect(),
        elapsed_ms: result.elapsed_ms,
    };
    let manifest_path = args.output_dir.join(format!("{}_manifest.json", args.name));
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;

    info!(files = written.len(), layers = result.layer_count(), "finished");
    Ok(())
}

fn heat(args: &HeatArgs) -> Result<()> {
    let out = args.output_dir.join(format!("{}.{}", args.name, args.format.ext()));
    if out.exists() {
        bail!("{} already exists, please choose another result name", out.display());
    }

    let load = |p: &PathBuf| read_raster(p).with_context(|| format!("Cannot read raster: {}", p.display()));
    let qa = load(&args.qa)?;
    let lambda_p = load(&args.lambda_p)?;
    let lambda_f = load(&args.lambda_f)?;

    let dt = temperature_rise(&qa, &lambda_p, &lambda_f, args.reference_velocity, &HeatParams::default())?;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Cannot create {}", args.output_dir.display()))?;
    write_raster(&dt, &out).with_context(|| format!("Write failed: {}", out.display()))?;
    info!(output = %out.display(), "finished");
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match &cli.command {
        Command::Dispersion(args) => dispersion(args),
        Command::Heat(args) => heat(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::Grid;

    fn parse_dispersion(extra: &[&str]) -> DispersionArgs {
        parse_dispersion_from("heights.tif", extra)
    }

    fn parse_dispersion_from(input: &str, extra: &[&str]) -> DispersionArgs {
        let mut argv = vec!["canopy", "dispersion", "--input", input];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Dispersion(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse_dispersion(&["--layer-depth", "5", "--resolution", "50", "--strict-ventilation"]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.layer_depth, 5.0);
        assert_eq!(config.aggregate_resolution, 50);
        assert_eq!(config.reference_velocity, 7.4);
        assert_eq!(config.on_degenerate, Degenerate::Fail);
        assert_eq!(config.extrapolation, Extrapolation::Clamp);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("run.json");
        fs::write(&cfg, r#"{ "layer_depth": 3.0, "reference_velocity": 2.0 }"#).unwrap();
        let cfg_arg = cfg.to_str().unwrap();
        let args = parse_dispersion(&["--config", cfg_arg, "--reference-velocity", "4.5"]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.layer_depth, 3.0);
        assert_eq!(config.reference_velocity, 4.5);
    }

    #[test]
    fn rejects_invalid_override() {
        let args = parse_dispersion(&["--resolution", "0"]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn output_names() {
        let p = output_path(Path::new("out"), "dem_layer", "2_V", Format::Tif);
        assert_eq!(p, Path::new("out").join("dem_layer_2_V.tif"));
        let p = output_path(Path::new("out"), "run", "avg_V", Format::Json);
        assert_eq!(p, Path::new("out").join("run_avg_V.json"));
    }

    #[test]
    fn dispersion_writes_all_products() {
        let dir = tempfile::tempdir().unwrap();
        let mut hf = Grid::filled(4, 4, 0.0);
        hf.set(1, 1, 2.0);
        let input = dir.path().join("heights.tif");
        write_raster(&hf, &input).unwrap();

        let out = dir.path().join("out");
        let input_arg = input.to_str().unwrap();
        let out_arg = out.to_str().unwrap();
        let args = parse_dispersion_from(
            input_arg,
            &["--layer-depth", "1", "--resolution", "2", "--keep-intermediates", "-o", out_arg],
        );
        dispersion(&args).unwrap();

        for name in ["dem_layer_1_V.tif", "dem_layer_2_V.tif", "dem_layer_avg_V.tif", "dem_layer_manifest.json"] {
            assert!(out.join(name).exists(), "missing {name}");
        }
        let params = out.join("parameters_folder");
        for name in ["dem_layer_1_scr.tif", "dem_layer_2_fad.tif", "dem_layer_2_Udi.tif"] {
            assert!(params.join(name).exists(), "missing {name}");
        }
        for i in 1..=2 {
            let slice = read_raster(&params.join(format!("dem_layer_{i}.tif"))).unwrap();
            assert_eq!((slice.width, slice.height), (4, 4));
            assert_eq!(slice.get(1, 1), 1.0);
            assert_eq!(slice.get(0, 0), 0.0);
        }
        let avg = read_raster(&out.join("dem_layer_avg_V.tif")).unwrap();
        assert_eq!((avg.width, avg.height), (2, 2));
    }

    #[test]
    fn heat_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let g = Grid::filled(2, 2, 0.3);
        let path = dir.path().join("g.json");
        write_raster(&g, &path).unwrap();
        let args = HeatArgs {
            qa: path.clone(),
            lambda_p: path.clone(),
            lambda_f: path.clone(),
            reference_velocity: 7.4,
            output_dir: dir.path().to_path_buf(),
            name: "ah".into(),
            format: Format::Json,
        };
        heat(&args).unwrap();
        assert!(dir.path().join("ah.json").exists());
        assert!(heat(&args).is_err());
    }
}
