use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ifucube_core::grid::WaveRange;
use ifucube_core::io::bundle::FrameBundle;
use ifucube_core::pipeline::{run_coadd_reported, CoaddConfig};
use tracing::info;

use crate::progress::BarReporter;

#[derive(Args)]
pub struct CombineArgs {
    /// Frame bundle files (JSON)
    #[arg(required = true)]
    pub bundles: Vec<PathBuf>,

    /// Coadd config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output cube file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write one cube per frame instead of a combined cube
    #[arg(long)]
    pub separate: bool,

    /// Spaxel size in arcsec
    #[arg(long)]
    pub spatial_scale: Option<f64>,

    /// Wavelength step in Angstrom
    #[arg(long)]
    pub wave_delta: Option<f64>,

    /// Spectral subpixels per detector pixel
    #[arg(long)]
    pub spec_subpixel: Option<usize>,

    /// Spatial subpixels per detector pixel
    #[arg(long)]
    pub spat_subpixel: Option<usize>,

    /// Lower whitelight wavelength in Angstrom
    #[arg(long)]
    pub wl_min: Option<f64>,

    /// Upper whitelight wavelength in Angstrom
    #[arg(long)]
    pub wl_max: Option<f64>,

    /// FITS image whose WCS defines the spatial grid
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Weight frames by their S/N relative to the best frame
    #[arg(long)]
    pub relative_weights: bool,

    /// Do not write the whitelight image
    #[arg(long)]
    pub no_whitelight: bool,

    /// Also write the residual cube
    #[arg(long)]
    pub debug: bool,
}

pub fn run(args: &CombineArgs) -> Result<()> {
    let config = build_config(args)?;
    config.validate()?;

    let bundles = args
        .bundles
        .iter()
        .map(|path| load_bundle(path))
        .collect::<Result<Vec<_>>>()?;

    crate::summary::print_coadd_summary(&config, &args.bundles);

    let reporter = Arc::new(BarReporter::new()?);
    let outputs = run_coadd_reported(&config, bundles, reporter.clone())?;
    reporter.finish();

    crate::summary::print_outputs(&outputs);
    Ok(())
}

fn build_config(args: &CombineArgs) -> Result<CoaddConfig> {
    let mut config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid coadd config")?
    } else {
        CoaddConfig::default()
    };

    if let Some(ref output) = args.output {
        config.output = output.clone();
    }
    if args.separate {
        config.combine = false;
    }
    if args.spatial_scale.is_some() {
        config.spatial_scale = args.spatial_scale;
    }
    if args.wave_delta.is_some() {
        config.wave_delta = args.wave_delta;
    }
    if let Some(n) = args.spec_subpixel {
        config.spec_subpixel = n;
    }
    if let Some(n) = args.spat_subpixel {
        config.spat_subpixel = n;
    }
    if args.wl_min.is_some() || args.wl_max.is_some() {
        config.whitelight_range = WaveRange::new(
            args.wl_min.or(config.whitelight_range.min),
            args.wl_max.or(config.whitelight_range.max),
        );
    }
    if args.reference.is_some() {
        config.reference_image = args.reference.clone();
    }
    config.relative_weights |= args.relative_weights;
    config.save_whitelight &= !args.no_whitelight;
    config.debug |= args.debug;
    Ok(config)
}

/// Load a bundle; unnamed bundles are named after their file.
fn load_bundle(path: &Path) -> Result<FrameBundle> {
    let mut bundle =
        FrameBundle::load(path).with_context(|| format!("Failed to load bundle {}", path.display()))?;
    if bundle.name.is_empty() {
        bundle.name = path.with_extension("fits").to_string_lossy().into_owned();
    }
    info!(name = %bundle.name, pixels = bundle.pixels.len(), "Bundle ready");
    Ok(bundle)
}
