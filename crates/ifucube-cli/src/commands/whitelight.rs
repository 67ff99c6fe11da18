use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ifucube_core::grid::WaveRange;
use ifucube_core::io::cube_file::read_cube;
use ifucube_core::io::fits::{write_image, FitsHeader};
use ifucube_core::io::image_io::save_preview;
use ifucube_core::io::naming::whitelight_filename;

#[derive(Args)]
pub struct WhitelightArgs {
    /// Input datacube (FITS)
    pub file: PathBuf,

    /// Lower wavelength in Angstrom
    #[arg(long)]
    pub wl_min: Option<f64>,

    /// Upper wavelength in Angstrom
    #[arg(long)]
    pub wl_max: Option<f64>,

    /// Output FITS image (defaults to <cube>_whitelight.fits)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also save a PNG or TIFF preview
    #[arg(long)]
    pub preview: Option<PathBuf>,
}

pub fn run(args: &WhitelightArgs) -> Result<()> {
    let cube = read_cube(&args.file)
        .with_context(|| format!("Failed to read cube {}", args.file.display()))?;
    let image = cube.whitelight(&WaveRange::new(args.wl_min, args.wl_max))?;

    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(whitelight_filename(&args.file.to_string_lossy()))
    });
    write_image(&output, &image, &cube.wcs, &FitsHeader::new())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Whitelight saved to {}", output.display());

    if let Some(ref preview) = args.preview {
        save_preview(&image, preview)
            .with_context(|| format!("Failed to write preview {}", preview.display()))?;
        println!("Preview saved to {}", preview.display());
    }

    Ok(())
}
