use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ifucube_core::io::cube_file::{read_cube, FLUX_EXT};
use ifucube_core::io::fits::FitsReader;

#[derive(Args)]
pub struct InfoArgs {
    /// Input datacube (FITS)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let cube = read_cube(&args.file)
        .with_context(|| format!("Failed to read cube {}", args.file.display()))?;
    let (nx, ny, nwave) = cube.shape();
    let wcs = &cube.wcs;

    println!("File:        {}", args.file.display());
    println!("Dimensions:  {}x{}x{}", nx, ny, nwave);
    if let (Some(first), Some(last)) = (cube.wave.first(), cube.wave.last()) {
        println!("Wavelength:  {:.2} - {:.2} A (step {:.4} A)", first, last, wcs.wave_step());
    }
    println!("Spaxel:      {:.4} arcsec", wcs.cdelt[1] * 3600.0);
    println!("Origin:      RA {:.6}  Dec {:.6}", wcs.crval[0], wcs.crval[1]);
    println!("WCS name:    {}", wcs.name);

    let total = nx * ny * nwave;
    let empty = cube.empty_voxels();
    let pct = if total > 0 {
        100.0 * empty as f64 / total as f64
    } else {
        0.0
    };
    println!("Empty:       {} voxels ({:.1}%)", empty, pct);

    let reader = FitsReader::open(&args.file)?;
    if let Some(index) = reader.find(FLUX_EXT) {
        let header = reader.header(index)?;
        if let Some(n) = header.get_int("NFRAMES") {
            println!("Frames:      {}", n);
        }
        if let (Some(spec), Some(spat)) = (header.get_int("SPECSUB"), header.get_int("SPATSUB")) {
            println!("Subpixels:   {}x{}", spec, spat);
        }
    }

    Ok(())
}
