use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ifucube_core::extract::{extract_standard_spec, ExtractionConfig, StandardSpectrum};
use ifucube_core::io::cube_file::read_cube;
use serde::Serialize;

#[derive(Args)]
pub struct ExtractArgs {
    /// Standard-star datacube (FITS)
    pub file: PathBuf,

    /// Aperture radius in units of the fitted Gaussian width
    #[arg(long, default_value = "4.0")]
    pub aperture_nsig: f64,

    /// Outer sky radius in units of the fitted Gaussian width
    #[arg(long, default_value = "8.0")]
    pub sky_nsig: f64,

    /// Supersampling of each spaxel for the aperture masks
    #[arg(long, default_value = "20")]
    pub subpixel: usize,

    /// Write the spectrum as CSV to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &ExtractArgs) -> Result<()> {
    let cube = read_cube(&args.file)
        .with_context(|| format!("Failed to read cube {}", args.file.display()))?;
    let config = ExtractionConfig {
        aperture_nsig: args.aperture_nsig,
        sky_nsig: args.sky_nsig,
        subpixel: args.subpixel,
    };
    let spec = extract_standard_spec(&cube, &config)?;

    if let Some(ref path) = args.output {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_spectrum(&mut writer, &spec)
            .with_context(|| format!("Failed to write spectrum to {}", path.display()))?;
        let good = spec.gpm.iter().filter(|&&g| g).count();
        println!(
            "Spectrum saved to {} ({} of {} channels good)",
            path.display(),
            good,
            spec.gpm.len()
        );
    } else {
        write_spectrum(&mut csv::Writer::from_writer(io::stdout().lock()), &spec)?;
    }

    Ok(())
}

/// One CSV row of an extracted spectrum.
#[derive(Serialize)]
struct SpectrumRow {
    wave: f64,
    flux: f64,
    ivar: f64,
    gpm: u8,
}

fn write_spectrum<W: io::Write>(writer: &mut csv::Writer<W>, spec: &StandardSpectrum) -> Result<()> {
    for k in 0..spec.wave.len() {
        writer.serialize(SpectrumRow {
            wave: spec.wave[k],
            flux: spec.flux[k],
            ivar: spec.ivar[k],
            gpm: u8::from(spec.gpm[k]),
        })?;
    }
    writer.flush()?;
    Ok(())
}
