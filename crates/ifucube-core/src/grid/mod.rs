pub mod geometry;
pub mod wcs;

pub use geometry::{
    set_voxel_sampling, wcs_bounds, whitelight_pixels, whitelight_range, NativeScale,
    ResolvedBounds, WaveRange, WcsBounds,
};
pub use wcs::{AxisBins, CubeWcs, VoxelEdges};

use std::path::PathBuf;

use ndarray::Array2;
use tracing::info;

use crate::consts::{ARCSEC_PER_DEGREE, DEFAULT_EQUINOX};
use crate::error::{CubeError, Result};
use crate::io::fits::load_image_wcs;
use crate::pixels::min_max;

/// Options for [`create_wcs`].
#[derive(Clone, Debug)]
pub struct GridOptions {
    pub bounds: WcsBounds,
    /// FITS image whose celestial WCS and shape replace the data-derived ones.
    pub reference: Option<PathBuf>,
    /// Collapse the spectral axis to a single bin spanning all wavelengths.
    pub collapse: bool,
    pub equinox: f64,
    pub name: String,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            bounds: WcsBounds::default(),
            reference: None,
            collapse: false,
            equinox: DEFAULT_EQUINOX,
            name: "IFU_SPEC".into(),
        }
    }
}

/// Output grid: coordinate system, bin edges and the optional reference image.
#[derive(Clone, Debug)]
pub struct GridSpec {
    pub wcs: CubeWcs,
    pub edges: VoxelEdges,
    pub reference_image: Option<Array2<f64>>,
}

/// Build the output grid covering the data (or the supplied bounds).
///
/// `dspat` is the spaxel size in degrees and `dwave` the wavelength step in
/// Angstrom. RA and Dec counts are truncated, the wavelength count rounded.
/// In collapse mode the single spectral bin is centred on the middle of the
/// full wavelength span so that it covers every pixel.
pub fn create_wcs(
    ra: &[f64],
    dec: &[f64],
    wave: &[f64],
    dspat: f64,
    dwave: f64,
    options: &GridOptions,
) -> Result<GridSpec> {
    if !(dspat > 0.0) || !(dwave > 0.0) {
        return Err(CubeError::InvalidConfig(format!(
            "voxel sizes must be positive (spatial {dspat}, spectral {dwave})"
        )));
    }
    if dec.is_empty() {
        return Err(CubeError::EmptyInput);
    }
    let mean_dec = dec.iter().sum::<f64>() / dec.len() as f64;
    let cosdec = mean_dec.to_radians().cos();

    let b = wcs_bounds(ra, dec, wave, &options.bounds)?;

    let mut numra = ((b.ra_max - b.ra_min) * cosdec / dspat).floor().max(0.0) as usize;
    let mut numdec = ((b.dec_max - b.dec_min) / dspat).floor().max(0.0) as usize;
    let mut numwav = ((b.wave_max - b.wave_min) / dwave).round().max(0.0) as usize;

    let (mut wave_ref, mut wave_step) = (b.wave_min, dwave);
    let (mut wave_lo, mut wave_hi) = (b.wave_min, b.wave_max);
    if options.collapse {
        let (lo, hi) = min_max(wave).ok_or(CubeError::EmptyInput)?;
        wave_lo = lo;
        wave_hi = hi;
        // Widened by a hair so both extremes survive rounding in world_to_pixel.
        wave_step = if hi > lo { (hi - lo) * (1.0 + 1e-9) } else { dwave };
        wave_ref = 0.5 * (lo + hi);
        numwav = 1;
    }

    let mut wcs = CubeWcs::new(
        [b.ra_min, b.dec_min, wave_ref],
        [dspat, dspat, wave_step],
        mean_dec,
        options.equinox,
        &options.name,
    );

    let mut reference_image = None;
    if let Some(path) = &options.reference {
        let (image, image_wcs) = load_image_wcs(path)?;
        wcs.crval[..2].copy_from_slice(&image_wcs.crval[..2]);
        wcs.cdelt[..2].copy_from_slice(&image_wcs.cdelt[..2]);
        wcs.crpix[..2].copy_from_slice(&image_wcs.crpix[..2]);
        wcs.dec_ref = image_wcs.dec_ref;
        (numra, numdec) = image.dim();
        info!(path = %path.display(), numra, numdec, "Using reference image WCS");
        reference_image = Some(image);
    }

    info!(
        ra_min = wcs.crval[0],
        dec_min = wcs.crval[1],
        wave_min = wave_lo,
        wave_max = wave_hi,
        spaxel_arcsec = ARCSEC_PER_DEGREE * wcs.cdelt[0],
        wave_step = wave_step,
        numra,
        numdec,
        numwav,
        "Generated WCS"
    );

    Ok(GridSpec {
        wcs,
        edges: VoxelEdges::new(numra, numdec, numwav),
        reference_image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_covers_all_wavelengths() {
        let ra = [10.0, 10.01];
        let dec = [0.0, 0.01];
        let wave = [4000.0, 6000.0];
        let grid = create_wcs(
            &ra,
            &dec,
            &wave,
            0.001,
            1.0,
            &GridOptions {
                collapse: true,
                ..GridOptions::default()
            },
        )
        .unwrap();
        assert_eq!(grid.edges.z.n, 1);
        for w in wave {
            let [_, _, z] = grid.wcs.world_to_pixel(10.0, 0.0, w * 1e-10);
            assert_eq!(grid.edges.z.index(z), Some(0));
        }
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let err = create_wcs(&[0.0], &[0.0], &[1.0], 0.0, 1.0, &GridOptions::default());
        assert!(matches!(err, Err(CubeError::InvalidConfig(_))));
    }
}
