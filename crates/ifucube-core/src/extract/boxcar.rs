use ndarray::{Array2, Axis, Zip};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consts::{DEFAULT_APERTURE_NSIG, DEFAULT_MASK_SUBPIXEL, DEFAULT_SKY_NSIG, MIN_FLUX_COMPLETENESS};
use crate::cube::DataCube;
use crate::error::{CubeError, Result};
use crate::math::safe_inverse;

use super::gaussian::fit_gaussian_2d;
use super::whitelight::make_whitelight_fromcube;

/// Aperture settings for standard-star extraction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Aperture radius in units of the fitted Gaussian width.
    pub aperture_nsig: f64,
    /// Outer radius of the sky annulus in units of the fitted width.
    pub sky_nsig: f64,
    /// Supersampling of each spaxel when building the fractional masks.
    pub subpixel: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            aperture_nsig: DEFAULT_APERTURE_NSIG,
            sky_nsig: DEFAULT_SKY_NSIG,
            subpixel: DEFAULT_MASK_SUBPIXEL,
        }
    }
}

/// Boxcar spectrum of a point source, in flux per Angstrom (not per arcsec^2).
#[derive(Clone, Debug)]
pub struct StandardSpectrum {
    pub wave: Vec<f64>,
    pub flux: Vec<f64>,
    pub ivar: Vec<f64>,
    /// `true` where at least a third of the source flux was measured.
    pub gpm: Vec<bool>,
}

/// Extract the spectrum of the star in a standard-star cube.
///
/// A Gaussian fitted to the whitelight image gives the centre and width; the
/// aperture and the sky annulus are circles of `aperture_nsig` and `sky_nsig`
/// widths. Residual sky from the annulus is subtracted channel by channel,
/// and each channel is scaled up by the fraction of the source profile that
/// falls on good voxels inside the aperture.
pub fn extract_standard_spec(cube: &DataCube, config: &ExtractionConfig) -> Result<StandardSpectrum> {
    if config.subpixel == 0 {
        return Err(CubeError::InvalidConfig("mask supersampling must be at least 1".into()));
    }
    let (nx, ny, nwave) = cube.flux.dim();
    if nx == 0 || ny == 0 || nwave == 0 {
        return Err(CubeError::EmptyInput);
    }

    let mut wl_img = make_whitelight_fromcube(&cube.flux, None, None, None)?;
    let fit = fit_gaussian_2d(&wl_img, true)?;
    let wid = fit.width();
    info!(x0 = fit.x0, y0 = fit.y0, width = wid, "Standard star located");

    let mask = circular_mask((nx, ny), fit.x0, fit.y0, config.aperture_nsig * wid, config.subpixel);
    let sky_outer = circular_mask((nx, ny), fit.x0, fit.y0, config.sky_nsig * wid, config.subpixel);
    let smask = &sky_outer - &mask;

    let good = cube.bpm.mapv(|b| if b == 0 { 1.0 } else { 0.0 });

    // Residual sky per channel from the good voxels of the annulus.
    let mut flux = cube.flux.clone();
    for k in 0..nwave {
        let good_k = good.index_axis(Axis(2), k);
        let mut sky = 0.0;
        let mut nrm = 0.0;
        Zip::from(flux.index_axis(Axis(2), k))
            .and(&good_k)
            .and(&smask)
            .for_each(|&f, &g, &s| {
                sky += f * g * s;
                nrm += g * s;
            });
        let sky = sky * safe_inverse(nrm);
        flux.index_axis_mut(Axis(2), k).mapv_inplace(|f| f - sky);
    }

    let sky_val = (&wl_img * &smask).sum() * safe_inverse(smask.sum());
    wl_img.mapv_inplace(|v| v - sky_val);

    let mut norm_flux = &wl_img * &mask;
    let total = norm_flux.sum();
    norm_flux.mapv_inplace(|v| v * safe_inverse(total));

    info!("Extracting a boxcar spectrum of datacube");
    let area = cube.wcs.spaxel_area_arcsec2();
    let mut out_flux = Vec::with_capacity(nwave);
    let mut out_ivar = Vec::with_capacity(nwave);
    let mut gpm = Vec::with_capacity(nwave);
    for k in 0..nwave {
        let good_k = good.index_axis(Axis(2), k);
        let sigma_k = cube.sigma.index_axis(Axis(2), k);
        let flux_k = flux.index_axis(Axis(2), k);
        let (mut flxscl, mut sci, mut var) = (0.0, 0.0, 0.0);
        Zip::from(&flux_k)
            .and(&sigma_k)
            .and(&good_k)
            .and(&mask)
            .and(&norm_flux)
            .for_each(|&f, &sig, &g, &m, &nf| {
                let cnt = g * m;
                flxscl += nf * cnt;
                sci += f * cnt;
                var += sig * sig * cnt * cnt;
            });
        let nrm = safe_inverse(flxscl);
        let box_flux = sci * nrm * area;
        let box_var = var * nrm * nrm * area * area;
        out_flux.push(box_flux);
        out_ivar.push(safe_inverse(box_var));
        gpm.push(flxscl > MIN_FLUX_COMPLETENESS);
    }

    Ok(StandardSpectrum {
        wave: cube.wave.clone(),
        flux: out_flux,
        ivar: out_ivar,
        gpm,
    })
}

/// Fraction of each spaxel inside a circle, from `subpixel x subpixel`
/// samples centred within every spaxel.
fn circular_mask(shape: (usize, usize), x0: f64, y0: f64, radius: f64, subpixel: usize) -> Array2<f64> {
    let offsets: Vec<f64> = (0..subpixel)
        .map(|k| (k as f64 + 0.5) / subpixel as f64 - 0.5)
        .collect();
    let r2 = radius * radius;
    let per_spaxel = (subpixel * subpixel) as f64;

    Array2::from_shape_fn(shape, |(i, j)| {
        let mut inside = 0usize;
        for &ox in &offsets {
            let dx = i as f64 + ox - x0;
            for &oy in &offsets {
                let dy = j as f64 + oy - y0;
                if dx * dx + dy * dy < r2 {
                    inside += 1;
                }
            }
        }
        inside as f64 / per_spaxel
    })
}
