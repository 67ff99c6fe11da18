//! Wavelength-dependent optimal combination weights.
//!
//! The brightest spaxel of a whitelight image is taken as a point source, a
//! small box spectrum of it is extracted from every frame, and each frame is
//! weighted by its smoothed `(S/N)^2` at the wavelength of every pixel.

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::consts::{
    ANGSTROM_TO_METRE, DEFAULT_SN_SMOOTH_FRACTION, MIN_SN_SMOOTH_SIGMA, SN_CLIP_SIGMA,
    WEIGHT_BOX_HALF_WIDTH,
};
use crate::error::{CubeError, Result};
use crate::extract::generate_image_subpixel;
use crate::frame::FrameContext;
use crate::grid::{create_wcs, whitelight_pixels, whitelight_range, AxisBins, CubeWcs, GridOptions, WaveRange};
use crate::math::interp::{CubicSpline, LinearInterp};
use crate::math::safe_inverse;
use crate::math::smooth::{clipped_mean, gaussian_smooth_1d, running_median};
use crate::pixels::PixelTable;
use crate::resample::SubpixelOptions;

/// Weighting settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeightOptions {
    /// Window of the S/N running median; `None` uses a tenth of the spectrum.
    pub sn_smooth_npix: Option<usize>,
    /// Constant weights from each frame's S/N relative to the best frame.
    pub relative: bool,
}

/// S/N statistics and weight spectra of a set of frames.
#[derive(Clone, Debug)]
pub struct SnWeights {
    /// Sigma-clipped RMS S/N per frame.
    pub rms_sn: Vec<f64>,
    /// Weight spectrum per frame, shape `(nspec, nframes)`.
    pub weights: Array2<f64>,
}

/// Common wavelength range of all slits of all frames: the largest slit
/// minimum and the smallest slit maximum.
pub fn overlap_range(contexts: &[FrameContext]) -> Option<(f64, f64)> {
    contexts
        .iter()
        .flat_map(|c| c.slits.slits.iter())
        .fold(None, |acc, s| match acc {
            None => Some((s.wave_min, s.wave_max)),
            Some((lo, hi)) => Some((f64::max(lo, s.wave_min), f64::min(hi, s.wave_max))),
        })
}

/// Weights for every pixel, starting from a collapsed whitelight image of all
/// frames resampled without subpixellation.
///
/// The whitelight covers the wavelength range shared by every slit (or the
/// user override); the grid follows `grid` except that the spectral axis is
/// always collapsed.
pub fn compute_weights_frompix(
    pixels: &PixelTable,
    contexts: &[FrameContext],
    dspat: f64,
    dwv: f64,
    grid: &GridOptions,
    range: &WaveRange,
    options: &WeightOptions,
) -> Result<Vec<f64>> {
    let (data_lo, data_hi) = pixels.wave_extrema().ok_or(CubeError::EmptyInput)?;
    let (blue, red) = overlap_range(contexts).unwrap_or((data_lo, data_hi));
    let (min_wl, max_wl) = whitelight_range(blue, red, range);
    let (_, wavediff) = whitelight_pixels(&pixels.wave, min_wl, max_wl);

    let collapsed = GridOptions {
        collapse: true,
        ..grid.clone()
    };
    let step = if wavediff > 0.0 { wavediff } else { dwv };
    let spec = create_wcs(&pixels.ra, &pixels.dec, &pixels.wave, dspat, step, &collapsed)?;

    let unit = SubpixelOptions {
        spec_subpixel: 1,
        spat_subpixel: 1,
        debug: false,
    };
    let images = generate_image_subpixel(&spec.wcs, &spec.edges, pixels, contexts, &unit, true)?;
    let whitelight = images
        .into_iter()
        .next()
        .ok_or_else(|| CubeError::Pipeline("whitelight pass produced no image".into()))?;

    compute_weights(pixels, &whitelight, &spec.wcs, dwv, options)
}

/// Weights for every pixel from the box spectrum around the brightest spaxel
/// of `whitelight`, whose celestial grid is `image_wcs`. `dwv` is the
/// wavelength step in Angstrom.
pub fn compute_weights(
    pixels: &PixelTable,
    whitelight: &Array2<f64>,
    image_wcs: &CubeWcs,
    dwv: f64,
    options: &WeightOptions,
) -> Result<Vec<f64>> {
    info!("Calculating the optimal weights of each pixel");
    if !(dwv > 0.0) {
        return Err(CubeError::InvalidConfig(format!(
            "wavelength step must be positive, got {dwv}"
        )));
    }
    let (wave_lo, wave_hi) = pixels.wave_extrema().ok_or(CubeError::EmptyInput)?;
    let (ix, iy) = argmax(whitelight).ok_or(CubeError::EmptyInput)?;
    info!(x = ix, y = iy, "Highest S/N object located at spaxel");

    let numwav = ((wave_hi - wave_lo) / dwv).floor() as usize;
    if numwav == 0 {
        warn!(wave_lo, wave_hi, dwv, "Wavelength range is narrower than one step, using uniform weights");
        return Ok(vec![1.0; pixels.len()]);
    }
    let wcs = image_wcs.with_spectral(wave_lo, dwv);
    let spec_bins = AxisBins::new(numwav);
    let in_box = |c: f64, centre: usize| {
        let centre = centre as f64;
        c >= centre - WEIGHT_BOX_HALF_WIDTH - 0.5 && c < centre + WEIGHT_BOX_HALF_WIDTH + 0.5
    };

    let frames = pixels.frame_indices();
    let nframes = frames.len();
    let mut flux_stack = Array2::<f64>::zeros((numwav, nframes));
    let mut ivar_stack = Array2::<f64>::zeros((numwav, nframes));

    for (ff, &frame) in frames.iter().enumerate() {
        info!(frame = ff + 1, total = nframes, "Extracting spectrum of highest S/N detection");
        let mut spec = vec![0.0; numwav];
        let mut var = vec![0.0; numwav];
        let mut norm = vec![0.0; numwav];
        for i in pixels.frame_rows(frame) {
            let [x, y, z] = wcs.world_to_pixel(pixels.ra[i], pixels.dec[i], pixels.wave[i] * ANGSTROM_TO_METRE);
            if !in_box(x, ix) || !in_box(y, iy) {
                continue;
            }
            if let Some(k) = spec_bins.index(z) {
                spec[k] += pixels.sci[i];
                var[k] += safe_inverse(pixels.ivar[i]);
                norm[k] += 1.0;
            }
        }
        for k in 0..numwav {
            // sqrt(1/norm) gives the S/N of a single detector pixel, not the bin.
            flux_stack[[k, ff]] = spec[k] * safe_inverse(norm[k]).sqrt();
            ivar_stack[[k, ff]] = safe_inverse(var[k]);
        }
    }

    let mask = Array2::from_shape_fn((numwav, nframes), |(k, ff)| {
        flux_stack[[k, ff]] != 0.0 && ivar_stack[[k, ff]] != 0.0
    });
    let wave_spec = wcs.wavelengths(numwav);
    let npix = options
        .sn_smooth_npix
        .unwrap_or_else(|| (DEFAULT_SN_SMOOTH_FRACTION * numwav as f64).round() as usize);

    let sn = sn_weights(&flux_stack, &ivar_stack, &mask, npix, options.relative);

    let mut weights = vec![1.0; pixels.len()];
    for (ff, &frame) in frames.iter().enumerate() {
        let column: Vec<f64> = sn.weights.column(ff).to_vec();
        let spline = CubicSpline::new(&wave_spec, &column)
            .ok_or_else(|| CubeError::Pipeline("wavelength grid is not increasing".into()))?;
        for i in pixels.frame_rows(frame) {
            weights[i] = spline.eval(pixels.wave[i]);
        }
    }
    info!("Optimal weighting complete");
    Ok(weights)
}

/// Per-frame S/N weight spectra.
///
/// `flux`, `ivar` and `mask` have shape `(nspec, nframes)`. The RMS S/N of a
/// frame is the sigma-clipped mean of `flux * sqrt(ivar)` over good pixels.
/// Without `relative`, the weight spectrum is the running median (window
/// `sn_smooth_npix`) of `(S/N)^2` over good pixels, interpolated onto every
/// pixel and Gaussian smoothed. With `relative`, each frame gets the constant
/// `rms_sn^2` relative to the best frame. Frames without good pixels get zero
/// weight.
pub fn sn_weights(
    flux: &Array2<f64>,
    ivar: &Array2<f64>,
    mask: &Array2<bool>,
    sn_smooth_npix: usize,
    relative: bool,
) -> SnWeights {
    let (nspec, nframes) = flux.dim();
    let mut rms_sn = Vec::with_capacity(nframes);
    let mut weights = Array2::<f64>::zeros((nspec, nframes));

    let sn_columns: Vec<(Vec<usize>, Vec<f64>)> = (0..nframes)
        .map(|ff| {
            good_sn(
                flux.index_axis(Axis(1), ff),
                ivar.index_axis(Axis(1), ff),
                mask.index_axis(Axis(1), ff),
            )
        })
        .collect();

    for (_, sn) in &sn_columns {
        let mean = clipped_mean(sn, SN_CLIP_SIGMA, 5).unwrap_or(0.0);
        rms_sn.push(mean.abs());
    }

    if relative {
        let best = rms_sn.iter().copied().fold(0.0f64, f64::max);
        let ref_sn2 = best * best;
        for (ff, &rms) in rms_sn.iter().enumerate() {
            let w = if ref_sn2 > 0.0 { rms * rms / ref_sn2 } else { 0.0 };
            weights.column_mut(ff).fill(w);
        }
    } else {
        let sigma = (sn_smooth_npix as f64 / 10.0).max(MIN_SN_SMOOTH_SIGMA);
        for (ff, (good, sn)) in sn_columns.iter().enumerate() {
            if good.is_empty() {
                continue;
            }
            let sn2: Vec<f64> = sn.iter().map(|v| v * v).collect();
            let median = running_median(&sn2, sn_smooth_npix);
            let x: Vec<f64> = good.iter().map(|&k| k as f64).collect();
            let Some(interp) = LinearInterp::new(&x, &median) else {
                continue;
            };
            // Flat beyond the first and last good pixel.
            let (first, last) = (x[0], x[x.len() - 1]);
            let full: Vec<f64> = (0..nspec)
                .map(|k| interp.eval((k as f64).clamp(first, last)))
                .collect();
            let smoothed = gaussian_smooth_1d(&full, sigma);
            for (k, v) in smoothed.into_iter().enumerate() {
                weights[[k, ff]] = v;
            }
        }
    }

    for (ff, rms) in rms_sn.iter().enumerate() {
        info!(frame = ff, rms_sn = rms, weight = rms * rms, "Frame S/N");
    }
    SnWeights { rms_sn, weights }
}

/// Indices and S/N values of the good pixels of one frame.
fn good_sn(flux: ArrayView1<f64>, ivar: ArrayView1<f64>, mask: ArrayView1<bool>) -> (Vec<usize>, Vec<f64>) {
    let mut good = Vec::new();
    let mut sn = Vec::new();
    for k in 0..flux.len() {
        if mask[k] {
            good.push(k);
            sn.push(flux[k] * ivar[k].max(0.0).sqrt());
        }
    }
    (good, sn)
}

/// `(row, column)` of the largest finite value.
fn argmax(image: &Array2<f64>) -> Option<(usize, usize)> {
    image
        .indexed_iter()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<((usize, usize), f64)>, (idx, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}
