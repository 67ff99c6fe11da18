//! Wavelength windows, voxel sampling and coordinate bounds.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::consts::{ARCSEC_PER_DEGREE, SPATIAL_SCALE_TOLERANCE, SPECTRAL_SCALE_TOLERANCE};
use crate::error::{CubeError, Result};
use crate::pixels::min_max;

/// Optional wavelength window in Angstrom; each end may be left open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl WaveRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

impl std::fmt::Display for WaveRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_end = |v: Option<f64>| v.map_or_else(|| "auto".to_string(), |v| format!("{v:.2}"));
        write!(f, "{} - {} A", fmt_end(self.min), fmt_end(self.max))
    }
}

/// Explicit grid bounds; unset values fall back to the data extrema.
///
/// RA and Dec are in degrees, wavelengths in Angstrom.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WcsBounds {
    pub ra_min: Option<f64>,
    pub ra_max: Option<f64>,
    pub dec_min: Option<f64>,
    pub dec_max: Option<f64>,
    pub wave_min: Option<f64>,
    pub wave_max: Option<f64>,
}

/// Fully resolved bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedBounds {
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
    pub wave_min: f64,
    pub wave_max: f64,
}

/// Resolve each bound to its override, or to the min/max of the data.
pub fn wcs_bounds(ra: &[f64], dec: &[f64], wave: &[f64], bounds: &WcsBounds) -> Result<ResolvedBounds> {
    let (ra_lo, ra_hi) = min_max(ra).ok_or(CubeError::EmptyInput)?;
    let (dec_lo, dec_hi) = min_max(dec).ok_or(CubeError::EmptyInput)?;
    let (wave_lo, wave_hi) = min_max(wave).ok_or(CubeError::EmptyInput)?;
    Ok(ResolvedBounds {
        ra_min: bounds.ra_min.unwrap_or(ra_lo),
        ra_max: bounds.ra_max.unwrap_or(ra_hi),
        dec_min: bounds.dec_min.unwrap_or(dec_lo),
        dec_max: bounds.dec_max.unwrap_or(dec_hi),
        wave_min: bounds.wave_min.unwrap_or(wave_lo),
        wave_max: bounds.wave_max.unwrap_or(wave_hi),
    })
}

/// Native sampling of one exposure.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NativeScale {
    /// Pixel scale along the slit, degrees.
    pub pixel: f64,
    /// Slicer (slit width) scale, degrees.
    pub slicer: f64,
    /// Wavelength sampling, Angstrom.
    pub wave: f64,
}

/// Check that all exposures share the same native sampling and choose the
/// voxel size.
///
/// Unset sizes default to the largest native value: the largest of the pixel
/// and slicer scales for `dspat` (degrees) and the coarsest wavelength
/// sampling for `dwv` (Angstrom). Inconsistent scales only produce warnings.
pub fn set_voxel_sampling(scales: &[NativeScale], dspat: Option<f64>, dwv: Option<f64>) -> Result<(f64, f64)> {
    if scales.is_empty() {
        return Err(CubeError::EmptyInput);
    }

    if inconsistent(scales, |s| s.pixel, SPATIAL_SCALE_TOLERANCE) {
        warn!(
            scales_arcsec = %listing(scales, |s| s.pixel, ARCSEC_PER_DEGREE),
            "The pixel scales of all input frames are not the same"
        );
    }
    if inconsistent(scales, |s| s.slicer, SPATIAL_SCALE_TOLERANCE) {
        warn!(
            scales_arcsec = %listing(scales, |s| s.slicer, ARCSEC_PER_DEGREE),
            "The slicer scales of all input frames are not the same"
        );
    }
    if inconsistent(scales, |s| s.wave, SPECTRAL_SCALE_TOLERANCE) {
        warn!(
            samplings_angstrom = %listing(scales, |s| s.wave, 1.0),
            "The wavelength samplings of the input frames are not the same"
        );
    }

    let dspat = dspat.unwrap_or_else(|| {
        scales
            .iter()
            .flat_map(|s| [s.pixel, s.slicer])
            .fold(f64::NEG_INFINITY, f64::max)
    });
    let dwv = dwv.unwrap_or_else(|| scales.iter().map(|s| s.wave).fold(f64::NEG_INFINITY, f64::max));
    info!(arcsec = dspat * ARCSEC_PER_DEGREE, "Adopting a square pixel spatial scale");
    info!(angstrom = dwv, "Adopting a wavelength sampling");
    Ok((dspat, dwv))
}

fn inconsistent(scales: &[NativeScale], value: impl Fn(&NativeScale) -> f64, tol: f64) -> bool {
    let reference = value(&scales[0]);
    scales
        .iter()
        .any(|s| ((value(s) - reference) / reference).abs() > tol)
}

fn listing(scales: &[NativeScale], value: impl Fn(&NativeScale) -> f64, factor: f64) -> String {
    scales
        .iter()
        .map(|s| format!("{:.6}", value(s) * factor))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Wavelength window for whitelight images: the recommended `[wavemin, wavemax]`
/// with any user-supplied end substituted.
///
/// User ends outside the recommended range are accepted with a warning.
pub fn whitelight_range(wavemin: f64, wavemax: f64, user: &WaveRange) -> (f64, f64) {
    let mut range = (wavemin, wavemax);
    if let Some(lo) = user.min {
        if lo < wavemin {
            warn!(
                requested = lo,
                recommended = wavemin,
                "Whitelight minimum wavelength is below the range covered by every spaxel"
            );
        }
        range.0 = lo;
    }
    if let Some(hi) = user.max {
        if hi > wavemax {
            warn!(
                requested = hi,
                recommended = wavemax,
                "Whitelight maximum wavelength is above the range covered by every spaxel"
            );
        }
        range.1 = hi;
    }
    info!(min = range.0, max = range.1, "Whitelight images will cover this wavelength range");
    range
}

/// Indices of pixels strictly inside `(min_wl, max_wl)` and the width of the
/// window.
///
/// A degenerate window (`min_wl >= max_wl`, i.e. frames that do not overlap)
/// selects every pixel and uses the full data span, with a warning.
pub fn whitelight_pixels(wave: &[f64], min_wl: f64, max_wl: f64) -> (Vec<usize>, f64) {
    if min_wl < max_wl {
        let rows = (0..wave.len())
            .filter(|&i| wave[i] > min_wl && wave[i] < max_wl)
            .collect();
        (rows, max_wl - min_wl)
    } else {
        warn!("Datacubes do not completely overlap in wavelength; offsets may be unreliable");
        let span = min_max(wave).map_or(0.0, |(lo, hi)| hi - lo);
        ((0..wave.len()).collect(), span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelight_range_user_override() {
        let range = whitelight_range(4000.0, 7000.0, &WaveRange::new(Some(4500.0), None));
        assert_eq!(range, (4500.0, 7000.0));
        let range = whitelight_range(4000.0, 7000.0, &WaveRange::new(Some(3000.0), Some(8000.0)));
        assert_eq!(range, (3000.0, 8000.0));
    }

    #[test]
    fn test_whitelight_pixels_strict_window() {
        let wave = [4000.0, 4500.0, 5000.0, 5500.0];
        let (rows, diff) = whitelight_pixels(&wave, 4000.0, 5500.0);
        assert_eq!(rows, vec![1, 2]);
        assert_eq!(diff, 1500.0);
    }

    #[test]
    fn test_whitelight_pixels_no_overlap_uses_everything() {
        let wave = [4000.0, 4500.0, 5000.0];
        let (rows, diff) = whitelight_pixels(&wave, 6000.0, 5000.0);
        assert_eq!(rows, vec![0, 1, 2]);
        assert_eq!(diff, 1000.0);
    }

    #[test]
    fn test_wcs_bounds_overrides() {
        let bounds = WcsBounds {
            dec_max: Some(5.0),
            wave_min: Some(4100.0),
            ..WcsBounds::default()
        };
        let r = wcs_bounds(&[1.0, 2.0], &[3.0, 4.0], &[4000.0, 5000.0], &bounds).unwrap();
        assert_eq!((r.ra_min, r.ra_max), (1.0, 2.0));
        assert_eq!((r.dec_min, r.dec_max), (3.0, 5.0));
        assert_eq!((r.wave_min, r.wave_max), (4100.0, 5000.0));
        assert!(wcs_bounds(&[], &[], &[], &bounds).is_err());
    }

    #[test]
    fn test_voxel_sampling_defaults_to_largest() {
        let scales = [
            NativeScale { pixel: 1e-4, slicer: 2e-4, wave: 1.0 },
            NativeScale { pixel: 1e-4, slicer: 2e-4, wave: 1.2 },
        ];
        let (dspat, dwv) = set_voxel_sampling(&scales, None, None).unwrap();
        assert_eq!(dspat, 2e-4);
        assert_eq!(dwv, 1.2);
        let (dspat, dwv) = set_voxel_sampling(&scales, Some(5e-5), Some(0.5)).unwrap();
        assert_eq!((dspat, dwv), (5e-5, 0.5));
        assert!(set_voxel_sampling(&[], None, None).is_err());
    }
}
