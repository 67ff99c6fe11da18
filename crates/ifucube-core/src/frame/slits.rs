use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::tilts::TiltSurface;

/// One slit traced on the detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlitTrace {
    /// Identifier matched against the pixel table's `slit_id` column. Must be non-zero.
    pub spat_id: u32,
    /// Left spatial edge at each spectral row.
    pub left: Vec<f64>,
    /// Right spatial edge at each spectral row.
    pub right: Vec<f64>,
    /// Shortest wavelength (Angstrom) recorded by this slit.
    pub wave_min: f64,
    /// Longest wavelength (Angstrom) recorded by this slit.
    pub wave_max: f64,
}

impl SlitTrace {
    /// Slit with edges parallel to the spectral axis.
    pub fn straight(spat_id: u32, left: f64, right: f64, nspec: usize, wave_min: f64, wave_max: f64) -> Self {
        Self {
            spat_id,
            left: vec![left; nspec],
            right: vec![right; nspec],
            wave_min,
            wave_max,
        }
    }

    pub fn left_at(&self, spec: f64) -> f64 {
        edge_at(&self.left, spec)
    }

    pub fn right_at(&self, spec: f64) -> f64 {
        edge_at(&self.right, spec)
    }
}

/// Linear interpolation of an edge trace at a fractional spectral row,
/// extrapolating from the end rows.
fn edge_at(trace: &[f64], spec: f64) -> f64 {
    match trace.len() {
        0 => 0.0,
        1 => trace[0],
        n => {
            let i = (spec.floor().max(0.0) as usize).min(n - 2);
            let t = spec - i as f64;
            trace[i] + (trace[i + 1] - trace[i]) * t
        }
    }
}

/// All slits of one exposure, in processing order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlitTraceSet {
    pub nspec: usize,
    pub nspat: usize,
    pub slits: Vec<SlitTrace>,
}

impl SlitTraceSet {
    pub fn new(nspec: usize, nspat: usize, slits: Vec<SlitTrace>) -> Self {
        Self { nspec, nspat, slits }
    }

    pub fn spat_ids(&self) -> Vec<u32> {
        self.slits.iter().map(|s| s.spat_id).collect()
    }

    /// Detector image holding the `spat_id` of the slit covering each pixel,
    /// 0 outside every slit. A pixel belongs to a slit when its centre lies in
    /// `[left, right)`.
    pub fn slit_image(&self) -> Array2<u32> {
        let mut img = Array2::<u32>::zeros((self.nspec, self.nspat));
        for slit in &self.slits {
            for spec in 0..self.nspec {
                let left = slit.left_at(spec as f64);
                let right = slit.right_at(spec as f64);
                for spat in 0..self.nspat {
                    let x = spat as f64;
                    if x >= left && x < right {
                        img[[spec, spat]] = slit.spat_id;
                    }
                }
            }
        }
        img
    }

    /// `(min, max)` reference wavelength over all slits.
    pub fn wavelength_extrema(&self) -> Option<(f64, f64)> {
        self.slits.iter().fold(None, |acc, s| match acc {
            None => Some((s.wave_min, s.wave_max)),
            Some((lo, hi)) => Some((lo.min(s.wave_min), hi.max(s.wave_max))),
        })
    }
}

/// Mask the spectral ends of each slit where the tilt values are only
/// sampled by part of the slit width (`true` = good).
///
/// For each slit, pixels with a tilt below the largest tilt on the slit's
/// bottom row, or above the smallest tilt on its top row, are masked. Pixels
/// with a tilt of exactly zero are never good.
pub fn good_sky_mask(slit_image: &Array2<u32>, tilts: &TiltSurface) -> Array2<bool> {
    info!("Masking edge pixels where the sky model is poor");
    let tilt = tilts.data();
    let mut gpm = Array2::from_elem(slit_image.dim(), false);

    let mut ids: Vec<u32> = slit_image.iter().copied().filter(|&v| v > 0).collect();
    ids.sort_unstable();
    ids.dedup();

    for id in ids {
        let members: Vec<(usize, usize)> = slit_image
            .indexed_iter()
            .filter(|&((s, p), &v)| v == id && tilt.get([s, p]).is_some_and(|&t| t != 0.0))
            .map(|(idx, _)| idx)
            .collect();
        if members.is_empty() {
            continue;
        }
        let bottom = members.iter().map(|&(s, _)| s).min().unwrap_or(0);
        let top = members.iter().map(|&(s, _)| s).max().unwrap_or(0);

        let max_bottom = members
            .iter()
            .filter(|&&(s, _)| s == bottom)
            .map(|&(s, p)| tilt[[s, p]])
            .fold(f64::NEG_INFINITY, f64::max);
        let min_top = members
            .iter()
            .filter(|&&(s, _)| s == top)
            .map(|&(s, p)| tilt[[s, p]])
            .fold(f64::INFINITY, f64::min);

        for &(s, p) in &members {
            let t = tilt[[s, p]];
            gpm[[s, p]] = t >= max_bottom && t <= min_top;
        }
    }
    gpm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_slits() -> SlitTraceSet {
        SlitTraceSet::new(
            6,
            8,
            vec![
                SlitTrace::straight(3, 0.0, 4.0, 6, 4000.0, 7000.0),
                SlitTrace::straight(7, 4.0, 8.0, 6, 4100.0, 7200.0),
            ],
        )
    }

    #[test]
    fn test_slit_image_assigns_ids() {
        let img = two_slits().slit_image();
        assert_eq!(img[[0, 0]], 3);
        assert_eq!(img[[5, 3]], 3);
        assert_eq!(img[[2, 4]], 7);
        assert_eq!(img[[2, 7]], 7);
    }

    #[test]
    fn test_wavelength_extrema() {
        assert_eq!(two_slits().wavelength_extrema(), Some((4000.0, 7200.0)));
    }

    #[test]
    fn test_edge_interpolation() {
        let trace = SlitTrace {
            spat_id: 1,
            left: vec![0.0, 1.0, 2.0],
            right: vec![5.0, 5.0, 5.0],
            wave_min: 0.0,
            wave_max: 1.0,
        };
        assert!((trace.left_at(1.5) - 1.5).abs() < 1e-12);
        assert!((trace.left_at(3.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_good_sky_mask_flags_partially_sampled_ends() {
        let slits = two_slits();
        let img = slits.slit_image();
        // Tilted surface: tilt depends on the spatial position as well.
        let data = Array2::from_shape_fn((6, 8), |(s, p)| (s as f64 + 0.1 * p as f64 + 0.1) / 6.0);
        let tilts = TiltSurface::new(data);
        let gpm = good_sky_mask(&img, &tilts);
        // Bottom-left corner of each slit has the lowest tilt and is masked.
        assert!(!gpm[[0, 0]]);
        assert!(!gpm[[0, 4]]);
        // Rightmost column of the bottom row defines the threshold.
        assert!(gpm[[0, 3]]);
        // Interior rows are good.
        assert!(gpm[[3, 1]]);
        // Top-right corner exceeds the smallest top-row tilt.
        assert!(!gpm[[5, 3]]);
        assert!(gpm[[5, 0]]);
    }
}
