use serde::{Deserialize, Serialize};

use crate::consts::{ANGSTROM_TO_METRE, DEFAULT_EQUINOX};

/// Regular three-axis world coordinate system of the output grid.
///
/// Axis 0 is RA, axis 1 Dec (both degrees), axis 2 wavelength in metres.
/// Pixel coordinates are 0-based. The celestial axes are a small-field
/// linearisation about `dec_ref`: one RA step spans `cdelt[0] / cos(dec_ref)`
/// degrees so that spaxels are square on the sky.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CubeWcs {
    pub crval: [f64; 3],
    pub cdelt: [f64; 3],
    pub crpix: [f64; 3],
    /// Declination (degrees) at which RA offsets are compressed by `cos(dec)`.
    pub dec_ref: f64,
    pub equinox: f64,
    pub name: String,
}

impl CubeWcs {
    /// Grid with reference pixel 0 at `crval`.
    ///
    /// `crval` and `cdelt` take the wavelength in Angstrom.
    pub fn new(crval: [f64; 3], cdelt: [f64; 3], dec_ref: f64, equinox: f64, name: &str) -> Self {
        Self {
            crval: [crval[0], crval[1], crval[2] * ANGSTROM_TO_METRE],
            cdelt: [cdelt[0], cdelt[1], cdelt[2] * ANGSTROM_TO_METRE],
            crpix: [0.0; 3],
            dec_ref,
            equinox,
            name: name.to_string(),
        }
    }

    fn cos_ref(&self) -> f64 {
        self.dec_ref.to_radians().cos()
    }

    /// Continuous pixel coordinates of a world position; `wave` in metres.
    pub fn world_to_pixel(&self, ra: f64, dec: f64, wave: f64) -> [f64; 3] {
        let dra = wrap_degrees(ra - self.crval[0]);
        [
            self.crpix[0] + dra * self.cos_ref() / self.cdelt[0],
            self.crpix[1] + (dec - self.crval[1]) / self.cdelt[1],
            self.crpix[2] + (wave - self.crval[2]) / self.cdelt[2],
        ]
    }

    /// World position `(ra, dec, wave_metres)` of a pixel coordinate.
    pub fn pixel_to_world(&self, x: f64, y: f64, z: f64) -> [f64; 3] {
        let cos_ref = self.cos_ref();
        let dra = if cos_ref == 0.0 {
            0.0
        } else {
            (x - self.crpix[0]) * self.cdelt[0] / cos_ref
        };
        [
            self.crval[0] + dra,
            self.crval[1] + (y - self.crpix[1]) * self.cdelt[1],
            self.crval[2] + (z - self.crpix[2]) * self.cdelt[2],
        ]
    }

    /// Wavelengths in Angstrom of the first `n` spectral pixels.
    pub fn wavelengths(&self, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (self.crval[2] + (i as f64 - self.crpix[2]) * self.cdelt[2]) / ANGSTROM_TO_METRE)
            .collect()
    }

    /// Spectral step in Angstrom.
    pub fn wave_step(&self) -> f64 {
        self.cdelt[2] / ANGSTROM_TO_METRE
    }

    /// Copy keeping the celestial axes and replacing the spectral axis
    /// (Angstrom).
    pub fn with_spectral(&self, crval: f64, cdelt: f64) -> Self {
        let mut out = self.clone();
        out.crval[2] = crval * ANGSTROM_TO_METRE;
        out.cdelt[2] = cdelt * ANGSTROM_TO_METRE;
        out.crpix[2] = 0.0;
        out
    }

    /// Solid angle of one spaxel in square arcseconds.
    pub fn spaxel_area_arcsec2(&self) -> f64 {
        (self.cdelt[0] * 3600.0 * self.cdelt[1] * 3600.0).abs()
    }
}

impl Default for CubeWcs {
    fn default() -> Self {
        Self::new([0.0; 3], [1.0; 3], 0.0, DEFAULT_EQUINOX, "IFU_SPEC")
    }
}

/// Wrap an angle difference into `[-180, 180)` degrees.
fn wrap_degrees(d: f64) -> f64 {
    (d + 180.0).rem_euclid(360.0) - 180.0
}

/// Bins of one axis: edges at `-0.5, 0.5, ..., n - 0.5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisBins {
    pub n: usize,
}

impl AxisBins {
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    pub fn edges(&self) -> Vec<f64> {
        (0..=self.n).map(|i| i as f64 - 0.5).collect()
    }

    /// Bin holding `coord`; every bin is half-open `[lo, hi)`.
    #[inline]
    pub fn index(&self, coord: f64) -> Option<usize> {
        let shifted = coord + 0.5;
        if shifted >= 0.0 && shifted < self.n as f64 {
            Some(shifted.floor() as usize)
        } else {
            None
        }
    }
}

/// Bin edges of the three output axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelEdges {
    pub x: AxisBins,
    pub y: AxisBins,
    pub z: AxisBins,
}

impl VoxelEdges {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            x: AxisBins::new(nx),
            y: AxisBins::new(ny),
            z: AxisBins::new(nz),
        }
    }

    /// `(nx, ny, nz)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.x.n, self.y.n, self.z.n)
    }

    /// Voxel holding a continuous pixel coordinate, `None` outside the grid.
    #[inline]
    pub fn index(&self, coord: [f64; 3]) -> Option<(usize, usize, usize)> {
        Some((
            self.x.index(coord[0])?,
            self.y.index(coord[1])?,
            self.z.index(coord[2])?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_world_pixel_round_trip() {
        let wcs = CubeWcs::new([150.0, 30.0, 4000.0], [1e-4, 1e-4, 0.5], 30.0, 2000.0, "T");
        let [x, y, z] = wcs.world_to_pixel(150.001, 30.002, 4010.0e-10);
        assert_abs_diff_eq!(x, 10.0 * (30f64).to_radians().cos(), epsilon = 1e-6);
        assert_abs_diff_eq!(y, 20.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z, 20.0, epsilon = 1e-6);
        let [ra, dec, wave] = wcs.pixel_to_world(x, y, z);
        assert_abs_diff_eq!(ra, 150.001, epsilon = 1e-10);
        assert_abs_diff_eq!(dec, 30.002, epsilon = 1e-10);
        assert_abs_diff_eq!(wave, 4010.0e-10, epsilon = 1e-18);
    }

    #[test]
    fn test_ra_wraps_at_zero() {
        let wcs = CubeWcs::new([359.99, 0.0, 5000.0], [0.01, 0.01, 1.0], 0.0, 2000.0, "T");
        let [x, _, _] = wcs.world_to_pixel(0.01, 0.0, 5000.0e-10);
        assert_abs_diff_eq!(x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wavelengths_in_angstrom() {
        let wcs = CubeWcs::new([0.0, 0.0, 5000.0], [1.0, 1.0, 2.5], 0.0, 2000.0, "T");
        let wave = wcs.wavelengths(3);
        assert_abs_diff_eq!(wave[0], 5000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(wave[2], 5005.0, epsilon = 1e-9);
    }

    #[test]
    fn test_axis_bins_edges() {
        let bins = AxisBins::new(3);
        assert_eq!(bins.edges(), vec![-0.5, 0.5, 1.5, 2.5]);
        assert_eq!(bins.index(-0.5), Some(0));
        assert_eq!(bins.index(0.49), Some(0));
        assert_eq!(bins.index(0.5), Some(1));
        assert_eq!(bins.index(2.49), Some(2));
        assert_eq!(bins.index(2.5), None);
        assert_eq!(bins.index(-0.51), None);
    }
}
