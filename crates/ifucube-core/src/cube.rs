//! Output datacube.

use ndarray::{Array2, Array3};
use tracing::info;

use crate::error::{CubeError, Result};
use crate::extract::make_whitelight_fromcube;
use crate::frame::FrameContext;
use crate::grid::{whitelight_range, CubeWcs, VoxelEdges, WaveRange};
use crate::pixels::{min_max, PixelTable};
use crate::resample::{subpixellate, SubpixelOptions};

/// Resampled cube of shape `(nra, ndec, nwave)` with its grid.
#[derive(Clone, Debug)]
pub struct DataCube {
    pub flux: Array3<f64>,
    /// Standard deviation of `flux`.
    pub sigma: Array3<f64>,
    /// 1 where no pixel contributed.
    pub bpm: Array3<u8>,
    /// Wavelength of each spectral channel in Angstrom.
    pub wave: Vec<f64>,
    pub wcs: CubeWcs,
    /// `sci * sqrt(ivar)` residual cube, when requested.
    pub residual: Option<Array3<f64>>,
}

impl DataCube {
    pub fn shape(&self) -> (usize, usize, usize) {
        self.flux.dim()
    }

    /// Whitelight image over `range`; open ends default to the cube's own
    /// wavelength extremes.
    pub fn whitelight(&self, range: &WaveRange) -> Result<Array2<f64>> {
        if range.is_open() {
            return make_whitelight_fromcube(&self.flux, None, None, None);
        }
        let (lo, hi) = min_max(&self.wave).ok_or(CubeError::MissingWavelengths)?;
        let (wmin, wmax) = whitelight_range(lo, hi, range);
        make_whitelight_fromcube(&self.flux, Some(&self.wave), Some(wmin), Some(wmax))
    }

    /// Number of voxels without any contribution.
    pub fn empty_voxels(&self) -> usize {
        self.bpm.iter().filter(|&&b| b != 0).count()
    }
}

/// Resample pixels onto the grid and package the normalised cube.
pub fn generate_cube_subpixel(
    wcs: &CubeWcs,
    edges: &VoxelEdges,
    pixels: &PixelTable,
    contexts: &[FrameContext],
    options: &SubpixelOptions,
) -> Result<DataCube> {
    let products = subpixellate(wcs, edges, pixels, contexts, options)?;
    let (_, _, nwave) = products.flux.dim();
    let cube = DataCube {
        sigma: products.var.mapv(f64::sqrt),
        flux: products.flux,
        bpm: products.bpm,
        wave: wcs.wavelengths(nwave),
        wcs: wcs.clone(),
        residual: products.resid,
    };
    info!(
        shape = ?cube.shape(),
        empty = cube.empty_voxels(),
        "Datacube generated"
    );
    Ok(cube)
}
