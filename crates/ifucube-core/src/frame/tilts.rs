use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{CubeError, Result};

/// Fractional spectral position of every detector pixel, shape `(nspec, nspat)`.
///
/// Values run from 0 at the first spectral row to 1 at the last and follow
/// the curvature of the slit image on the detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TiltSurface {
    data: Array2<f64>,
}

impl TiltSurface {
    pub fn new(data: Array2<f64>) -> Self {
        Self { data }
    }

    /// Surface for a detector whose arc lines run exactly along the spatial axis.
    pub fn untilted(nspec: usize, nspat: usize) -> Self {
        let denom = nspec.saturating_sub(1).max(1) as f64;
        let data = Array2::from_shape_fn((nspec, nspat), |(s, _)| s as f64 / denom);
        Self { data }
    }

    /// `(nspec, nspat)`.
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn nspec(&self) -> usize {
        self.data.nrows()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn tilt(&self, spec: usize, spat: usize) -> Option<f64> {
        self.data.get([spec, spat]).copied()
    }

    /// Like [`tilt`](Self::tilt) but reports positions off the detector as an error.
    pub fn tilt_checked(&self, spec: usize, spat: usize) -> Result<f64> {
        self.tilt(spec, spat).ok_or_else(|| {
            let (nspec, nspat) = self.dim();
            CubeError::DetectorOutOfBounds {
                spec,
                spat,
                nspec,
                nspat,
            }
        })
    }
}
