//! JSON interchange for one reduced exposure.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CubeError, Result};
use crate::frame::{DarCorrection, DarParams, FrameContext, SlitTraceSet, TiltSurface};
use crate::grid::NativeScale;
use crate::math::interp::LinearInterp;
use crate::pixels::PixelTable;

/// Sampled flux-calibration curve: `sci` is multiplied by `sens(wave)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SensitivityCurve {
    pub wave: Vec<f64>,
    pub sens: Vec<f64>,
}

/// Pixels of one exposure together with everything needed to place them on
/// the sky.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameBundle {
    /// Input identifier, used to derive per-frame output names.
    #[serde(default)]
    pub name: String,
    pub pixels: PixelTable,
    pub tilts: TiltSurface,
    pub slits: SlitTraceSet,
    pub scale: NativeScale,
    #[serde(default)]
    pub dar: Option<DarParams>,
    /// IFU pointing in degrees.
    #[serde(default)]
    pub ifu_ra: f64,
    #[serde(default)]
    pub ifu_dec: f64,
    /// User offsets in arcsec.
    #[serde(default)]
    pub ra_offset: f64,
    #[serde(default)]
    pub dec_offset: f64,
    #[serde(default)]
    pub sensitivity: Option<SensitivityCurve>,
}

impl FrameBundle {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let bundle: FrameBundle = serde_json::from_reader(reader)?;
        bundle.pixels.validate()?;
        info!(path = %path.display(), pixels = bundle.pixels.len(), "Loaded frame bundle");
        Ok(bundle)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Flux-calibrated pixel table and frame context.
    pub fn into_parts(self) -> Result<(PixelTable, FrameContext)> {
        let mut pixels = self.pixels;
        if let Some(curve) = &self.sensitivity {
            let interp = LinearInterp::new(&curve.wave, &curve.sens).ok_or_else(|| {
                CubeError::InvalidConfig(format!("sensitivity curve of '{}' is empty or ragged", self.name))
            })?;
            pixels.apply_sensitivity(|w| interp.eval(w));
        }
        let mut context = FrameContext::new(self.tilts, self.slits);
        if let Some(params) = self.dar {
            context = context.with_dar(Box::new(DarCorrection::new(params)));
        }
        Ok((pixels, context))
    }
}
