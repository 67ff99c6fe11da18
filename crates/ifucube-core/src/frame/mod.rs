//! Per-exposure collaborators used while resampling detector pixels.

pub mod astrometry;
pub mod dar;
pub mod slits;
pub mod tilts;

pub use astrometry::{AstrometricTransform, SlitAlignment};
pub use dar::{DarCorrection, DarCorrector, DarParams};
pub use slits::{good_sky_mask, SlitTrace, SlitTraceSet};
pub use tilts::TiltSurface;

use crate::error::{CubeError, Result};
use crate::pixels::PixelTable;

/// Everything needed to map one exposure's detector pixels onto the sky.
///
/// Contexts are owned by the caller and only read while resampling.
pub struct FrameContext {
    pub tilts: TiltSurface,
    pub slits: SlitTraceSet,
    pub astrometry: Box<dyn AstrometricTransform>,
    pub dar: Box<dyn DarCorrector>,
}

impl FrameContext {
    /// Context with slit-edge astrometry and no refraction correction.
    pub fn new(tilts: TiltSurface, slits: SlitTraceSet) -> Self {
        let astrometry = Box::new(SlitAlignment::new(slits.clone()));
        Self {
            tilts,
            slits,
            astrometry,
            dar: Box::new(DarCorrection::none()),
        }
    }

    pub fn with_dar(mut self, dar: Box<dyn DarCorrector>) -> Self {
        self.dar = dar;
        self
    }

    pub fn with_astrometry(mut self, astrometry: Box<dyn AstrometricTransform>) -> Self {
        self.astrometry = astrometry;
        self
    }
}

impl std::fmt::Debug for FrameContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameContext")
            .field("tilts", &self.tilts.dim())
            .field("slits", &self.slits.slits.len())
            .finish_non_exhaustive()
    }
}

/// Check that exactly one context exists per distinct frame index and that
/// every pixel's frame index addresses one of them.
pub fn check_contexts(pixels: &PixelTable, contexts: &[FrameContext]) -> Result<()> {
    let frames = pixels.frame_indices();
    if frames.len() != contexts.len() {
        return Err(CubeError::ContextCount {
            what: "frame contexts",
            expected: frames.len(),
            got: contexts.len(),
        });
    }
    if let Some(&frame) = frames.iter().find(|&&f| f >= contexts.len()) {
        return Err(CubeError::MissingFrameContext {
            frame,
            total: contexts.len(),
        });
    }
    Ok(())
}
