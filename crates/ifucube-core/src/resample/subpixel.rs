//! Per-slit subpixellation: maps every subpixel of every detector pixel of
//! one slit to a voxel of the output grid.

use crate::consts::ANGSTROM_TO_METRE;
use crate::error::{CubeError, Result};
use crate::frame::FrameContext;
use crate::grid::{CubeWcs, VoxelEdges};
use crate::math::interp::LinearInterp;
use crate::math::safe_inverse;
use crate::pixels::PixelTable;

use super::accumulator::Deposit;

/// Regular sub-grid of offsets, in pixels, from the centre of a detector pixel.
///
/// Offsets are `(k + 0.5) / n - 0.5` for `k = 0..n`, strictly inside
/// `(-0.5, 0.5)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SubpixelGrid {
    pub spec_offsets: Vec<f64>,
    pub spat_offsets: Vec<f64>,
}

impl SubpixelGrid {
    pub fn new(spec_subpixel: usize, spat_subpixel: usize) -> Result<Self> {
        if spec_subpixel == 0 || spat_subpixel == 0 {
            return Err(CubeError::InvalidConfig(format!(
                "subpixel factors must be at least 1 (spectral {spec_subpixel}, spatial {spat_subpixel})"
            )));
        }
        Ok(Self {
            spec_offsets: offsets(spec_subpixel),
            spat_offsets: offsets(spat_subpixel),
        })
    }

    pub fn count(&self) -> usize {
        self.spec_offsets.len() * self.spat_offsets.len()
    }

    /// Fraction of a detector pixel covered by one subpixel.
    pub fn area(&self) -> f64 {
        1.0 / self.count() as f64
    }
}

fn offsets(n: usize) -> Vec<f64> {
    (0..n).map(|k| (k as f64 + 0.5) / n as f64 - 0.5).collect()
}

/// One unit of resampling work: all pixels of one slit of one frame.
#[derive(Clone, Debug)]
pub struct SlitJob {
    pub frame: usize,
    /// Position of the slit in the frame's trace set.
    pub slit: usize,
    pub spat_id: u32,
    /// Pixel-table rows of this slit, in table order.
    pub rows: Vec<usize>,
}

/// Compute the voxel deposits of one slit.
///
/// Subpixels are visited pixel by pixel, spectral offset outer and spatial
/// offset inner. Subpixels landing outside the grid are dropped.
pub fn subpixellate_slit(
    job: &SlitJob,
    pixels: &PixelTable,
    context: &FrameContext,
    wcs: &CubeWcs,
    edges: &VoxelEdges,
    grid: &SubpixelGrid,
    with_residuals: bool,
) -> Result<Vec<Deposit>> {
    let rows = &job.rows;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let nspec_scale = context.slits.nspec.saturating_sub(1) as f64;

    // Spectral position along the tilt of each parent pixel, in detector rows.
    let yspl = rows
        .iter()
        .map(|&i| {
            context
                .tilts
                .tilt_checked(pixels.spec_pos[i], pixels.spat_pos[i])
                .map(|t| t * nspec_scale)
        })
        .collect::<Result<Vec<f64>>>()?;
    let wave: Vec<f64> = rows.iter().map(|&i| pixels.wave[i]).collect();
    let wave_interp = LinearInterp::new(&yspl, &wave)
        .ok_or_else(|| CubeError::Pipeline(format!("slit {} has no wavelength samples", job.spat_id)))?;

    let parent_pos: Vec<f64> = rows
        .iter()
        .map(|&i| {
            context
                .astrometry
                .transform(job.slit, pixels.spat_pos[i] as f64, pixels.spec_pos[i] as f64)
        })
        .collect();
    let ra: Vec<f64> = rows.iter().map(|&i| pixels.ra[i]).collect();
    let dec: Vec<f64> = rows.iter().map(|&i| pixels.dec[i]).collect();
    let ra_interp = LinearInterp::new(&parent_pos, &ra)
        .ok_or_else(|| CubeError::Pipeline(format!("slit {} has no RA samples", job.spat_id)))?;
    let dec_interp = LinearInterp::new(&parent_pos, &dec)
        .ok_or_else(|| CubeError::Pipeline(format!("slit {} has no Dec samples", job.spat_id)))?;

    let area = grid.area();
    let mut deposits = Vec::with_capacity(rows.len() * grid.count());

    for (k, &i) in rows.iter().enumerate() {
        let w_sub = pixels.weight[i] * area;
        let sci = pixels.sci[i];
        let ivar = pixels.ivar[i];
        let flux = sci * w_sub;
        let var = safe_inverse(ivar) * w_sub * w_sub;
        let resid = if with_residuals { sci * ivar.max(0.0).sqrt() } else { 0.0 };
        let spat = pixels.spat_pos[i] as f64;
        let spec = pixels.spec_pos[i] as f64;

        for &dy in &grid.spec_offsets {
            let sub_wave = wave_interp.eval(yspl[k] + dy);
            let (dra, ddec) = context.dar.correction(sub_wave);
            let spec_yy = spec + dy;

            for &dx in &grid.spat_offsets {
                let pos = context.astrometry.transform(job.slit, spat + dx, spec_yy);
                let sub_ra = ra_interp.eval(pos) + dra;
                let sub_dec = dec_interp.eval(pos) + ddec;
                let coord = wcs.world_to_pixel(sub_ra, sub_dec, sub_wave * ANGSTROM_TO_METRE);
                if let Some(voxel) = edges.index(coord) {
                    deposits.push(Deposit {
                        voxel,
                        flux,
                        var,
                        norm: w_sub,
                        resid,
                    });
                }
            }
        }
    }
    Ok(deposits)
}
