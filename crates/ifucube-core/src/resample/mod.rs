//! Subpixel resampling of detector pixels onto the voxel grid.

pub mod accumulator;
pub mod subpixel;

pub use accumulator::{CubeProducts, Deposit, VoxelAccumulator};
pub use subpixel::{subpixellate_slit, SlitJob, SubpixelGrid};

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::{DEFAULT_SUBPIXEL, PARALLEL_JOB_THRESHOLD};
use crate::error::Result;
use crate::frame::{check_contexts, FrameContext};
use crate::grid::{CubeWcs, VoxelEdges};
use crate::pixels::PixelTable;

/// Subpixellation settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubpixelOptions {
    /// Subpixels per detector pixel along the spectral axis.
    pub spec_subpixel: usize,
    /// Subpixels per detector pixel along the spatial axis.
    pub spat_subpixel: usize,
    /// Also accumulate the `sci * sqrt(ivar)` residual cube.
    pub debug: bool,
}

impl Default for SubpixelOptions {
    fn default() -> Self {
        Self {
            spec_subpixel: DEFAULT_SUBPIXEL,
            spat_subpixel: DEFAULT_SUBPIXEL,
            debug: false,
        }
    }
}

impl std::fmt::Display for SubpixelOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} subpixels", self.spec_subpixel, self.spat_subpixel)?;
        if self.debug {
            write!(f, " (+residuals)")?;
        }
        Ok(())
    }
}

/// Split the pixel table into one job per (frame, slit), frame-major and in
/// slit-trace order. Rows keep their table order within a job.
pub fn build_jobs(pixels: &PixelTable, contexts: &[FrameContext]) -> Vec<SlitJob> {
    let mut rows_by_slit: HashMap<(usize, u32), Vec<usize>> = HashMap::new();
    for i in 0..pixels.len() {
        rows_by_slit
            .entry((pixels.frame[i], pixels.slit_id[i]))
            .or_default()
            .push(i);
    }

    let mut jobs = Vec::new();
    for (frame, context) in contexts.iter().enumerate() {
        for (slit, trace) in context.slits.slits.iter().enumerate() {
            let rows = rows_by_slit
                .remove(&(frame, trace.spat_id))
                .unwrap_or_default();
            if rows.is_empty() {
                debug!(frame, spat_id = trace.spat_id, "No pixels on slit, skipping");
                continue;
            }
            jobs.push(SlitJob {
                frame,
                slit,
                spat_id: trace.spat_id,
                rows,
            });
        }
    }
    let orphaned: usize = rows_by_slit.values().map(Vec::len).sum();
    if orphaned > 0 {
        warn!(orphaned, "Pixels on slits unknown to their frame were ignored");
    }
    jobs
}

/// Accumulate weighted sums of every subpixel into a fresh voxel accumulator.
///
/// Slits are computed in parallel above a small job count; deposits are always
/// applied in job order so the result does not depend on the thread count.
pub fn accumulate(
    wcs: &CubeWcs,
    edges: &VoxelEdges,
    pixels: &PixelTable,
    contexts: &[FrameContext],
    options: &SubpixelOptions,
) -> Result<VoxelAccumulator> {
    pixels.validate()?;
    check_contexts(pixels, contexts)?;
    let grid = SubpixelGrid::new(options.spec_subpixel, options.spat_subpixel)?;

    let jobs = build_jobs(pixels, contexts);
    let mut acc = VoxelAccumulator::new(edges.shape(), options.debug);
    info!(
        jobs = jobs.len(),
        pixels = pixels.len(),
        subpixels = grid.count(),
        "Subpixellating"
    );

    let run = |job: &SlitJob| {
        subpixellate_slit(
            job,
            pixels,
            &contexts[job.frame],
            wcs,
            edges,
            &grid,
            options.debug,
        )
    };

    if jobs.len() >= PARALLEL_JOB_THRESHOLD {
        let chunk = rayon::current_num_threads().max(1);
        for batch in jobs.chunks(chunk) {
            let results: Vec<Result<Vec<Deposit>>> = batch.par_iter().map(run).collect();
            for deposits in results {
                deposits?.iter().for_each(|d| acc.deposit(d));
            }
        }
    } else {
        for job in &jobs {
            run(job)?.iter().for_each(|d| acc.deposit(d));
        }
    }
    Ok(acc)
}

/// Resample all pixels onto the grid and normalise.
pub fn subpixellate(
    wcs: &CubeWcs,
    edges: &VoxelEdges,
    pixels: &PixelTable,
    contexts: &[FrameContext],
    options: &SubpixelOptions,
) -> Result<CubeProducts> {
    Ok(accumulate(wcs, edges, pixels, contexts, options)?.finalize())
}
