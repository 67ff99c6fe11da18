use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::cube::{generate_cube_subpixel, DataCube};
use crate::error::{CubeError, Result};
use crate::frame::FrameContext;
use crate::grid::{create_wcs, set_voxel_sampling, NativeScale};
use crate::io::bundle::FrameBundle;
use crate::io::cube_file::{write_cube, write_primary_cube};
use crate::io::fits::{write_image, FitsHeader};
use crate::io::naming::{output_filename, residual_filename, whitelight_filename};
use crate::pixels::PixelTable;
use crate::weights::compute_weights_frompix;

use super::config::CoaddConfig;
use super::types::{CoaddOutput, NoOpReporter, PipelineStage, ProgressReporter};

/// Pixels and contexts of all frames, with the per-frame metadata the
/// pipeline needs after the bundles are consumed.
struct FrameSet {
    pixels: PixelTable,
    contexts: Vec<FrameContext>,
    names: Vec<String>,
    scales: Vec<NativeScale>,
}

fn load_frames(bundles: Vec<FrameBundle>, reporter: &Arc<dyn ProgressReporter>) -> Result<FrameSet> {
    let n = bundles.len();
    reporter.begin_stage(PipelineStage::Loading, Some(n));

    let mut set = FrameSet {
        pixels: PixelTable::new(),
        contexts: Vec::with_capacity(n),
        names: Vec::with_capacity(n),
        scales: Vec::with_capacity(n),
    };
    let mut ifu_ra = Vec::with_capacity(n);
    let mut ifu_dec = Vec::with_capacity(n);
    let mut ra_offset = Vec::with_capacity(n);
    let mut dec_offset = Vec::with_capacity(n);

    for (frame, bundle) in bundles.into_iter().enumerate() {
        set.names.push(bundle.name.clone());
        set.scales.push(bundle.scale);
        ifu_ra.push(bundle.ifu_ra);
        ifu_dec.push(bundle.ifu_dec);
        ra_offset.push(bundle.ra_offset);
        dec_offset.push(bundle.dec_offset);

        let (pixels, context) = bundle.into_parts()?;
        if pixels.is_empty() {
            return Err(CubeError::Pipeline(format!("frame {frame} has no pixels")));
        }
        set.pixels.append_frame(&pixels, frame);
        set.contexts.push(context);
        reporter.advance(frame + 1);
    }
    reporter.finish_stage();

    if ra_offset.iter().chain(&dec_offset).any(|&o| o != 0.0) {
        reporter.begin_stage(PipelineStage::Aligning, None);
        set.pixels.align_user_offsets(&ifu_ra, &ifu_dec, &ra_offset, &dec_offset)?;
        reporter.finish_stage();
    }
    Ok(set)
}

/// Run the coadd with no progress reporting.
pub fn run_coadd(config: &CoaddConfig, bundles: Vec<FrameBundle>) -> Result<Vec<CoaddOutput>> {
    run_coadd_reported(config, bundles, Arc::new(NoOpReporter))
}

/// Build and write datacubes from reduced frames.
///
/// Combined mode derives optimal weights when more than one frame is given
/// and writes a single cube; otherwise every frame gets its own grid and cube.
pub fn run_coadd_reported(
    config: &CoaddConfig,
    bundles: Vec<FrameBundle>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<Vec<CoaddOutput>> {
    config.validate()?;
    if bundles.is_empty() {
        return Err(CubeError::EmptyInput);
    }
    let mut set = load_frames(bundles, &reporter)?;
    let nframes = set.contexts.len();
    info!(frames = nframes, pixels = set.pixels.len(), "Frames loaded");

    reporter.begin_stage(PipelineStage::Sampling, None);
    let (dspat, dwv) = set_voxel_sampling(&set.scales, config.spatial_scale_deg(), config.wave_delta)?;
    reporter.finish_stage();

    let user_output = config.output.to_string_lossy().into_owned();

    if config.combine {
        if nframes > 1 {
            reporter.begin_stage(PipelineStage::Weighting, None);
            let weights = compute_weights_frompix(
                &set.pixels,
                &set.contexts,
                dspat,
                dwv,
                &config.grid_options(),
                &config.whitelight_range,
                &config.weight_options(),
            )?;
            set.pixels.weight = weights;
            reporter.finish_stage();
        }
        let outfile = output_filename(&set.names[0], &user_output, true, 0);
        let output = build_and_write(config, &set.pixels, &set.contexts, dspat, dwv, &outfile, &reporter)?;
        return Ok(vec![output]);
    }

    let mut outputs = Vec::with_capacity(nframes);
    for (frame, context) in set.contexts.iter().enumerate() {
        let outfile = output_filename(&set.names[frame], &user_output, false, frame + 1);
        if outfile.is_empty() {
            return Err(CubeError::InvalidConfig(format!(
                "frame {frame} has no name; set an output file name"
            )));
        }
        let mut single = PixelTable::new();
        single.append_frame(&set.pixels.subset(&set.pixels.frame_rows(frame)), 0);
        let output = build_and_write(
            config,
            &single,
            std::slice::from_ref(context),
            dspat,
            dwv,
            &outfile,
            &reporter,
        )?;
        outputs.push(output);
    }
    Ok(outputs)
}

/// Grid, resample and write one cube with its companions.
fn build_and_write(
    config: &CoaddConfig,
    pixels: &PixelTable,
    contexts: &[FrameContext],
    dspat: f64,
    dwv: f64,
    outfile: &str,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<CoaddOutput> {
    reporter.begin_stage(PipelineStage::BuildingGrid, None);
    let grid = create_wcs(&pixels.ra, &pixels.dec, &pixels.wave, dspat, dwv, &config.grid_options())?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Resampling, None);
    let cube = generate_cube_subpixel(&grid.wcs, &grid.edges, pixels, contexts, &config.subpixel_options())?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Writing, None);
    let output = write_products(config, &cube, contexts.len(), outfile)?;
    reporter.finish_stage();
    Ok(output)
}

fn write_products(config: &CoaddConfig, cube: &DataCube, frames: usize, outfile: &str) -> Result<CoaddOutput> {
    let mut header = FitsHeader::new();
    header.set_int("NFRAMES", frames as i64);
    header.set_int("SPECSUB", config.spec_subpixel as i64);
    header.set_int("SPATSUB", config.spat_subpixel as i64);

    let cube_path = PathBuf::from(outfile);
    write_cube(&cube_path, cube, &header)?;

    let residual = match &cube.residual {
        Some(resid) => {
            let path = PathBuf::from(residual_filename(outfile));
            info!(path = %path.display(), "Saving residuals datacube");
            write_primary_cube(&path, resid, &cube.wcs)?;
            Some(path)
        }
        None => None,
    };

    let whitelight = if config.save_whitelight {
        let path = PathBuf::from(whitelight_filename(outfile));
        save_whitelight(config, cube, &path)?;
        Some(path)
    } else {
        None
    };

    Ok(CoaddOutput {
        cube: cube_path,
        whitelight,
        residual,
        shape: cube.shape(),
        empty_voxels: cube.empty_voxels(),
        frames,
    })
}

fn save_whitelight(config: &CoaddConfig, cube: &DataCube, path: &Path) -> Result<()> {
    let image = match cube.whitelight(&config.whitelight_range) {
        Ok(image) => image,
        Err(CubeError::EmptyWavelengthRange { min, max }) => {
            warn!(min, max, "Whitelight window misses the cube, using the full range");
            cube.whitelight(&Default::default())?
        }
        Err(e) => return Err(e),
    };
    info!(path = %path.display(), "Saving white light image");
    write_image(path, &image, &cube.wcs, &FitsHeader::new())
}
