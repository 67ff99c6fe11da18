use ndarray::{s, Array2, Array3, Axis};
use tracing::info;

use crate::error::{CubeError, Result};
use crate::frame::{check_contexts, FrameContext};
use crate::grid::{CubeWcs, VoxelEdges};
use crate::pixels::PixelTable;
use crate::resample::{subpixellate, SubpixelOptions};

/// Collapse a cube `(nx, ny, nwave)` along wavelength.
///
/// Each spaxel is the sum over the selected channels divided by the number of
/// non-zero channels (1 when all are zero). A wavelength cut needs `wave`;
/// a missing end defaults to the corresponding extreme of `wave`, and the
/// selection runs from the first to the last channel inside the window.
pub fn make_whitelight_fromcube(
    cube: &Array3<f64>,
    wave: Option<&[f64]>,
    wavemin: Option<f64>,
    wavemax: Option<f64>,
) -> Result<Array2<f64>> {
    let nwave = cube.len_of(Axis(2));
    let mut lo = 0;
    let mut hi = nwave;

    if wavemin.is_some() || wavemax.is_some() {
        let wave = wave.ok_or(CubeError::MissingWavelengths)?;
        if wave.len() != nwave {
            return Err(CubeError::InvalidConfig(format!(
                "wavelength vector has {} entries but the cube has {nwave} channels",
                wave.len()
            )));
        }
        let wmin = wavemin.unwrap_or_else(|| wave.iter().copied().fold(f64::INFINITY, f64::min));
        let wmax = wavemax.unwrap_or_else(|| wave.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        let inside: Vec<usize> = (0..nwave)
            .filter(|&k| wave[k] >= wmin && wave[k] <= wmax)
            .collect();
        match (inside.first(), inside.last()) {
            (Some(&first), Some(&last)) => {
                lo = first;
                hi = last + 1;
            }
            _ => return Err(CubeError::EmptyWavelengthRange { min: wmin, max: wmax }),
        }
    }

    let cut = cube.slice(s![.., .., lo..hi]);
    let sum = cut.sum_axis(Axis(2));
    let count = cut.map_axis(Axis(2), |lane| lane.iter().filter(|&&v| v != 0.0).count());
    Ok(ndarray::Zip::from(&sum)
        .and(&count)
        .map_collect(|&s, &n| s / n.max(1) as f64))
}

/// Whitelight images resampled directly from pixels onto a grid whose
/// spectral axis has a single bin.
///
/// With `combine`, all frames go into one image; otherwise one image per
/// frame, each built from that frame's pixels and context only.
pub fn generate_image_subpixel(
    wcs: &CubeWcs,
    edges: &VoxelEdges,
    pixels: &PixelTable,
    contexts: &[FrameContext],
    options: &SubpixelOptions,
    combine: bool,
) -> Result<Vec<Array2<f64>>> {
    if edges.z.n == 0 {
        return Err(CubeError::InvalidConfig("image grid has no spectral bin".into()));
    }
    check_contexts(pixels, contexts)?;

    if combine {
        info!("Creating combined image");
        let products = subpixellate(wcs, edges, pixels, contexts, options)?;
        return Ok(vec![products.flux.index_axis(Axis(2), 0).to_owned()]);
    }

    let nframes = contexts.len();
    let mut images = Vec::with_capacity(nframes);
    for (frame, context) in contexts.iter().enumerate() {
        info!(image = frame + 1, total = nframes, "Creating image");
        let mut single = PixelTable::new();
        single.append_frame(&pixels.subset(&pixels.frame_rows(frame)), 0);
        let products = subpixellate(wcs, edges, &single, std::slice::from_ref(context), options)?;
        images.push(products.flux.index_axis(Axis(2), 0).to_owned());
    }
    Ok(images)
}
