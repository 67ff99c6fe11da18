mod common;

use approx::assert_abs_diff_eq;
use common::{padded_bounds, SyntheticFrame, DSPAT, DWAVE};
use ifucube_core::cube::{generate_cube_subpixel, DataCube};
use ifucube_core::grid::{create_wcs, GridOptions};
use ifucube_core::io::bundle::{FrameBundle, SensitivityCurve};
use ifucube_core::io::cube_file::{read_cube, write_cube};
use ifucube_core::io::fits::{load_image_wcs, write_image, FitsHeader, FitsReader};
use ifucube_core::io::image_io::save_preview;
use ifucube_core::resample::SubpixelOptions;
use tempfile::TempDir;

fn small_cube() -> DataCube {
    let frame = SyntheticFrame {
        background: 1.0,
        ivar: 4.0,
        ..SyntheticFrame::default()
    };
    let pixels = frame.pixels_with(0, |k, c, s| (k + c + s) as f64);
    let options = GridOptions {
        bounds: padded_bounds(&pixels, 1.0),
        ..GridOptions::default()
    };
    let grid = create_wcs(&pixels.ra, &pixels.dec, &pixels.wave, DSPAT, DWAVE, &options).unwrap();
    let sub = SubpixelOptions {
        spec_subpixel: 2,
        spat_subpixel: 2,
        debug: false,
    };
    generate_cube_subpixel(&grid.wcs, &grid.edges, &pixels, &[frame.context()], &sub).unwrap()
}

#[test]
fn test_cube_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cube.fits");
    let cube = small_cube();
    let mut extra = FitsHeader::new();
    extra.set_int("NFRAMES", 1);
    write_cube(&path, &cube, &extra).unwrap();

    let back = read_cube(&path).unwrap();
    assert_eq!(back.shape(), cube.shape());
    assert_eq!(back.flux, cube.flux);
    assert_eq!(back.sigma, cube.sigma);
    assert_eq!(back.bpm, cube.bpm);
    assert_eq!(back.wave.len(), cube.wave.len());
    for (a, b) in back.wave.iter().zip(&cube.wave) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
    assert_abs_diff_eq!(back.wcs.crval[0], cube.wcs.crval[0], epsilon = 1e-12);
    assert_abs_diff_eq!(back.wcs.cdelt[1], cube.wcs.cdelt[1], epsilon = 1e-15);

    let reader = FitsReader::open(&path).unwrap();
    assert_eq!(reader.hdu_count().unwrap(), 4);
    let flux = reader.find("FLUX").unwrap();
    assert_eq!(reader.header(flux).unwrap().get_int("NFRAMES"), Some(1));
    assert!(reader.find("SIG").is_some());
    assert!(reader.find("BPM").is_some());
}

#[test]
fn test_damaged_cube_files_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cube.fits");
    write_cube(&path, &small_cube(), &FitsHeader::new()).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let truncated = dir.path().join("truncated.fits");
    std::fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();
    assert!(read_cube(&truncated).is_err());

    let text = dir.path().join("notes.fits");
    std::fs::write(&text, "wave,flux\n5000,1.0\n").unwrap();
    assert!(read_cube(&text).is_err());
    assert!(FitsReader::open(&text).is_err());
}

#[test]
fn test_sigma_is_sqrt_of_variance() {
    let cube = small_cube();
    // Interior voxels collect the four subpixels of one pixel with ivar 4,
    // each carrying a quarter of its weight: var = 4 * (1/4) / 16.
    assert_abs_diff_eq!(cube.sigma[[3, 3, 5]], 0.25, epsilon = 1e-12);
    assert_eq!(cube.bpm[[3, 3, 5]], 0);
    assert_eq!(cube.wave.len(), cube.shape().2);
}

#[test]
fn test_whitelight_image_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("white.fits");
    let cube = small_cube();
    let image = cube.whitelight(&Default::default()).unwrap();
    write_image(&path, &image, &cube.wcs, &FitsHeader::new()).unwrap();

    let (back, wcs) = load_image_wcs(&path).unwrap();
    assert_eq!(back, image);
    assert_abs_diff_eq!(wcs.crval[1], cube.wcs.crval[1], epsilon = 1e-12);
    assert_abs_diff_eq!(wcs.dec_ref, cube.wcs.dec_ref, epsilon = 1e-12);
}

#[test]
fn test_preview_formats() {
    let dir = TempDir::new().unwrap();
    let image = small_cube().whitelight(&Default::default()).unwrap();
    let (nx, ny) = image.dim();
    for name in ["white.png", "white.tiff"] {
        let path = dir.path().join(name);
        save_preview(&image, &path).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width() as usize, img.height() as usize), (nx, ny));
    }
}

#[test]
fn test_bundle_round_trip_with_sensitivity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("spec2d_a.json");
    let frame = SyntheticFrame::default();
    let mut bundle = frame.bundle("spec2d_a.fits", frame.pixels_with(0, |_, _, _| 3.0));
    bundle.sensitivity = Some(SensitivityCurve {
        wave: vec![4000.0, 6000.0],
        sens: vec![2.0, 2.0],
    });
    bundle.ra_offset = 0.5;
    bundle.save(&path).unwrap();

    let loaded = FrameBundle::load(&path).unwrap();
    assert_eq!(loaded.name, "spec2d_a.fits");
    assert_eq!(loaded.pixels.len(), bundle.pixels.len());
    assert_eq!(loaded.ra_offset, 0.5);
    assert_eq!(loaded.tilts.dim(), (frame.nspec, frame.nspat()));

    let (pixels, context) = loaded.into_parts().unwrap();
    assert!(pixels.sci.iter().all(|&v| v == 6.0));
    assert!(pixels.ivar.iter().all(|&v| v == 0.25));
    assert_eq!(context.slits.slits.len(), frame.nslits);
}

#[test]
fn test_bundle_with_ragged_pixels_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    let frame = SyntheticFrame::default();
    let mut bundle = frame.bundle("bad", frame.pixels(0));
    bundle.pixels.wave.truncate(3);
    bundle.save(&path).unwrap();
    assert!(FrameBundle::load(&path).is_err());
}
