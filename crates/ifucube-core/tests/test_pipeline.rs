mod common;

use std::sync::{Arc, Mutex};

use common::SyntheticFrame;
use ifucube_core::error::CubeError;
use ifucube_core::io::bundle::FrameBundle;
use ifucube_core::io::cube_file::read_cube;
use ifucube_core::pipeline::{run_coadd, run_coadd_reported, CoaddConfig, PipelineStage, ProgressReporter};
use tempfile::TempDir;

fn exposures(names: [&str; 2]) -> Vec<FrameBundle> {
    let frame = SyntheticFrame {
        background: 1.0,
        ..SyntheticFrame::default()
    };
    let noisy = SyntheticFrame {
        ivar: 0.5,
        ..frame.clone()
    };
    let source = |k: usize, c: usize, _s: usize| if (k, c) == (2, 3) { 20.0 } else { 0.0 };
    vec![
        frame.bundle(names[0], frame.pixels_with(0, source)),
        noisy.bundle(names[1], noisy.pixels_with(0, source)),
    ]
}

#[derive(Default)]
struct StageRecorder {
    stages: Mutex<Vec<PipelineStage>>,
}

impl ProgressReporter for StageRecorder {
    fn begin_stage(&self, stage: PipelineStage, _total_items: Option<usize>) {
        self.stages.lock().unwrap().push(stage);
    }
}

#[test]
fn test_combined_coadd_writes_cube_and_whitelight() {
    let dir = TempDir::new().unwrap();
    let config = CoaddConfig {
        output: dir.path().join("coadd.fits"),
        spec_subpixel: 2,
        spat_subpixel: 2,
        ..CoaddConfig::default()
    };
    let outputs = run_coadd(&config, exposures(["a", "b"])).unwrap();
    assert_eq!(outputs.len(), 1);
    let out = &outputs[0];
    assert_eq!(out.frames, 2);
    assert_eq!(out.cube, dir.path().join("coadd.fits"));
    assert!(out.cube.exists());
    assert_eq!(out.whitelight.as_deref(), Some(dir.path().join("coadd_whitelight.fits").as_path()));
    assert!(dir.path().join("coadd_whitelight.fits").exists());
    assert!(out.residual.is_none());

    let cube = read_cube(&out.cube).unwrap();
    assert_eq!(cube.shape(), out.shape);
    assert_eq!(cube.shape(), (5, 4, 15));
    assert!(cube.flux.iter().all(|v| v.is_finite()));
    // The source spaxel stands out in every channel.
    for k in 0..15 {
        assert!(cube.flux[[3, 2, k]] > cube.flux[[0, 0, k]]);
    }
}

#[test]
fn test_per_frame_cubes_follow_input_names() {
    let dir = TempDir::new().unwrap();
    let names = [
        dir.path().join("spec2d_a.fits"),
        dir.path().join("spec2d_b.fits"),
    ];
    let names = [names[0].to_str().unwrap(), names[1].to_str().unwrap()];
    let config = CoaddConfig {
        combine: false,
        save_whitelight: false,
        spec_subpixel: 1,
        spat_subpixel: 1,
        ..CoaddConfig::default()
    };
    let outputs = run_coadd(&config, exposures(names)).unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].cube, dir.path().join("spec3d_a.fits"));
    assert_eq!(outputs[1].cube, dir.path().join("spec3d_b.fits"));
    for out in &outputs {
        assert_eq!(out.frames, 1);
        assert!(out.whitelight.is_none());
        assert!(out.cube.exists());
    }
}

#[test]
fn test_per_frame_cubes_with_user_name() {
    let dir = TempDir::new().unwrap();
    let config = CoaddConfig {
        combine: false,
        output: dir.path().join("cube.fits"),
        save_whitelight: false,
        spec_subpixel: 1,
        spat_subpixel: 1,
        ..CoaddConfig::default()
    };
    let outputs = run_coadd(&config, exposures(["a", "b"])).unwrap();
    assert_eq!(outputs[0].cube, dir.path().join("cube_001.fits"));
    assert_eq!(outputs[1].cube, dir.path().join("cube_002.fits"));
}

#[test]
fn test_debug_writes_residual_cube() {
    let dir = TempDir::new().unwrap();
    let config = CoaddConfig {
        output: dir.path().join("coadd.fits"),
        debug: true,
        save_whitelight: false,
        spec_subpixel: 1,
        spat_subpixel: 1,
        ..CoaddConfig::default()
    };
    let outputs = run_coadd(&config, exposures(["a", "b"])).unwrap();
    let resid = outputs[0].residual.clone().unwrap();
    assert_eq!(resid, dir.path().join("coadd_resid.fits"));
    assert!(resid.exists());
}

#[test]
fn test_reporter_sees_every_stage() {
    let dir = TempDir::new().unwrap();
    let config = CoaddConfig {
        output: dir.path().join("coadd.fits"),
        save_whitelight: false,
        spec_subpixel: 1,
        spat_subpixel: 1,
        ..CoaddConfig::default()
    };
    let recorder = Arc::new(StageRecorder::default());
    let mut bundles = exposures(["a", "b"]);
    bundles[1].ra_offset = 0.1;
    run_coadd_reported(&config, bundles, recorder.clone()).unwrap();
    let stages = recorder.stages.lock().unwrap().clone();
    assert_eq!(
        stages,
        vec![
            PipelineStage::Loading,
            PipelineStage::Aligning,
            PipelineStage::Sampling,
            PipelineStage::Weighting,
            PipelineStage::BuildingGrid,
            PipelineStage::Resampling,
            PipelineStage::Writing,
        ]
    );
}

#[test]
fn test_invalid_inputs() {
    let dir = TempDir::new().unwrap();
    let config = CoaddConfig {
        output: dir.path().join("coadd.fits"),
        ..CoaddConfig::default()
    };
    assert!(matches!(run_coadd(&config, Vec::new()), Err(CubeError::EmptyInput)));

    let bad = CoaddConfig {
        spec_subpixel: 0,
        ..config
    };
    assert!(matches!(
        run_coadd(&bad, exposures(["a", "b"])),
        Err(CubeError::InvalidConfig(_))
    ));
}
