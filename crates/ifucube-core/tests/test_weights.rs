mod common;

use approx::assert_relative_eq;
use common::{SyntheticFrame, DSPAT, DWAVE};
use ifucube_core::grid::{GridOptions, WaveRange};
use ifucube_core::pixels::PixelTable;
use ifucube_core::weights::{compute_weights_frompix, overlap_range, WeightOptions};

/// Two exposures of the same continuum source; the second has four times the
/// variance.
fn two_exposures() -> (SyntheticFrame, SyntheticFrame, PixelTable) {
    let bright = SyntheticFrame {
        background: 1.0,
        ..SyntheticFrame::default()
    };
    let noisy = SyntheticFrame {
        ivar: 0.25,
        ..bright.clone()
    };
    let source = |k: usize, c: usize, _s: usize| if (k, c) == (2, 3) { 10.0 } else { 0.0 };
    let mut pixels = bright.pixels_with(0, source);
    pixels.append_frame(&noisy.pixels_with(0, source), 1);
    (bright, noisy, pixels)
}

#[test]
fn test_noisier_frame_gets_lower_weight() {
    let (bright, noisy, pixels) = two_exposures();
    let contexts = vec![bright.context(), noisy.context()];
    let weights = compute_weights_frompix(
        &pixels,
        &contexts,
        DSPAT,
        DWAVE,
        &GridOptions::default(),
        &WaveRange::default(),
        &WeightOptions::default(),
    )
    .unwrap();

    assert_eq!(weights.len(), pixels.len());
    assert!(weights.iter().all(|w| w.is_finite() && *w > 0.0));

    let first = pixels.frame_rows(0);
    let second = pixels.frame_rows(1);
    // (S/N)^2 scales with the inverse variance.
    for (&a, &b) in first.iter().zip(second.iter()) {
        assert_relative_eq!(weights[a] / weights[b], 4.0, max_relative = 1e-9);
    }
    // The box spectrum is flat, so the weight is too: (19 / 9)^2.
    assert_relative_eq!(weights[first[0]], (19.0f64 / 9.0).powi(2), max_relative = 1e-9);
}

#[test]
fn test_relative_weights_against_best_frame() {
    let (bright, noisy, pixels) = two_exposures();
    let contexts = vec![bright.context(), noisy.context()];
    let options = WeightOptions {
        relative: true,
        ..WeightOptions::default()
    };
    let weights = compute_weights_frompix(
        &pixels,
        &contexts,
        DSPAT,
        DWAVE,
        &GridOptions::default(),
        &WaveRange::default(),
        &options,
    )
    .unwrap();
    for &i in &pixels.frame_rows(0) {
        assert_relative_eq!(weights[i], 1.0, max_relative = 1e-9);
    }
    for &i in &pixels.frame_rows(1) {
        assert_relative_eq!(weights[i], 0.25, max_relative = 1e-9);
    }
}

#[test]
fn test_overlap_range_is_common_to_all_slits() {
    let frame = SyntheticFrame::default();
    let mut narrow = frame.context();
    narrow.slits.slits[1].wave_min = 5003.0;
    narrow.slits.slits[4].wave_max = 5011.0;
    assert_eq!(overlap_range(&[frame.context(), narrow]), Some((5003.0, 5011.0)));
    assert_eq!(overlap_range(&[]), None);
}
