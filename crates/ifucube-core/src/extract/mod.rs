//! Collapsed images and standard-star spectra.

pub mod boxcar;
pub mod gaussian;
pub mod whitelight;

pub use boxcar::{extract_standard_spec, ExtractionConfig, StandardSpectrum};
pub use gaussian::{fit_gaussian_2d, Gaussian2D, GaussianFit};
pub use whitelight::{generate_image_subpixel, make_whitelight_fromcube};
