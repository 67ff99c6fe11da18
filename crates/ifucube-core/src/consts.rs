/// Minimum number of (frame, slit) resampling jobs to use Rayon parallelism.
pub const PARALLEL_JOB_THRESHOLD: usize = 4;

/// Default subpixellation factor along each detector axis.
pub const DEFAULT_SUBPIXEL: usize = 5;

/// Conversion from Angstrom to metres (the spectral unit of the voxel grid).
pub const ANGSTROM_TO_METRE: f64 = 1.0e-10;

/// Arcseconds per degree.
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Relative tolerance when comparing the native spatial scales of frames.
pub const SPATIAL_SCALE_TOLERANCE: f64 = 1.0e-4;

/// Relative tolerance when comparing the native wavelength sampling of frames.
pub const SPECTRAL_SCALE_TOLERANCE: f64 = 1.0e-2;

/// Fraction of the spectral length used as S/N smoothing window when none is given.
pub const DEFAULT_SN_SMOOTH_FRACTION: f64 = 0.1;

/// Half-width (in spaxels) of the box used to extract the brightest-object
/// spectrum for optimal weighting. 1 gives a 3x3 spaxel box.
pub const WEIGHT_BOX_HALF_WIDTH: f64 = 1.0;

/// Minimum Gaussian smoothing sigma (in spectral pixels) applied to S/N spectra.
pub const MIN_SN_SMOOTH_SIGMA: f64 = 3.0;

/// Sigma-clipping threshold used for per-frame RMS S/N.
pub const SN_CLIP_SIGMA: f64 = 3.0;

/// Boxcar extraction spectral bins with less than this fraction of the
/// standard-star flux are flagged bad.
pub const MIN_FLUX_COMPLETENESS: f64 = 1.0 / 3.0;

/// Radius of the standard-star aperture in units of the fitted Gaussian sigma.
pub const DEFAULT_APERTURE_NSIG: f64 = 4.0;

/// Outer radius of the sky annulus in units of the fitted Gaussian sigma.
pub const DEFAULT_SKY_NSIG: f64 = 8.0;

/// Supersampling factor used to build fractional aperture masks.
pub const DEFAULT_MASK_SUBPIXEL: usize = 20;

/// Default FITS equinox of the output WCS.
pub const DEFAULT_EQUINOX: f64 = 2000.0;
