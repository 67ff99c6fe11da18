use thiserror::Error;

#[derive(Error, Debug)]
pub enum CubeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::compat::errors::Error),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid frame bundle: {0}")]
    Bundle(#[from] serde_json::Error),

    #[error("Pixel column '{column}' has length {len}, expected {expected}")]
    ColumnLength {
        column: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("Expected {expected} frame contexts, got {got} ({what})")]
    ContextCount {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Pixel references frame {frame}, but only {total} frame contexts were supplied")]
    MissingFrameContext { frame: usize, total: usize },

    #[error("Detector position (spec={spec}, spat={spat}) lies outside the {nspec}x{nspat} tilt surface")]
    DetectorOutOfBounds {
        spec: usize,
        spat: usize,
        nspec: usize,
        nspat: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("A wavelength vector is required to restrict the whitelight range")]
    MissingWavelengths,

    #[error("No wavelength channel falls inside {min:.2} - {max:.2} Angstrom")]
    EmptyWavelengthRange { min: f64, max: f64 },

    #[error("No pixels to combine")]
    EmptyInput,

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, CubeError>;
