pub mod bundle;
pub mod cube_file;
pub mod fits;
pub mod image_io;
pub mod naming;

pub use bundle::{FrameBundle, SensitivityCurve};
pub use cube_file::{read_cube, write_cube, write_primary_cube};
pub use naming::{output_filename, residual_filename, whitelight_filename};
