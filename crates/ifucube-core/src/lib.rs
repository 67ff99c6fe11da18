pub mod consts;
pub mod cube;
pub mod error;
pub mod extract;
pub mod frame;
pub mod grid;
pub mod io;
pub mod math;
pub mod pipeline;
pub mod pixels;
pub mod resample;
pub mod weights;
