//! Output file names derived from input identifiers.

use std::path::Path;

/// Name of the cube written for input `input`.
///
/// Combined cubes use `user` (default `datacube.fits`, `.fits` appended when
/// missing). Per-frame cubes swap `spec2d_` for `spec3d_` in the input name
/// when `user` is empty, and otherwise get a `_NNN` suffix on `user`'s stem.
pub fn output_filename(input: &str, user: &str, combine: bool, idx: usize) -> String {
    if combine {
        let name = if user.is_empty() { "datacube.fits" } else { user };
        return if name.contains(".fits") {
            name.to_string()
        } else {
            format!("{name}.fits")
        };
    }
    if user.is_empty() {
        return input.replace("spec2d_", "spec3d_");
    }
    format!("{}_{idx:03}.fits", strip_extension(user))
}

/// Companion whitelight image name: `_whitelight` before the extension.
pub fn whitelight_filename(outfile: &str) -> String {
    format!("{}_whitelight.fits", strip_extension(outfile))
}

/// Residual cube name: every `.fits` becomes `_resid.fits`.
pub fn residual_filename(outfile: &str) -> String {
    outfile.replace(".fits", "_resid.fits")
}

fn strip_extension(name: &str) -> &str {
    match Path::new(name).extension() {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_names() {
        assert_eq!(output_filename("spec2d_a.fits", "", true, 0), "datacube.fits");
        assert_eq!(output_filename("spec2d_a.fits", "m31", true, 0), "m31.fits");
        assert_eq!(output_filename("spec2d_a.fits", "m31.fits", true, 0), "m31.fits");
    }

    #[test]
    fn test_per_frame_names() {
        assert_eq!(
            output_filename("dir/spec2d_obj_001.fits", "", false, 1),
            "dir/spec3d_obj_001.fits"
        );
        assert_eq!(output_filename("spec2d_a.fits", "out/cube.fits", false, 7), "out/cube_007.fits");
        assert_eq!(output_filename("spec2d_a.fits", "cube", false, 12), "cube_012.fits");
    }

    #[test]
    fn test_companion_names() {
        assert_eq!(whitelight_filename("out/datacube.fits"), "out/datacube_whitelight.fits");
        assert_eq!(whitelight_filename("cube"), "cube_whitelight.fits");
        assert_eq!(residual_filename("datacube.fits"), "datacube_resid.fits");
    }
}
