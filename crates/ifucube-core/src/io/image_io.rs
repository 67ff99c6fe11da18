use std::path::Path;

use image::{GrayImage, ImageBuffer, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::{CubeError, Result};

/// Lower and upper percentiles mapped to black and white.
const STRETCH_PERCENTILES: (f64, f64) = (1.0, 99.0);

/// Scale an image `[x, y]` to `[0, 1]` between its 1st and 99th percentile,
/// laid out row-major with Dec increasing upwards.
fn stretch(image: &Array2<f64>) -> (usize, usize, Vec<f64>) {
    let (nx, ny) = image.dim();
    let mut finite: Vec<f64> = image.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(|a, b| a.total_cmp(b));
    let percentile = |p: f64| -> f64 {
        if finite.is_empty() {
            return 0.0;
        }
        let idx = ((p / 100.0) * (finite.len() - 1) as f64).round() as usize;
        finite[idx.min(finite.len() - 1)]
    };
    let lo = percentile(STRETCH_PERCENTILES.0);
    let hi = percentile(STRETCH_PERCENTILES.1);
    let range = if hi > lo { hi - lo } else { 1.0 };

    let mut out = Vec::with_capacity(nx * ny);
    for row in 0..ny {
        let y = ny - 1 - row;
        for x in 0..nx {
            let v = image[[x, y]];
            let scaled = if v.is_finite() { (v - lo) / range } else { 0.0 };
            out.push(scaled.clamp(0.0, 1.0));
        }
    }
    (nx, ny, out)
}

/// Save a whitelight image as 16-bit grayscale TIFF.
pub fn save_tiff(image: &Array2<f64>, path: &Path) -> Result<()> {
    let (w, h, values) = stretch(image);
    let pixels: Vec<u16> = values.iter().map(|&v| (v * 65535.0) as u16).collect();
    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| CubeError::Pipeline("image buffer does not match its dimensions".into()))?;
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save a whitelight image as 8-bit grayscale PNG.
pub fn save_png(image: &Array2<f64>, path: &Path) -> Result<()> {
    let (w, h, values) = stretch(image);
    let mut img = GrayImage::new(w as u32, h as u32);
    for (i, &v) in values.iter().enumerate() {
        img.put_pixel((i % w) as u32, (i / w) as u32, Luma([(v * 255.0) as u8]));
    }
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save a whitelight preview, choosing the format from the file extension.
pub fn save_preview(image: &Array2<f64>, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tiff" | "tif") => save_tiff(image, path),
        _ => save_png(image, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stretch_flips_rows_and_clamps() {
        let mut image = Array2::<f64>::zeros((2, 3));
        image[[0, 2]] = 10.0;
        image[[1, 0]] = f64::NAN;
        let (w, h, values) = stretch(&image);
        assert_eq!((w, h), (2, 3));
        // Top-left output pixel is x = 0 at the largest y.
        assert_eq!(values[0], 1.0);
        assert_eq!(values[5], 0.0);
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
