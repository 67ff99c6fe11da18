use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{ARCSEC_PER_DEGREE, DEFAULT_EQUINOX, DEFAULT_SUBPIXEL};
use crate::error::{CubeError, Result};
use crate::grid::{GridOptions, WaveRange, WcsBounds};
use crate::resample::SubpixelOptions;
use crate::weights::WeightOptions;

/// Settings of a datacube coadd.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoaddConfig {
    /// Output file name; empty derives it from the input names.
    pub output: PathBuf,
    /// Combine all frames into one cube instead of one cube per frame.
    pub combine: bool,
    /// Spaxel size in arcsec; `None` uses the largest native scale.
    pub spatial_scale: Option<f64>,
    /// Wavelength step in Angstrom; `None` uses the largest native sampling.
    pub wave_delta: Option<f64>,
    pub spec_subpixel: usize,
    pub spat_subpixel: usize,
    /// Wavelength window of whitelight images and of the weighting source.
    pub whitelight_range: WaveRange,
    pub bounds: WcsBounds,
    /// FITS image whose celestial WCS defines the output grid.
    pub reference_image: Option<PathBuf>,
    pub relative_weights: bool,
    pub sn_smooth_npix: Option<usize>,
    pub save_whitelight: bool,
    /// Also write the `sci * sqrt(ivar)` residual cube.
    pub debug: bool,
    pub equinox: f64,
    pub spectrograph: String,
}

impl Default for CoaddConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::new(),
            combine: true,
            spatial_scale: None,
            wave_delta: None,
            spec_subpixel: DEFAULT_SUBPIXEL,
            spat_subpixel: DEFAULT_SUBPIXEL,
            whitelight_range: WaveRange::default(),
            bounds: WcsBounds::default(),
            reference_image: None,
            relative_weights: false,
            sn_smooth_npix: None,
            save_whitelight: true,
            debug: false,
            equinox: DEFAULT_EQUINOX,
            spectrograph: "IFU_SPEC".into(),
        }
    }
}

impl CoaddConfig {
    pub fn validate(&self) -> Result<()> {
        for (what, value) in [("spatial_scale", self.spatial_scale), ("wave_delta", self.wave_delta)] {
            if let Some(v) = value {
                if !(v > 0.0) {
                    return Err(CubeError::InvalidConfig(format!("{what} must be positive, got {v}")));
                }
            }
        }
        if self.spec_subpixel == 0 || self.spat_subpixel == 0 {
            return Err(CubeError::InvalidConfig(
                "subpixel factors must be at least 1".into(),
            ));
        }
        if let (Some(lo), Some(hi)) = (self.whitelight_range.min, self.whitelight_range.max) {
            if lo >= hi {
                return Err(CubeError::InvalidConfig(format!(
                    "whitelight range is empty ({lo} >= {hi})"
                )));
            }
        }
        Ok(())
    }

    /// Requested spaxel size in degrees.
    pub fn spatial_scale_deg(&self) -> Option<f64> {
        self.spatial_scale.map(|s| s / ARCSEC_PER_DEGREE)
    }

    pub fn subpixel_options(&self) -> SubpixelOptions {
        SubpixelOptions {
            spec_subpixel: self.spec_subpixel,
            spat_subpixel: self.spat_subpixel,
            debug: self.debug,
        }
    }

    pub fn weight_options(&self) -> WeightOptions {
        WeightOptions {
            sn_smooth_npix: self.sn_smooth_npix,
            relative: self.relative_weights,
        }
    }

    pub fn grid_options(&self) -> GridOptions {
        GridOptions {
            bounds: self.bounds,
            reference: self.reference_image.clone(),
            collapse: false,
            equinox: self.equinox,
            name: self.spectrograph.clone(),
        }
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "auto".to_string(), |v| format!("{v}"))
}

impl std::fmt::Display for CoaddConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Output:       {}", if self.output.as_os_str().is_empty() { "auto".into() } else { self.output.display().to_string() })?;
        writeln!(f, "Combine:      {}", self.combine)?;
        writeln!(f, "Spaxel:       {} arcsec", fmt_opt(self.spatial_scale))?;
        writeln!(f, "Wave step:    {} A", fmt_opt(self.wave_delta))?;
        writeln!(f, "Subpixels:    {}x{}", self.spec_subpixel, self.spat_subpixel)?;
        writeln!(f, "Whitelight:   {}", self.whitelight_range)?;
        writeln!(f, "Weighting:    {}", if self.relative_weights { "relative" } else { "wavelength dependent" })?;
        if let Some(reference) = &self.reference_image {
            writeln!(f, "Reference:    {}", reference.display())?;
        }
        write!(f, "Debug:        {}", self.debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CoaddConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.subpixel_options(), SubpixelOptions::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CoaddConfig {
            spatial_scale: Some(0.0),
            ..CoaddConfig::default()
        };
        assert!(config.validate().is_err());
        config.spatial_scale = Some(0.5);
        config.spat_subpixel = 0;
        assert!(config.validate().is_err());
        config.spat_subpixel = 3;
        config.whitelight_range = WaveRange::new(Some(5000.0), Some(4000.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_arcsec_to_degrees() {
        let config = CoaddConfig {
            spatial_scale: Some(0.36),
            ..CoaddConfig::default()
        };
        assert!((config.spatial_scale_deg().unwrap() - 1e-4).abs() < 1e-15);
    }
}
