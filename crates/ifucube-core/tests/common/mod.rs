#![allow(dead_code)]

use ifucube_core::frame::{FrameContext, SlitTrace, SlitTraceSet, TiltSurface};
use ifucube_core::grid::{NativeScale, WcsBounds};
use ifucube_core::io::bundle::FrameBundle;
use ifucube_core::pixels::{PixelRecord, PixelTable};

/// Spaxel size in degrees (exactly representable).
pub const DSPAT: f64 = 1.0 / 1024.0;
/// Wavelength step per detector row in Angstrom.
pub const DWAVE: f64 = 1.0;
pub const RA0: f64 = 150.0;
pub const WAVE0: f64 = 5000.0;

/// Detector of straight, equally wide slits with an untilted wavelength
/// solution: row `s` has wavelength `WAVE0 + s * DWAVE`, column `c` of slit
/// `k` sits at RA `ra0 + c * DSPAT` and Dec `(k - centre) * DSPAT`.
#[derive(Clone, Debug)]
pub struct SyntheticFrame {
    pub nspec: usize,
    pub nslits: usize,
    pub slit_width: usize,
    pub ra0: f64,
    pub background: f64,
    pub ivar: f64,
}

impl Default for SyntheticFrame {
    fn default() -> Self {
        Self {
            nspec: 16,
            nslits: 5,
            slit_width: 6,
            ra0: RA0,
            background: 0.0,
            ivar: 1.0,
        }
    }
}

impl SyntheticFrame {
    pub fn nspat(&self) -> usize {
        self.nslits * self.slit_width
    }

    pub fn spat_id(&self, slit: usize) -> u32 {
        (slit as u32 + 1) * 10
    }

    pub fn ra(&self, col: usize) -> f64 {
        self.ra0 + col as f64 * DSPAT
    }

    pub fn dec(&self, slit: usize) -> f64 {
        (slit as f64 - (self.nslits as f64 - 1.0) / 2.0) * DSPAT
    }

    pub fn wave(&self, spec: usize) -> f64 {
        WAVE0 + spec as f64 * DWAVE
    }

    pub fn slits(&self) -> SlitTraceSet {
        let traces = (0..self.nslits)
            .map(|k| {
                SlitTrace::straight(
                    self.spat_id(k),
                    (k * self.slit_width) as f64,
                    ((k + 1) * self.slit_width) as f64,
                    self.nspec,
                    self.wave(0),
                    self.wave(self.nspec - 1),
                )
            })
            .collect();
        SlitTraceSet::new(self.nspec, self.nspat(), traces)
    }

    pub fn tilts(&self) -> TiltSurface {
        TiltSurface::untilted(self.nspec, self.nspat())
    }

    pub fn context(&self) -> FrameContext {
        FrameContext::new(self.tilts(), self.slits())
    }

    /// Pixel table with `background` everywhere plus `extra(slit, col, spec)`.
    pub fn pixels_with(&self, frame: usize, extra: impl Fn(usize, usize, usize) -> f64) -> PixelTable {
        let mut table = PixelTable::with_capacity(self.nspec * self.nspat());
        for spec in 0..self.nspec {
            for slit in 0..self.nslits {
                for col in 0..self.slit_width {
                    table.push(PixelRecord {
                        frame,
                        ra: self.ra(col),
                        dec: self.dec(slit),
                        wave: self.wave(spec),
                        sci: self.background + extra(slit, col, spec),
                        ivar: self.ivar,
                        weight: 1.0,
                        spat_pos: slit * self.slit_width + col,
                        spec_pos: spec,
                        slit_id: self.spat_id(slit),
                    });
                }
            }
        }
        table
    }

    pub fn pixels(&self, frame: usize) -> PixelTable {
        self.pixels_with(frame, |_, _, _| 0.0)
    }

    /// Point source of `flux` in one detector pixel.
    pub fn point_source(&self, frame: usize, slit: usize, col: usize, spec: usize, flux: f64) -> PixelTable {
        self.pixels_with(frame, |k, c, s| if (k, c, s) == (slit, col, spec) { flux } else { 0.0 })
    }

    pub fn scale(&self) -> NativeScale {
        NativeScale {
            pixel: DSPAT,
            slicer: DSPAT,
            wave: DWAVE,
        }
    }

    pub fn bundle(&self, name: &str, pixels: PixelTable) -> FrameBundle {
        FrameBundle {
            name: name.to_string(),
            pixels,
            tilts: self.tilts(),
            slits: self.slits(),
            scale: self.scale(),
            dar: None,
            ifu_ra: 0.0,
            ifu_dec: 0.0,
            ra_offset: 0.0,
            dec_offset: 0.0,
            sensitivity: None,
        }
    }
}

/// Bounds `margin` steps beyond the data on every axis.
pub fn padded_bounds(pixels: &PixelTable, margin: f64) -> WcsBounds {
    let lo = |v: &[f64]| v.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = |v: &[f64]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    WcsBounds {
        ra_min: Some(lo(&pixels.ra) - margin * DSPAT),
        ra_max: Some(hi(&pixels.ra) + margin * DSPAT),
        dec_min: Some(lo(&pixels.dec) - margin * DSPAT),
        dec_max: Some(hi(&pixels.dec) + margin * DSPAT),
        wave_min: Some(lo(&pixels.wave) - margin * DWAVE),
        wave_max: Some(hi(&pixels.wave) + margin * DWAVE),
    }
}
