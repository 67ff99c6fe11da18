use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consts::ARCSEC_PER_DEGREE;
use crate::error::{CubeError, Result};

/// One detector pixel of one exposure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRecord {
    pub frame: usize,
    /// Right ascension in degrees.
    pub ra: f64,
    /// Declination in degrees.
    pub dec: f64,
    /// Wavelength in Angstrom.
    pub wave: f64,
    pub sci: f64,
    pub ivar: f64,
    pub weight: f64,
    pub spat_pos: usize,
    pub spec_pos: usize,
    pub slit_id: u32,
}

/// Flat table of pixel records stored column-wise.
///
/// Every column has the same length and row `i` of each column describes the
/// same detector pixel.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PixelTable {
    pub ra: Vec<f64>,
    pub dec: Vec<f64>,
    pub wave: Vec<f64>,
    pub sci: Vec<f64>,
    pub ivar: Vec<f64>,
    pub weight: Vec<f64>,
    pub spat_pos: Vec<usize>,
    pub spec_pos: Vec<usize>,
    pub slit_id: Vec<u32>,
    #[serde(default)]
    pub frame: Vec<usize>,
}

impl PixelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            ra: Vec::with_capacity(n),
            dec: Vec::with_capacity(n),
            wave: Vec::with_capacity(n),
            sci: Vec::with_capacity(n),
            ivar: Vec::with_capacity(n),
            weight: Vec::with_capacity(n),
            spat_pos: Vec::with_capacity(n),
            spec_pos: Vec::with_capacity(n),
            slit_id: Vec::with_capacity(n),
            frame: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, rec: PixelRecord) {
        self.ra.push(rec.ra);
        self.dec.push(rec.dec);
        self.wave.push(rec.wave);
        self.sci.push(rec.sci);
        self.ivar.push(rec.ivar);
        self.weight.push(rec.weight);
        self.spat_pos.push(rec.spat_pos);
        self.spec_pos.push(rec.spec_pos);
        self.slit_id.push(rec.slit_id);
        self.frame.push(rec.frame);
    }

    pub fn get(&self, i: usize) -> PixelRecord {
        PixelRecord {
            frame: self.frame[i],
            ra: self.ra[i],
            dec: self.dec[i],
            wave: self.wave[i],
            sci: self.sci[i],
            ivar: self.ivar[i],
            weight: self.weight[i],
            spat_pos: self.spat_pos[i],
            spec_pos: self.spec_pos[i],
            slit_id: self.slit_id[i],
        }
    }

    pub fn len(&self) -> usize {
        self.ra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ra.is_empty()
    }

    /// Check that every column has the same length.
    pub fn validate(&self) -> Result<()> {
        let expected = self.ra.len();
        let columns: [(&'static str, usize); 9] = [
            ("dec", self.dec.len()),
            ("wave", self.wave.len()),
            ("sci", self.sci.len()),
            ("ivar", self.ivar.len()),
            ("weight", self.weight.len()),
            ("spat_pos", self.spat_pos.len()),
            ("spec_pos", self.spec_pos.len()),
            ("slit_id", self.slit_id.len()),
            ("frame", self.frame.len()),
        ];
        for (column, len) in columns {
            if len != expected {
                return Err(CubeError::ColumnLength {
                    column,
                    len,
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Sorted distinct frame indices.
    pub fn frame_indices(&self) -> Vec<usize> {
        self.frame
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of distinct frame indices.
    pub fn frame_count(&self) -> usize {
        self.frame_indices().len()
    }

    /// Rows of a single frame, in table order.
    pub fn frame_rows(&self, frame: usize) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.frame[i] == frame).collect()
    }

    /// New table holding only the given rows, in the given order.
    pub fn subset(&self, rows: &[usize]) -> Self {
        let mut out = Self::with_capacity(rows.len());
        for &i in rows {
            out.push(self.get(i));
        }
        out
    }

    /// Append all rows of `other`, relabelled as frame `frame`.
    pub fn append_frame(&mut self, other: &PixelTable, frame: usize) {
        for i in 0..other.len() {
            let mut rec = other.get(i);
            rec.frame = frame;
            self.push(rec);
        }
    }

    /// Apply a flux-calibration curve: `sci *= s(wave)` and `ivar /= s(wave)^2`.
    ///
    /// A zero sensitivity zeroes both the science value and the inverse variance.
    pub fn apply_sensitivity<F: Fn(f64) -> f64>(&mut self, sensitivity: F) {
        for i in 0..self.len() {
            let s = sensitivity(self.wave[i]);
            self.sci[i] *= s;
            self.ivar[i] = if s == 0.0 {
                0.0
            } else {
                self.ivar[i] / (s * s)
            };
        }
    }

    /// Shift every frame onto the pointing of frame 0, then apply the user
    /// offsets (arcsec, `cos(dec)` already folded into the RA offset).
    ///
    /// All slices are indexed by frame and must have one entry per frame.
    pub fn align_user_offsets(
        &mut self,
        ifu_ra: &[f64],
        ifu_dec: &[f64],
        ra_offset: &[f64],
        dec_offset: &[f64],
    ) -> Result<()> {
        let nframes = self.frame_count();
        for (what, got) in [
            ("IFU RA pointings", ifu_ra.len()),
            ("IFU Dec pointings", ifu_dec.len()),
            ("RA offsets", ra_offset.len()),
            ("Dec offsets", dec_offset.len()),
        ] {
            if got != nframes {
                return Err(CubeError::ContextCount {
                    what,
                    expected: nframes,
                    got,
                });
            }
        }
        if nframes == 0 {
            return Ok(());
        }

        let shift_ra: Vec<f64> = (0..nframes)
            .map(|f| ifu_ra[0] - ifu_ra[f] + ra_offset[f] / ARCSEC_PER_DEGREE)
            .collect();
        let shift_dec: Vec<f64> = (0..nframes)
            .map(|f| ifu_dec[0] - ifu_dec[f] + dec_offset[f] / ARCSEC_PER_DEGREE)
            .collect();

        for i in 0..self.len() {
            let f = self.frame[i];
            if f >= nframes {
                return Err(CubeError::MissingFrameContext {
                    frame: f,
                    total: nframes,
                });
            }
            self.ra[i] += shift_ra[f];
            self.dec[i] += shift_dec[f];
        }
        for f in 0..nframes {
            info!(
                frame = f,
                ra_shift_arcsec = shift_ra[f] * ARCSEC_PER_DEGREE,
                dec_shift_arcsec = shift_dec[f] * ARCSEC_PER_DEGREE,
                "Spatial shift applied"
            );
        }
        Ok(())
    }

    /// `(min, max)` of the wavelength column, ignoring non-finite values.
    pub fn wave_extrema(&self) -> Option<(f64, f64)> {
        min_max(&self.wave)
    }
}

pub(crate) fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frame: usize, ra: f64) -> PixelRecord {
        PixelRecord {
            frame,
            ra,
            dec: 10.0,
            wave: 5000.0,
            sci: 2.0,
            ivar: 4.0,
            weight: 1.0,
            spat_pos: 0,
            spec_pos: 0,
            slit_id: 1,
        }
    }

    #[test]
    fn test_validate_detects_short_column() {
        let mut table = PixelTable::new();
        table.push(record(0, 1.0));
        table.push(record(0, 2.0));
        assert!(table.validate().is_ok());
        table.ivar.pop();
        match table.validate() {
            Err(CubeError::ColumnLength { column, len, expected }) => {
                assert_eq!(column, "ivar");
                assert_eq!(len, 1);
                assert_eq!(expected, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_frame_count_and_append() {
        let mut a = PixelTable::new();
        a.push(record(0, 1.0));
        let mut b = PixelTable::new();
        b.push(record(0, 2.0));
        b.push(record(0, 3.0));
        a.append_frame(&b, 1);
        assert_eq!(a.len(), 3);
        assert_eq!(a.frame_count(), 2);
        assert_eq!(a.frame_rows(1), vec![1, 2]);
        assert_eq!(a.subset(&[2]).ra, vec![3.0]);
    }

    #[test]
    fn test_apply_sensitivity_scales_variance() {
        let mut table = PixelTable::new();
        table.push(record(0, 1.0));
        table.apply_sensitivity(|_| 2.0);
        assert_eq!(table.sci[0], 4.0);
        assert_eq!(table.ivar[0], 1.0);
    }

    #[test]
    fn test_align_user_offsets() {
        let mut table = PixelTable::new();
        table.push(record(0, 100.0));
        table.push(record(1, 100.5));
        table
            .align_user_offsets(&[100.0, 100.5], &[10.0, 10.0], &[0.0, 36.0], &[0.0, -3.6])
            .unwrap();
        assert!((table.ra[0] - 100.0).abs() < 1e-12);
        assert!((table.ra[1] - 100.01).abs() < 1e-9);
        assert!((table.dec[1] - 9.999).abs() < 1e-9);
    }

    #[test]
    fn test_align_user_offsets_length_mismatch() {
        let mut table = PixelTable::new();
        table.push(record(0, 100.0));
        table.push(record(1, 100.5));
        let err = table.align_user_offsets(&[100.0], &[10.0, 10.0], &[0.0, 0.0], &[0.0, 0.0]);
        assert!(matches!(err, Err(CubeError::ContextCount { .. })));
    }
}
