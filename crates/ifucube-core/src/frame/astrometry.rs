use super::slits::SlitTraceSet;

/// Maps a detector position inside a slit to a one-dimensional projected
/// spatial coordinate along that slit.
///
/// `slit` is the position of the slit in the frame's [`SlitTraceSet`], not its
/// `spat_id`. The coordinate only needs to vary monotonically across the slit;
/// it is converted to sky coordinates by interpolating against the parent
/// pixels of the same slit.
pub trait AstrometricTransform: Send + Sync {
    fn transform(&self, slit: usize, spat: f64, spec: f64) -> f64;
}

/// Fractional position across the slit, 0 at the left edge and 1 at the
/// right edge, with the edges evaluated at the given spectral row.
#[derive(Clone, Debug)]
pub struct SlitAlignment {
    slits: SlitTraceSet,
}

impl SlitAlignment {
    pub fn new(slits: SlitTraceSet) -> Self {
        Self { slits }
    }
}

impl AstrometricTransform for SlitAlignment {
    fn transform(&self, slit: usize, spat: f64, spec: f64) -> f64 {
        let Some(trace) = self.slits.slits.get(slit) else {
            return spat;
        };
        let left = trace.left_at(spec);
        let width = trace.right_at(spec) - left;
        if width == 0.0 {
            return 0.0;
        }
        (spat - left) / width
    }
}
