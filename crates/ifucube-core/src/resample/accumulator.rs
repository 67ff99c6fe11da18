use ndarray::Array3;
use tracing::debug;

use crate::math::safe_inverse;

/// One subpixel's contribution to a voxel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deposit {
    pub voxel: (usize, usize, usize),
    /// `sci * w`
    pub flux: f64,
    /// `var * w^2`
    pub var: f64,
    /// `w`
    pub norm: f64,
    /// `sci * sqrt(ivar)`
    pub resid: f64,
}

/// Normalised cube products.
#[derive(Clone, Debug)]
pub struct CubeProducts {
    pub flux: Array3<f64>,
    pub var: Array3<f64>,
    /// 1 where no subpixel contributed, 0 elsewhere.
    pub bpm: Array3<u8>,
    pub resid: Option<Array3<f64>>,
}

/// Running weighted sums of flux, variance and normalisation over the
/// output voxels.
#[derive(Clone, Debug)]
pub struct VoxelAccumulator {
    flux: Array3<f64>,
    var: Array3<f64>,
    norm: Array3<f64>,
    resid: Option<Array3<f64>>,
}

impl VoxelAccumulator {
    pub fn new(shape: (usize, usize, usize), with_residuals: bool) -> Self {
        Self {
            flux: Array3::zeros(shape),
            var: Array3::zeros(shape),
            norm: Array3::zeros(shape),
            resid: with_residuals.then(|| Array3::zeros(shape)),
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.flux.dim()
    }

    #[inline]
    pub fn deposit(&mut self, d: &Deposit) {
        let (x, y, z) = d.voxel;
        self.flux[[x, y, z]] += d.flux;
        self.var[[x, y, z]] += d.var;
        self.norm[[x, y, z]] += d.norm;
        if let Some(resid) = self.resid.as_mut() {
            resid[[x, y, z]] += d.resid;
        }
    }

    /// Add another accumulator of the same shape into this one.
    pub fn merge(&mut self, other: &VoxelAccumulator) {
        self.flux += &other.flux;
        self.var += &other.var;
        self.norm += &other.norm;
        if let (Some(mine), Some(theirs)) = (self.resid.as_mut(), other.resid.as_ref()) {
            *mine += theirs;
        }
    }

    /// Weighted flux sum of each voxel, before normalisation.
    pub fn flux_sum(&self) -> &Array3<f64> {
        &self.flux
    }

    /// Sum of weights deposited into each voxel.
    pub fn normalization(&self) -> &Array3<f64> {
        &self.norm
    }

    /// Divide the sums by the normalisation (`1/0 := 0`) and flag empty voxels.
    pub fn finalize(self) -> CubeProducts {
        let inv = self.norm.mapv(safe_inverse);
        let flux = self.flux * &inv;
        let var = self.var * &inv.mapv(|v| v * v);
        let resid = self.resid.map(|r| r * &inv);
        let bpm = self.norm.mapv(|n| u8::from(n == 0.0));

        let empty = bpm.iter().filter(|&&b| b == 1).count();
        debug!(empty, total = bpm.len(), "Voxels without contributions");

        CubeProducts {
            flux,
            var,
            bpm,
            resid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(voxel: (usize, usize, usize), sci: f64, ivar: f64, w: f64) -> Deposit {
        Deposit {
            voxel,
            flux: sci * w,
            var: safe_inverse(ivar) * w * w,
            norm: w,
            resid: sci * ivar.sqrt(),
        }
    }

    #[test]
    fn test_finalize_weighted_mean_and_variance() {
        let mut acc = VoxelAccumulator::new((2, 1, 1), true);
        acc.deposit(&deposit((0, 0, 0), 2.0, 1.0, 1.0));
        acc.deposit(&deposit((0, 0, 0), 4.0, 1.0, 1.0));
        let out = acc.finalize();
        assert_eq!(out.flux[[0, 0, 0]], 3.0);
        assert_eq!(out.var[[0, 0, 0]], 0.5);
        assert_eq!(out.bpm[[0, 0, 0]], 0);
        assert_eq!(out.bpm[[1, 0, 0]], 1);
        assert_eq!(out.flux[[1, 0, 0]], 0.0);
        assert_eq!(out.var[[1, 0, 0]], 0.0);
        assert_eq!(out.resid.unwrap()[[0, 0, 0]], 3.0);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let deposits = [
            deposit((0, 0, 0), 1.0, 4.0, 0.5),
            deposit((0, 0, 1), 2.0, 1.0, 0.25),
            deposit((0, 0, 0), 3.0, 2.0, 0.75),
        ];
        let mut single = VoxelAccumulator::new((1, 1, 2), false);
        deposits.iter().for_each(|d| single.deposit(d));

        let mut a = VoxelAccumulator::new((1, 1, 2), false);
        let mut b = VoxelAccumulator::new((1, 1, 2), false);
        a.deposit(&deposits[0]);
        b.deposit(&deposits[1]);
        b.deposit(&deposits[2]);
        a.merge(&b);

        assert_eq!(a.normalization(), single.normalization());
        let (fa, fs) = (a.finalize(), single.finalize());
        assert_eq!(fa.flux, fs.flux);
        assert_eq!(fa.var, fs.var);
    }
}
