use std::f64::consts::PI;

use ndarray::Array2;
use tracing::debug;

use crate::error::{CubeError, Result};
use crate::math::lm::{optimize, LmConfig, LmModel};

/// Rotated 2D Gaussian parameterised by its integrated flux.
///
/// Parameters: `[flux, x0, y0, sigma_x, sigma_y, theta, offset]`, coordinates
/// in spaxels along the first and second image axes. `sigma_x` lies along the
/// direction `(cos theta, sin theta)`.
#[derive(Clone, Copy, Debug)]
pub struct Gaussian2D {
    /// Parameter bounds of the centre and widths, from the image shape.
    pub nx: f64,
    pub ny: f64,
}

/// Minimum fitted width in spaxels.
const MIN_SIGMA: f64 = 0.5;
/// Starting width in spaxels when the image moments are unusable.
const START_SIGMA: f64 = 2.0;
/// Second moment of a Gaussian above half its peak, weighted by the excess,
/// in units of sigma squared.
const HALF_MAX_MOMENT: f64 = 0.2171;

impl Gaussian2D {
    /// Rotated offsets `(u, v)` of a point from the centre, and the profile value
    /// per unit flux there.
    fn frame(x: f64, y: f64, p: &[f64; 7]) -> (f64, f64, f64) {
        let [_, x0, y0, sx, sy, theta, _] = *p;
        let (sin, cos) = theta.sin_cos();
        let dx = x - x0;
        let dy = y - y0;
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        let g = (-(u * u) / (2.0 * sx * sx) - (v * v) / (2.0 * sy * sy)).exp();
        (u, v, g / (2.0 * PI * sx * sy))
    }
}

impl LmModel<7> for Gaussian2D {
    fn evaluate(&self, x: f64, y: f64, p: &[f64; 7]) -> f64 {
        let (_, _, unit) = Self::frame(x, y, p);
        p[6] + p[0] * unit
    }

    fn jacobian_row(&self, x: f64, y: f64, p: &[f64; 7]) -> [f64; 7] {
        let [flux, _, _, sx, sy, theta, _] = *p;
        let (sin, cos) = theta.sin_cos();
        let (u, v, unit) = Self::frame(x, y, p);
        let a = flux * unit;
        let (sx2, sy2) = (sx * sx, sy * sy);
        [
            unit,
            a * (u * cos / sx2 - v * sin / sy2),
            a * (u * sin / sx2 + v * cos / sy2),
            a * (u * u / (sx2 * sx) - 1.0 / sx),
            a * (v * v / (sy2 * sy) - 1.0 / sy),
            a * u * v * (1.0 / sy2 - 1.0 / sx2),
            1.0,
        ]
    }

    fn constrain(&self, p: &mut [f64; 7]) {
        p[0] = p[0].max(0.0);
        p[1] = p[1].clamp(0.0, self.nx);
        p[2] = p[2].clamp(0.0, self.ny);
        p[3] = p[3].clamp(MIN_SIGMA, self.nx.max(self.ny).max(MIN_SIGMA));
        p[4] = p[4].clamp(MIN_SIGMA, self.nx.max(self.ny).max(MIN_SIGMA));
        p[5] = (p[5] + PI).rem_euclid(2.0 * PI) - PI;
    }
}

/// Best-fit Gaussian parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianFit {
    /// Integrated flux, in units of the (possibly normalised) image.
    pub flux: f64,
    pub x0: f64,
    pub y0: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    /// Angle of the `sigma_x` axis from the first image axis, in `[-pi/4, pi/4)`.
    pub theta: f64,
    pub offset: f64,
    pub converged: bool,
}

impl GaussianFit {
    /// Larger of the two widths.
    pub fn width(&self) -> f64 {
        self.sigma_x.max(self.sigma_y)
    }
}

/// Fold `(sigma_x, sigma_y, theta)` onto the equivalent triple with
/// `theta` in `[-pi/4, pi/4)`.
fn canonical_axes(sx: f64, sy: f64, theta: f64) -> (f64, f64, f64) {
    let mut t = theta.rem_euclid(PI);
    if t >= PI / 2.0 {
        t -= PI;
    }
    if t >= PI / 4.0 {
        (sy, sx, t - PI / 2.0)
    } else if t < -PI / 4.0 {
        (sy, sx, t + PI / 2.0)
    } else {
        (sx, sy, t)
    }
}

/// Widths and orientation from the second moments of the pixels above half
/// the peak, falling back to a round [`START_SIGMA`] profile.
fn moment_guess(xs: &[f64], ys: &[f64], zs: &[f64], x0: f64, y0: f64, floor: f64, peak: f64) -> (f64, f64, f64) {
    let half = floor + 0.5 * (peak - floor);
    let (mut w, mut cxx, mut cyy, mut cxy) = (0.0, 0.0, 0.0, 0.0);
    for ((&x, &y), &z) in xs.iter().zip(ys).zip(zs) {
        let excess = z - half;
        if excess > 0.0 {
            let (dx, dy) = (x - x0, y - y0);
            w += excess;
            cxx += excess * dx * dx;
            cyy += excess * dy * dy;
            cxy += excess * dx * dy;
        }
    }
    if w <= 0.0 || cxx + cyy <= 0.0 {
        return (START_SIGMA, START_SIGMA, 0.0);
    }
    let (cxx, cyy, cxy) = (cxx / w, cyy / w, cxy / w);
    let mean = 0.5 * (cxx + cyy);
    let spread = (0.25 * (cxx - cyy).powi(2) + cxy * cxy).sqrt();
    let major = ((mean + spread) / HALF_MAX_MOMENT).sqrt().max(MIN_SIGMA);
    let minor = ((mean - spread).max(0.0) / HALF_MAX_MOMENT).sqrt().max(MIN_SIGMA);
    (major, minor, 0.5 * (2.0 * cxy).atan2(cxx - cyy))
}

/// Fit a [`Gaussian2D`] to an image, starting from its brightest spaxel and
/// the orientation of its core.
///
/// With `normalize` the image is divided by its maximum first, so the
/// returned flux and offset are relative to the peak.
pub fn fit_gaussian_2d(image: &Array2<f64>, normalize: bool) -> Result<GaussianFit> {
    let (nx, ny) = image.dim();
    if nx == 0 || ny == 0 {
        return Err(CubeError::EmptyInput);
    }
    let (peak_idx, peak) = image
        .indexed_iter()
        .filter(|(_, v)| v.is_finite())
        .fold(((0, 0), f64::NEG_INFINITY), |best, (idx, &v)| if v > best.1 { (idx, v) } else { best });
    if !peak.is_finite() {
        return Err(CubeError::Pipeline("image has no finite values to fit".into()));
    }
    let scale = if normalize && peak != 0.0 { peak } else { 1.0 };

    let mut xs = Vec::with_capacity(image.len());
    let mut ys = Vec::with_capacity(image.len());
    let mut zs = Vec::with_capacity(image.len());
    for ((i, j), &v) in image.indexed_iter() {
        if v.is_finite() {
            xs.push(i as f64);
            ys.push(j as f64);
            zs.push(v / scale);
        }
    }

    let model = Gaussian2D {
        nx: nx as f64,
        ny: ny as f64,
    };
    let amplitude = peak / scale;
    let floor = zs.iter().copied().fold(f64::INFINITY, f64::min);
    let (x_start, y_start) = (peak_idx.0 as f64, peak_idx.1 as f64);
    let (sx_start, sy_start, theta_start) = moment_guess(&xs, &ys, &zs, x_start, y_start, floor, amplitude);
    let initial = [
        2.0 * PI * sx_start * sy_start * (amplitude - floor),
        x_start,
        y_start,
        sx_start,
        sy_start,
        theta_start,
        floor,
    ];
    let result = optimize(&model, &xs, &ys, &zs, initial, &LmConfig::default());
    let [flux, x0, y0, sx, sy, theta, offset] = result.params;
    let (sigma_x, sigma_y, theta) = canonical_axes(sx, sy, theta);
    debug!(
        x0,
        y0,
        sigma_x,
        sigma_y,
        theta,
        iterations = result.iterations,
        converged = result.converged,
        "Gaussian fit"
    );

    Ok(GaussianFit {
        flux,
        x0,
        y0,
        sigma_x,
        sigma_y,
        theta,
        offset,
        converged: result.converged,
    })
}
