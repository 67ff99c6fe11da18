//! One-dimensional interpolants with extrapolation beyond the sampled range.
//!
//! Both interpolants keep evaluating the end segment's polynomial outside
//! `[x_min, x_max]`; callers rely on this when subpixels fall slightly beyond
//! the outermost parent pixel of a slit.

/// Piecewise-linear interpolant over sorted abscissae.
#[derive(Clone, Debug)]
pub struct LinearInterp {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl LinearInterp {
    /// Build from unsorted samples. Samples are sorted by `x` (stable, so tied
    /// abscissae keep their input order).
    ///
    /// Returns `None` when no samples are given.
    pub fn new(x: &[f64], y: &[f64]) -> Option<Self> {
        if x.is_empty() || x.len() != y.len() {
            return None;
        }
        let mut order: Vec<usize> = (0..x.len()).collect();
        order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
        Some(Self {
            x: order.iter().map(|&i| x[i]).collect(),
            y: order.iter().map(|&i| y[i]).collect(),
        })
    }

    pub fn eval(&self, at: f64) -> f64 {
        let n = self.x.len();
        if n == 1 {
            return self.y[0];
        }
        let i = segment_index(&self.x, at);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        let h = x1 - x0;
        if h == 0.0 {
            return y0;
        }
        y0 + (y1 - y0) * (at - x0) / h
    }
}

/// Cubic spline with not-a-knot end conditions.
///
/// Falls back to linear interpolation when fewer than four samples are
/// available. Abscissae must be strictly increasing.
#[derive(Clone, Debug)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the knots.
    m: Vec<f64>,
}

impl CubicSpline {
    pub fn new(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return None;
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }
        let m = if n < 4 {
            vec![0.0; n]
        } else {
            not_a_knot_second_derivatives(x, y)
        };
        Some(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    pub fn eval(&self, at: f64) -> f64 {
        let n = self.x.len();
        if n == 1 {
            return self.y[0];
        }
        let i = segment_index(&self.x, at);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - at;
        let b = at - x0;
        m0 * a * a * a / (6.0 * h)
            + m1 * b * b * b / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}

/// Index of the segment `[x[i], x[i+1]]` used to evaluate `at`, clamped to
/// the first/last segment for extrapolation.
fn segment_index(x: &[f64], at: f64) -> usize {
    let n = x.len();
    let upper = x.partition_point(|&v| v <= at);
    upper.saturating_sub(1).min(n - 2)
}

/// Solve for knot second derivatives with not-a-knot conditions (continuous
/// third derivative at the second and penultimate knots). `n >= 4`.
fn not_a_knot_second_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let d: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]).collect();

    // Unknowns M_1..M_{n-2}; M_0 and M_{n-1} are eliminated.
    let size = n - 2;
    let mut lower = vec![0.0; size];
    let mut diag = vec![0.0; size];
    let mut upper = vec![0.0; size];
    let mut rhs = vec![0.0; size];

    for k in 0..size {
        let i = k + 1;
        lower[k] = h[i - 1];
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        upper[k] = h[i];
        rhs[k] = 6.0 * (d[i] - d[i - 1]);
    }

    let (h0, h1) = (h[0], h[1]);
    diag[0] += h0 * (h0 + h1) / h1;
    upper[0] -= h0 * h0 / h1;

    let (ha, hb) = (h[n - 3], h[n - 2]);
    diag[size - 1] += hb * (hb + ha) / ha;
    lower[size - 1] -= hb * hb / ha;

    let interior = solve_tridiagonal(&lower, &diag, &upper, &rhs);

    let mut m = vec![0.0; n];
    m[1..n - 1].copy_from_slice(&interior);
    m[0] = ((h0 + h1) * m[1] - h0 * m[2]) / h1;
    m[n - 1] = ((hb + ha) * m[n - 2] - hb * m[n - 3]) / ha;
    m
}

/// Thomas algorithm. `lower[0]` and `upper[n-1]` are ignored.
fn solve_tridiagonal(lower: &[f64], diag: &[f64], upper: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    if n == 1 {
        return vec![rhs[0] / diag[0]];
    }
    let mut c = vec![0.0; n];
    let mut r = vec![0.0; n];
    c[0] = upper[0] / diag[0];
    r[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - lower[i] * c[i - 1];
        c[i] = if i < n - 1 { upper[i] / denom } else { 0.0 };
        r[i] = (rhs[i] - lower[i] * r[i - 1]) / denom;
    }
    let mut out = vec![0.0; n];
    out[n - 1] = r[n - 1];
    for i in (0..n - 1).rev() {
        out[i] = r[i] - c[i] * out[i + 1];
    }
    out
}
