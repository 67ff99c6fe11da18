//! Levenberg-Marquardt least squares for small fixed-size 2D models.

/// Optimiser settings.
#[derive(Debug, Clone)]
pub struct LmConfig {
    pub max_iterations: usize,
    /// Stop once the largest parameter update falls below this value.
    pub convergence_threshold: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            convergence_threshold: 1e-10,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LmResult<const N: usize> {
    pub params: [f64; N],
    pub chi2: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Diagonal ridge relative to the largest curvature term.
const RIDGE: f64 = 1e-12;

/// A model `z = f(x, y; params)` with an analytic Jacobian.
pub trait LmModel<const N: usize> {
    fn evaluate(&self, x: f64, y: f64, params: &[f64; N]) -> f64;

    fn jacobian_row(&self, x: f64, y: f64, params: &[f64; N]) -> [f64; N];

    /// Clamp parameters back into their valid domain after an update.
    fn constrain(&self, _params: &mut [f64; N]) {}
}

/// Fit `model` to the samples `(xs[i], ys[i]) -> zs[i]`.
pub fn optimize<const N: usize, M: LmModel<N>>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    zs: &[f64],
    initial: [f64; N],
    config: &LmConfig,
) -> LmResult<N> {
    let mut params = initial;
    let mut lambda = config.initial_lambda;
    let mut chi2 = compute_chi2(model, xs, ys, zs, &params);
    let mut converged = false;
    let mut iterations = 0;

    let mut jacobian = Vec::with_capacity(xs.len());
    let mut residuals = Vec::with_capacity(xs.len());

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        jacobian.clear();
        residuals.clear();
        for ((&x, &y), &z) in xs.iter().zip(ys).zip(zs) {
            jacobian.push(model.jacobian_row(x, y, &params));
            residuals.push(z - model.evaluate(x, y, &params));
        }
        let (mut hessian, gradient) = hessian_gradient(&jacobian, &residuals);
        // A parameter the data does not constrain at this point leaves a zero
        // diagonal; the ridge keeps its step at zero instead of failing the solve.
        let ridge = RIDGE * (0..N).fold(0.0f64, |acc, i| acc.max(hessian[i][i]));
        for (i, row) in hessian.iter_mut().enumerate() {
            row[i] = row[i] * (1.0 + lambda) + ridge;
        }

        let Some(delta) = solve(&hessian, &gradient) else {
            break;
        };

        let mut trial = params;
        for (p, d) in trial.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        model.constrain(&mut trial);

        let trial_chi2 = compute_chi2(model, xs, ys, zs, &trial);
        if trial_chi2 < chi2 {
            params = trial;
            chi2 = trial_chi2;
            lambda *= config.lambda_down;
            let max_delta = delta.iter().fold(0.0f64, |a, d| a.max(d.abs()));
            if max_delta < config.convergence_threshold {
                converged = true;
                break;
            }
        } else {
            lambda *= config.lambda_up;
            if lambda > 1e12 {
                // No downhill step left: already at the minimum to working precision.
                converged = true;
                break;
            }
        }
    }

    LmResult {
        params,
        chi2,
        converged,
        iterations,
    }
}

fn compute_chi2<const N: usize, M: LmModel<N>>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    zs: &[f64],
    params: &[f64; N],
) -> f64 {
    xs.iter()
        .zip(ys)
        .zip(zs)
        .map(|((&x, &y), &z)| {
            let r = z - model.evaluate(x, y, params);
            r * r
        })
        .sum()
}

/// `J^T J` and `J^T r`.
#[allow(clippy::needless_range_loop)]
fn hessian_gradient<const N: usize>(
    jacobian: &[[f64; N]],
    residuals: &[f64],
) -> ([[f64; N]; N], [f64; N]) {
    let mut hessian = [[0.0f64; N]; N];
    let mut gradient = [0.0f64; N];

    for (row, &r) in jacobian.iter().zip(residuals) {
        for i in 0..N {
            gradient[i] += row[i] * r;
            for j in i..N {
                hessian[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 1..N {
        for j in 0..i {
            hessian[i][j] = hessian[j][i];
        }
    }
    (hessian, gradient)
}

/// Gaussian elimination with partial pivoting. `None` if singular.
#[allow(clippy::needless_range_loop)]
pub fn solve<const N: usize>(a: &[[f64; N]; N], b: &[f64; N]) -> Option<[f64; N]> {
    let mut matrix = *a;
    let mut rhs = *b;
    let scale = matrix
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }

    for col in 0..N {
        let mut max_row = col;
        let mut max_val = matrix[col][col].abs();
        for row in (col + 1)..N {
            if matrix[row][col].abs() > max_val {
                max_val = matrix[row][col].abs();
                max_row = row;
            }
        }
        if max_val <= scale * 1e-15 {
            return None;
        }
        if max_row != col {
            matrix.swap(col, max_row);
            rhs.swap(col, max_row);
        }
        for row in (col + 1)..N {
            let factor = matrix[row][col] / matrix[col][col];
            let pivot_row = matrix[col];
            for (j, m) in matrix[row].iter_mut().enumerate().skip(col) {
                *m -= factor * pivot_row[j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = rhs[i];
        for (j, &xj) in x.iter().enumerate().skip(i + 1) {
            sum -= matrix[i][j] * xj;
        }
        x[i] = sum / matrix[i][i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct Plane;

    impl LmModel<3> for Plane {
        fn evaluate(&self, x: f64, y: f64, p: &[f64; 3]) -> f64 {
            p[0] + p[1] * x + p[2] * y
        }

        fn jacobian_row(&self, x: f64, y: f64, _p: &[f64; 3]) -> [f64; 3] {
            [1.0, x, y]
        }
    }

    #[test]
    fn test_solve_3x3() {
        let a = [[2.0, 1.0, -1.0], [-3.0, -1.0, 2.0], [-2.0, 1.0, 2.0]];
        let b = [8.0, -11.0, -3.0];
        let x = solve(&a, &b).unwrap();
        assert_abs_diff_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_singular() {
        let a = [[1.0, 2.0], [2.0, 4.0]];
        assert!(solve(&a, &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_optimize_recovers_plane() {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                xs.push(i as f64);
                ys.push(j as f64);
                zs.push(1.5 - 0.25 * i as f64 + 2.0 * j as f64);
            }
        }
        let result = optimize(&Plane, &xs, &ys, &zs, [0.0; 3], &LmConfig::default());
        assert_abs_diff_eq!(result.params[0], 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(result.params[1], -0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(result.params[2], 2.0, epsilon = 1e-6);
        assert!(result.chi2 < 1e-10);
    }

    /// Plane with a fourth parameter that never reaches the model.
    struct LoosePlane;

    impl LmModel<4> for LoosePlane {
        fn evaluate(&self, x: f64, y: f64, p: &[f64; 4]) -> f64 {
            p[0] + p[1] * x + p[2] * y
        }

        fn jacobian_row(&self, x: f64, y: f64, _p: &[f64; 4]) -> [f64; 4] {
            [1.0, x, y, 0.0]
        }
    }

    #[test]
    fn test_unconstrained_parameter_stays_put() {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                xs.push(i as f64);
                ys.push(j as f64);
                zs.push(0.5 + i as f64 - j as f64);
            }
        }
        let result = optimize(&LoosePlane, &xs, &ys, &zs, [0.0, 0.0, 0.0, 7.0], &LmConfig::default());
        assert_abs_diff_eq!(result.params[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(result.params[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.params[2], -1.0, epsilon = 1e-6);
        assert_eq!(result.params[3], 7.0);
        assert!(result.converged);
    }
}
