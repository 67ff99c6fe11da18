/// Running median with a window of `window` samples and reflected edges.
///
/// The window is clamped to the sequence length. Even windows reach one sample
/// further back than forward.
pub fn running_median(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let window = window.clamp(1, n);
    let half = (window / 2) as isize;
    let mut buf = vec![0.0f64; window];

    (0..n)
        .map(|i| {
            for (k, slot) in buf.iter_mut().enumerate() {
                let src = reflect(i as isize + k as isize - half, n);
                *slot = values[src];
            }
            buf.sort_by(|a, b| a.total_cmp(b));
            buf[window / 2]
        })
        .collect()
}

/// Reflect an out-of-range index about the sequence edges (`d c b a | a b c d | d c b a`).
fn reflect(idx: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut i = idx.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}

/// Normalised Gaussian kernel truncated at 3 sigma.
fn make_gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (sigma * 3.0).ceil() as usize;
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f64; size];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0;

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f64 - radius as f64;
        *k = (-x * x / s2).exp();
        sum += *k;
    }

    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

/// Convolve a 1D sequence with a Gaussian, extending the edge values.
pub fn gaussian_smooth_1d(values: &[f64], sigma: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 || sigma <= 0.0 {
        return values.to_vec();
    }
    let kernel = make_gaussian_kernel(sigma);
    let radius = kernel.len() / 2;

    (0..n)
        .map(|i| {
            let mut sum = 0.0;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src =
                    (i as isize + ki as isize - radius as isize).clamp(0, n as isize - 1) as usize;
                sum += values[src] * kv;
            }
            sum
        })
        .collect()
}

/// Iterative sigma-clipped mean.
///
/// Values further than `sigma` standard deviations from the mean are rejected
/// and the statistics recomputed, until nothing changes or `iterations` is
/// reached. Returns `None` for an empty input.
pub fn clipped_mean(values: &[f64], sigma: f64, iterations: usize) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut mask = vec![true; values.len()];

    for _ in 0..iterations {
        let (mean, stddev) = mean_stddev(values, &mask);
        if stddev < 1e-12 {
            break;
        }
        let lo = mean - sigma * stddev;
        let hi = mean + sigma * stddev;
        let mut changed = false;
        for (keep, &v) in mask.iter_mut().zip(values) {
            if *keep && (v < lo || v > hi) {
                *keep = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let (mean, _) = mean_stddev(values, &mask);
    Some(mean)
}

fn mean_stddev(values: &[f64], mask: &[bool]) -> (f64, f64) {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if mask[i] {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;

    let mut var_sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        if mask[i] {
            let d = v - mean;
            var_sum += d * d;
        }
    }
    (mean, (var_sum / count as f64).sqrt())
}
