pub mod interp;
pub mod lm;
pub mod smooth;

use ndarray::{Array, Dimension};

/// Reciprocal with `1/0 := 0`.
///
/// Used wherever a normalisation or inverse variance may legitimately be zero
/// (an empty voxel, a masked pixel). Never produces NaN or infinity for a zero
/// input.
#[inline]
pub fn safe_inverse(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        1.0 / value
    }
}

/// Element-wise [`safe_inverse`] of an array of any dimensionality.
pub fn safe_inverse_array<D: Dimension>(values: &Array<f64, D>) -> Array<f64, D> {
    values.mapv(safe_inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_safe_inverse_zero_is_zero() {
        assert_eq!(safe_inverse(0.0), 0.0);
        assert_eq!(safe_inverse(-0.0), 0.0);
        assert_eq!(safe_inverse(4.0), 0.25);
    }

    #[test]
    fn test_safe_inverse_array_has_no_non_finite_values() {
        let inv = safe_inverse_array(&array![[0.0, 2.0], [0.5, 0.0]]);
        assert!(inv.iter().all(|v| v.is_finite()));
        assert_eq!(inv, array![[0.0, 0.5], [2.0, 0.0]]);
    }
}
