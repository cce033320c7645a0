/////////////////////////////////////////////////////////////////////////////////////////////\
//
// Shared numeric helpers for path simulation and MCMC collaborators.
//
// Created on: 17 Oct 2026
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Utilities
//!
//! Finiteness checks, index conversions, and standard-normal draws shared by
//! the path engine and the inference helpers.

use faer::Mat;
use rand::RngExt;
use rand::rngs::StdRng;

#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[must_use]
pub fn matrix_is_finite(matrix: &Mat<f64>) -> bool {
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            if !matrix[(i, j)].is_finite() {
                return false;
            }
        }
    }
    true
}

#[must_use]
pub fn slice_is_finite(values: &[f64]) -> bool {
    values.iter().all(|value| value.is_finite())
}

/// Index of the first strictly negative entry, if any.
#[must_use]
pub fn first_negative(values: &[f64]) -> Option<usize> {
    values.iter().position(|value| *value < 0.0)
}

/// Box-Muller standard normal draw.
pub fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Matrix of independent standard normal draws, filled column by column.
pub fn standard_normal_matrix(rng: &mut StdRng, nrows: usize, ncols: usize) -> Mat<f64> {
    let mut draws = Mat::<f64>::zeros(nrows, ncols);
    for j in 0..ncols {
        for i in 0..nrows {
            draws[(i, j)] = sample_standard_normal(rng);
        }
    }
    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn matrix_is_finite_detects_nan() {
        let matrix = Mat::from_fn(2, 1, |i, _| if i == 0 { 1.0 } else { f64::NAN });
        assert!(!matrix_is_finite(&matrix));
    }

    #[test]
    fn first_negative_ignores_zero() {
        assert_eq!(first_negative(&[0.0, 1.0, -0.0]), None);
        assert_eq!(first_negative(&[0.0, -1.0e-12, -2.0]), Some(1));
    }

    #[test]
    fn standard_normal_matrix_is_seeded_and_finite() {
        let mut first = StdRng::seed_from_u64(11);
        let mut second = StdRng::seed_from_u64(11);
        let a = standard_normal_matrix(&mut first, 3, 4);
        let b = standard_normal_matrix(&mut second, 3, 4);
        assert!(matrix_is_finite(&a));
        for i in 0..3 {
            for j in 0..4 {
                assert_eq!(a[(i, j)].to_bits(), b[(i, j)].to_bits());
            }
        }
    }

    #[test]
    fn standard_normal_draws_have_plausible_moments() {
        let mut rng = StdRng::seed_from_u64(2024);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| sample_standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / usize_to_f64(n);
        let variance =
            draws.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / usize_to_f64(n - 1);
        assert!(mean.abs() < 0.05);
        assert!((variance - 1.0).abs() < 0.05);
    }
}
