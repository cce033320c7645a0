//! Matrix square root of the LNA diffusion.
//!
//! The diffusion returned by the moment equations is symmetric positive
//! semi-definite in exact arithmetic but routinely comes back slightly
//! indefinite or singular. The square root is taken through an SVD with
//! negative singular values clamped to zero, and entries where the diffusion
//! itself is exactly zero are forced back to zero.

use faer::Mat;
use thiserror::Error;

/// The SVD of the diffusion matrix did not converge.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("singular value decomposition did not converge")]
pub struct DecompositionError;

/// Compute `S = U · diag(sqrt(max(d, 0))) · Vᵗ` for `diffusion = U · diag(d) · Vᵗ`.
///
/// # Errors
///
/// Returns `DecompositionError` if the decomposition fails.
pub fn diffusion_sqrt(diffusion: &Mat<f64>) -> Result<Mat<f64>, DecompositionError> {
    let mut sqrt = Mat::<f64>::zeros(diffusion.nrows(), diffusion.ncols());
    diffusion_sqrt_into(diffusion, &mut sqrt)?;
    Ok(sqrt)
}

/// In-place variant of [`diffusion_sqrt`] writing into a preallocated square matrix.
///
/// # Errors
///
/// Returns `DecompositionError` if the decomposition fails or `out` does not
/// match the shape of `diffusion`.
pub fn diffusion_sqrt_into(
    diffusion: &Mat<f64>,
    out: &mut Mat<f64>,
) -> Result<(), DecompositionError> {
    let n = diffusion.nrows();
    if diffusion.ncols() != n || out.nrows() != n || out.ncols() != n {
        return Err(DecompositionError);
    }
    if n == 0 {
        return Ok(());
    }

    let svd = diffusion.svd().map_err(|_| DecompositionError)?;
    let u = svd.U();
    let v = svd.V();
    let singular = svd.S().column_vector();
    let roots: Vec<f64> = (0..n).map(|k| singular[k].max(0.0).sqrt()).collect();

    for i in 0..n {
        for j in 0..n {
            out[(i, j)] = if diffusion[(i, j)] == 0.0 {
                0.0
            } else {
                (0..n).map(|k| u[(i, k)] * roots[k] * v[(j, k)]).sum()
            };
        }
    }
    if !crate::utils::matrix_is_finite(out) {
        return Err(DecompositionError);
    }
    Ok(())
}
