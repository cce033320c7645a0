//! Data movement between parameter vectors and trajectory matrices.

use faer::Mat;

use crate::input::InputError;

/// Overwrite the leading `parameters.len()` columns of every trajectory row.
///
/// # Errors
///
/// Returns `InputError::ShapeMismatch` if there are more parameters than columns.
pub fn broadcast_parameters(
    trajectory: &mut Mat<f64>,
    parameters: &[f64],
) -> Result<(), InputError> {
    if parameters.len() > trajectory.ncols() {
        return Err(InputError::ShapeMismatch {
            found: (1, parameters.len()),
            expected: (1, trajectory.ncols()),
        });
    }
    for row in 0..trajectory.nrows() {
        for (col, value) in parameters.iter().enumerate() {
            trajectory[(row, col)] = *value;
        }
    }
    Ok(())
}

/// Copy `orig[index]` into `dest[index]`.
///
/// # Errors
///
/// Returns `InputError::IndexOutOfRange` if `index` is outside either slice.
pub fn copy_element(dest: &mut [f64], orig: &[f64], index: usize) -> Result<(), InputError> {
    let len = dest.len().min(orig.len());
    if index >= len {
        return Err(InputError::IndexOutOfRange { index, len });
    }
    dest[index] = orig[index];
    Ok(())
}

/// Copy column `column` of `orig` into the same column of `dest`.
///
/// # Errors
///
/// Returns `InputError` if the row counts differ or `column` is out of range.
pub fn copy_column(
    dest: &mut Mat<f64>,
    orig: &Mat<f64>,
    column: usize,
) -> Result<(), InputError> {
    if dest.nrows() != orig.nrows() {
        return Err(InputError::ShapeMismatch {
            found: (orig.nrows(), orig.ncols()),
            expected: (dest.nrows(), dest.ncols()),
        });
    }
    let len = dest.ncols().min(orig.ncols());
    if column >= len {
        return Err(InputError::IndexOutOfRange { index: column, len });
    }
    for row in 0..dest.nrows() {
        dest[(row, column)] = orig[(row, column)];
    }
    Ok(())
}

/// Write row `i` of `orig` into row `indices[i]` of `dest`.
///
/// # Errors
///
/// Returns `InputError` if `orig` does not have one row per index with the
/// width of `dest`, or an index exceeds `dest`'s rows.
pub fn scatter_rows(
    dest: &mut Mat<f64>,
    orig: &Mat<f64>,
    indices: &[usize],
) -> Result<(), InputError> {
    if orig.nrows() != indices.len() || orig.ncols() != dest.ncols() {
        return Err(InputError::ShapeMismatch {
            found: (orig.nrows(), orig.ncols()),
            expected: (indices.len(), dest.ncols()),
        });
    }
    if let Some(&index) = indices.iter().find(|&&index| index >= dest.nrows()) {
        return Err(InputError::IndexOutOfRange {
            index,
            len: dest.nrows(),
        });
    }
    for (source, &target) in indices.iter().enumerate() {
        for col in 0..dest.ncols() {
            dest[(target, col)] = orig[(source, col)];
        }
    }
    Ok(())
}
