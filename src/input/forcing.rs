//! Forcing schedule containers.
//!
//! A forcing is a scheduled, instantaneous redistribution of compartment mass
//! (immigration, vaccination pulses, ...). Each forcing type carries a weight
//! column over compartments and a compartment-to-compartment transfer matrix;
//! its magnitude at each grid time is read from a column of the parameter
//! trajectory.

use faer::Mat;

use super::InputError;
use crate::utils::matrix_is_finite;

/// Forcings applied at flagged grid times.
#[derive(Debug, Clone)]
pub struct ForcingSchedule {
    /// One flag per grid time; `true` where forcings are applied.
    pub flags: Vec<bool>,
    /// Trajectory column holding the magnitude of each forcing type.
    pub magnitude_columns: Vec<usize>,
    /// Compartments × forcing types matrix of distribution weights.
    pub weights: Mat<f64>,
    /// One compartments × compartments transfer matrix per forcing type.
    pub transfers: Vec<Mat<f64>>,
}

impl ForcingSchedule {
    #[must_use]
    pub const fn new(
        flags: Vec<bool>,
        magnitude_columns: Vec<usize>,
        weights: Mat<f64>,
        transfers: Vec<Mat<f64>>,
    ) -> Self {
        Self {
            flags,
            magnitude_columns,
            weights,
            transfers,
        }
    }

    #[must_use]
    pub const fn n_forcings(&self) -> usize {
        self.magnitude_columns.len()
    }

    /// Whether forcings are scheduled at grid index `time_index`.
    #[must_use]
    pub fn is_scheduled(&self, time_index: usize) -> bool {
        self.flags.get(time_index).copied().unwrap_or(false)
    }

    /// # Errors
    ///
    /// Returns `InputError` if the schedule does not fit the grid, the
    /// compartment count, or the trajectory width.
    pub fn validate(
        &self,
        n_times: usize,
        n_compartments: usize,
        trajectory_columns: usize,
    ) -> Result<(), InputError> {
        if self.flags.len() != n_times {
            return Err(InputError::ForcingFlagLength {
                len: self.flags.len(),
                times: n_times,
            });
        }
        if let Some(&column) = self
            .magnitude_columns
            .iter()
            .find(|&&column| column >= trajectory_columns)
        {
            return Err(InputError::ForcingColumnOutOfRange {
                column,
                columns: trajectory_columns,
            });
        }
        let n_forcings = self.n_forcings();
        if self.weights.nrows() != n_compartments || self.weights.ncols() != n_forcings {
            return Err(InputError::ForcingWeightShape {
                rows: self.weights.nrows(),
                cols: self.weights.ncols(),
                compartments: n_compartments,
                forcings: n_forcings,
            });
        }
        if self.transfers.len() != n_forcings {
            return Err(InputError::ForcingTransferCount {
                found: self.transfers.len(),
                forcings: n_forcings,
            });
        }
        for (forcing, transfer) in self.transfers.iter().enumerate() {
            if transfer.nrows() != n_compartments || transfer.ncols() != n_compartments {
                return Err(InputError::ForcingTransferShape {
                    forcing,
                    rows: transfer.nrows(),
                    cols: transfer.ncols(),
                    compartments: n_compartments,
                });
            }
        }
        if !matrix_is_finite(&self.weights) || !self.transfers.iter().all(matrix_is_finite) {
            return Err(InputError::NonFiniteForcing);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_s_to_i() -> Mat<f64> {
        Mat::from_fn(2, 2, |i, j| match (i, j) {
            (0, 0) => -1.0,
            (1, 0) => 1.0,
            _ => 0.0,
        })
    }

    fn schedule() -> ForcingSchedule {
        ForcingSchedule::new(
            vec![false, true, false],
            vec![2],
            Mat::from_fn(2, 1, |i, _| if i == 0 { 1.0 } else { 0.0 }),
            vec![transfer_s_to_i()],
        )
    }

    #[test]
    fn validate_accepts_matching_schedule() {
        assert!(schedule().validate(3, 2, 3).is_ok());
        assert!(schedule().is_scheduled(1));
        assert!(!schedule().is_scheduled(7));
    }

    #[test]
    fn validate_rejects_flag_length() {
        let err = schedule().validate(4, 2, 3).expect_err("flag length");
        assert_eq!(err, InputError::ForcingFlagLength { len: 3, times: 4 });
    }

    #[test]
    fn validate_rejects_magnitude_column_out_of_range() {
        let err = schedule().validate(3, 2, 2).expect_err("column range");
        assert_eq!(
            err,
            InputError::ForcingColumnOutOfRange {
                column: 2,
                columns: 2
            }
        );
    }

    #[test]
    fn validate_rejects_transfer_shape() {
        let mut bad = schedule();
        bad.transfers = vec![Mat::<f64>::zeros(3, 2)];
        let err = bad.validate(3, 2, 3).expect_err("transfer shape");
        assert_eq!(
            err,
            InputError::ForcingTransferShape {
                forcing: 0,
                rows: 3,
                cols: 2,
                compartments: 2
            }
        );
    }

    #[test]
    fn validate_rejects_non_finite_weights() {
        let mut bad = schedule();
        bad.weights[(1, 0)] = f64::NAN;
        assert_eq!(
            bad.validate(3, 2, 3),
            Err(InputError::NonFiniteForcing)
        );
    }
}
