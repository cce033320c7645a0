//! # Path inputs
//!
//! Defines the structural inputs of an LNA path simulation: the time grid,
//! the parameter trajectory, the stoichiometry, and an optional forcing
//! schedule. Stochastic draws are supplied separately so a caller can redraw
//! them while keeping the structure fixed.
//!
//! # Examples
//!
//! ```
//! use faer::Mat;
//! use lna_paths::LnaInput;
//!
//! // S -> I with initial volumes (S, I) = (90, 10) stored in columns 1..3.
//! let trajectory = Mat::from_fn(3, 3, |_, j| [0.5, 90.0, 10.0][j]);
//! let stoichiometry = Mat::from_fn(2, 1, |i, _| if i == 0 { -1.0 } else { 1.0 });
//! let input = LnaInput::new(vec![0.0, 1.0, 2.0], trajectory, stoichiometry, 1);
//!
//! assert!(input.validate().is_ok());
//! assert_eq!(input.initial_volumes(), vec![90.0, 10.0]);
//! ```
//!
//! ```
//! use faer::Mat;
//! use lna_paths::LnaInput;
//!
//! let trajectory = Mat::from_fn(3, 3, |_, j| [0.5, 90.0, 10.0][j]);
//! let stoichiometry = Mat::from_fn(2, 1, |i, _| if i == 0 { -1.0 } else { 1.0 });
//! let input = LnaInput::new(vec![0.0, 2.0, 1.0], trajectory, stoichiometry, 1);
//!
//! assert!(input.validate().is_err());
//! ```

use std::ops::Range;

use faer::Mat;
use thiserror::Error;

use crate::utils::{matrix_is_finite, slice_is_finite};

pub mod forcing;

pub use forcing::ForcingSchedule;

/// Errors returned when validating path inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("time grid must contain at least one time")]
    EmptyTimeGrid,
    #[error("time grid contains non-finite values")]
    NonFiniteTimes,
    #[error("time grid must be strictly increasing (violated at index {index})")]
    NonIncreasingTimes { index: usize },
    #[error("parameter trajectory rows ({rows}) must match grid length ({times})")]
    TrajectoryRowMismatch { rows: usize, times: usize },
    #[error("parameter trajectory contains non-finite values")]
    NonFiniteTrajectory,
    #[error("stoichiometry must have at least one compartment and one event")]
    EmptyStoichiometry,
    #[error("stoichiometry contains non-finite values")]
    NonFiniteStoichiometry,
    #[error(
        "initial volumes at offset {offset} for {compartments} compartments exceed trajectory width ({columns})"
    )]
    InitialVolumesOutOfRange {
        offset: usize,
        compartments: usize,
        columns: usize,
    },
    #[error("initial volume of compartment {compartment} is negative")]
    NegativeInitialVolume { compartment: usize },
    #[error("column range {start}..{end} is invalid for trajectory width ({columns})")]
    InvalidColumnRange {
        start: usize,
        end: usize,
        columns: usize,
    },
    #[error("time-varying columns must form the trailing block of the trajectory")]
    TimeVaryingNotTrailing,
    #[error("parameter columns overlap time-varying columns")]
    OverlappingColumnRanges,
    #[error("refresh flag length ({len}) must match grid length ({times})")]
    RefreshFlagLength { len: usize, times: usize },
    #[error("forcing flag length ({len}) must match grid length ({times})")]
    ForcingFlagLength { len: usize, times: usize },
    #[error("forcing magnitude column {column} exceeds trajectory width ({columns})")]
    ForcingColumnOutOfRange { column: usize, columns: usize },
    #[error(
        "forcing weights are {rows}x{cols}; expected {compartments} compartments x {forcings} forcings"
    )]
    ForcingWeightShape {
        rows: usize,
        cols: usize,
        compartments: usize,
        forcings: usize,
    },
    #[error("found {found} forcing transfer matrices for {forcings} forcings")]
    ForcingTransferCount { found: usize, forcings: usize },
    #[error("transfer matrix {forcing} is {rows}x{cols}; expected square of size {compartments}")]
    ForcingTransferShape {
        forcing: usize,
        rows: usize,
        cols: usize,
        compartments: usize,
    },
    #[error("forcing weights or transfers contain non-finite values")]
    NonFiniteForcing,
    #[error("draws are {rows}x{cols}; expected {events} events x {intervals} intervals")]
    DrawShape {
        rows: usize,
        cols: usize,
        events: usize,
        intervals: usize,
    },
    #[error("draws contain non-finite values")]
    NonFiniteDraws,
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("shape {found:?} does not match expected {expected:?}")]
    ShapeMismatch {
        found: (usize, usize),
        expected: (usize, usize),
    },
}

/// Structural inputs of one LNA path simulation.
#[derive(Debug, Clone)]
pub struct LnaInput {
    /// Interval endpoint times, strictly increasing.
    pub times: Vec<f64>,
    /// One row per grid time: parameters, constants, then time-varying covariates.
    pub trajectory: Mat<f64>,
    /// Columns of `trajectory` holding model parameters.
    pub parameter_columns: Range<usize>,
    /// Trailing columns of `trajectory` holding time-varying covariates.
    pub time_varying_columns: Range<usize>,
    /// Column where the initial compartment volumes start.
    pub init_offset: usize,
    /// One flag per grid time; `true` where the time-varying block is refreshed.
    pub refresh_flags: Vec<bool>,
    /// Compartments × event types.
    pub stoichiometry: Mat<f64>,
    pub forcing: Option<ForcingSchedule>,
}

impl LnaInput {
    /// Input with every trajectory column treated as a parameter, no
    /// time-varying covariates, and no forcings.
    #[must_use]
    pub fn new(
        times: Vec<f64>,
        trajectory: Mat<f64>,
        stoichiometry: Mat<f64>,
        init_offset: usize,
    ) -> Self {
        let n_times = times.len();
        let n_columns = trajectory.ncols();
        Self {
            times,
            trajectory,
            parameter_columns: 0..n_columns,
            time_varying_columns: n_columns..n_columns,
            init_offset,
            refresh_flags: vec![false; n_times],
            stoichiometry,
            forcing: None,
        }
    }

    #[must_use]
    pub fn with_parameter_columns(mut self, columns: Range<usize>) -> Self {
        self.parameter_columns = columns;
        self
    }

    /// Declare the trailing time-varying block and the grid times at which
    /// it is refreshed.
    #[must_use]
    pub fn with_time_varying(self, columns: Range<usize>, refresh_flags: Vec<bool>) -> Self {
        Self {
            time_varying_columns: columns,
            refresh_flags,
            ..self
        }
    }

    #[must_use]
    pub fn with_forcing(mut self, forcing: ForcingSchedule) -> Self {
        self.forcing = Some(forcing);
        self
    }

    #[must_use]
    pub const fn n_times(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub const fn n_intervals(&self) -> usize {
        self.times.len().saturating_sub(1)
    }

    #[must_use]
    pub fn n_events(&self) -> usize {
        self.stoichiometry.ncols()
    }

    #[must_use]
    pub fn n_compartments(&self) -> usize {
        self.stoichiometry.nrows()
    }

    /// Width of the trajectory rows, i.e. the parameter snapshot length.
    #[must_use]
    pub fn snapshot_len(&self) -> usize {
        self.trajectory.ncols()
    }

    /// Compartment volumes stored in trajectory row 0 at `init_offset`.
    ///
    /// Entries beyond the trajectory width are reported as zero; call
    /// [`LnaInput::validate`] first to rule that out.
    #[must_use]
    pub fn initial_volumes(&self) -> Vec<f64> {
        (0..self.n_compartments())
            .map(|k| {
                self.init_offset
                    .checked_add(k)
                    .filter(|&column| column < self.trajectory.ncols())
                    .map_or(0.0, |column| self.trajectory[(0, column)])
            })
            .collect()
    }

    /// Validate shapes and values of the grid, trajectory, stoichiometry, and
    /// forcing schedule.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if inputs are malformed.
    pub fn validate(&self) -> Result<(), InputError> {
        self.validate_times()?;
        let n_times = self.n_times();
        let n_columns = self.snapshot_len();
        if self.trajectory.nrows() != n_times {
            return Err(InputError::TrajectoryRowMismatch {
                rows: self.trajectory.nrows(),
                times: n_times,
            });
        }
        if !matrix_is_finite(&self.trajectory) {
            return Err(InputError::NonFiniteTrajectory);
        }
        if self.n_compartments() == 0 || self.n_events() == 0 {
            return Err(InputError::EmptyStoichiometry);
        }
        if !matrix_is_finite(&self.stoichiometry) {
            return Err(InputError::NonFiniteStoichiometry);
        }
        if self
            .init_offset
            .checked_add(self.n_compartments())
            .is_none_or(|end| end > n_columns)
        {
            return Err(InputError::InitialVolumesOutOfRange {
                offset: self.init_offset,
                compartments: self.n_compartments(),
                columns: n_columns,
            });
        }
        if let Some(compartment) = crate::utils::first_negative(&self.initial_volumes()) {
            return Err(InputError::NegativeInitialVolume { compartment });
        }
        self.validate_columns()?;
        if self.refresh_flags.len() != n_times {
            return Err(InputError::RefreshFlagLength {
                len: self.refresh_flags.len(),
                times: n_times,
            });
        }
        if let Some(forcing) = &self.forcing {
            forcing.validate(n_times, self.n_compartments(), n_columns)?;
        }
        Ok(())
    }

    /// Validate a draw matrix against this input: one row per event type and
    /// one column per interval.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if the draws have the wrong shape or non-finite values.
    pub fn validate_draws(&self, draws: &Mat<f64>) -> Result<(), InputError> {
        if draws.nrows() != self.n_events() || draws.ncols() != self.n_intervals() {
            return Err(InputError::DrawShape {
                rows: draws.nrows(),
                cols: draws.ncols(),
                events: self.n_events(),
                intervals: self.n_intervals(),
            });
        }
        if !matrix_is_finite(draws) {
            return Err(InputError::NonFiniteDraws);
        }
        Ok(())
    }

    fn validate_times(&self) -> Result<(), InputError> {
        if self.times.is_empty() {
            return Err(InputError::EmptyTimeGrid);
        }
        if !slice_is_finite(&self.times) {
            return Err(InputError::NonFiniteTimes);
        }
        if let Some(index) = self
            .times
            .windows(2)
            .position(|pair| pair[1] <= pair[0])
        {
            return Err(InputError::NonIncreasingTimes { index: index + 1 });
        }
        Ok(())
    }

    fn validate_columns(&self) -> Result<(), InputError> {
        let n_columns = self.snapshot_len();
        for range in [&self.parameter_columns, &self.time_varying_columns] {
            if range.start > range.end || range.end > n_columns {
                return Err(InputError::InvalidColumnRange {
                    start: range.start,
                    end: range.end,
                    columns: n_columns,
                });
            }
        }
        if !self.time_varying_columns.is_empty() && self.time_varying_columns.end != n_columns {
            return Err(InputError::TimeVaryingNotTrailing);
        }
        if !self.time_varying_columns.is_empty()
            && !self.parameter_columns.is_empty()
            && self.parameter_columns.end > self.time_varying_columns.start
        {
            return Err(InputError::OverlappingColumnRanges);
        }
        Ok(())
    }
}
