//! Core public types for the LNA path engine.

use faer::Mat;
use thiserror::Error;

use crate::input::InputError;

/// Point in an interval at which a compartment volume went negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeStage {
    /// After adding `stoichiometry · increment`.
    Increment,
    /// After applying the forcings scheduled at the end of the interval.
    Forcing,
}

/// Category of an [`LnaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    IntegrationFailure,
    DecompositionFailure,
    NegativeIncrement,
    NegativeVolume,
    DegenerateForcing,
}

/// Errors returned by path simulation.
///
/// Every variant except `InvalidInput` and `InvalidOptions` describes a
/// draw/parameter combination that is inadmissible for the model and carries
/// the index of the interval whose processing failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LnaError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error("invalid LNA options: {0}")]
    InvalidOptions(&'static str),
    #[error("integration produced non-finite drift or diffusion on interval {interval}")]
    IntegrationFailure { interval: usize },
    #[error("diffusion square root failed to converge on interval {interval}")]
    DecompositionFailure { interval: usize },
    #[error("event {event} has negative increment {value} on interval {interval}")]
    NegativeIncrement {
        interval: usize,
        event: usize,
        value: f64,
    },
    #[error(
        "compartment {compartment} is negative ({value}) after {stage:?} on interval {interval}"
    )]
    NegativeVolume {
        interval: usize,
        compartment: usize,
        stage: VolumeStage,
        value: f64,
    },
    #[error("forcing {forcing} has an all-zero weighted distribution on interval {interval}")]
    DegenerateForcing { interval: usize, forcing: usize },
}

impl LnaError {
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidInput(_) | Self::InvalidOptions(_) => FailureKind::InvalidInput,
            Self::IntegrationFailure { .. } => FailureKind::IntegrationFailure,
            Self::DecompositionFailure { .. } => FailureKind::DecompositionFailure,
            Self::NegativeIncrement { .. } => FailureKind::NegativeIncrement,
            Self::NegativeVolume { .. } => FailureKind::NegativeVolume,
            Self::DegenerateForcing { .. } => FailureKind::DegenerateForcing,
        }
    }

    /// Interval at which the path failed, if this is a path failure.
    #[must_use]
    pub const fn interval(&self) -> Option<usize> {
        match self {
            Self::InvalidInput(_) | Self::InvalidOptions(_) => None,
            Self::IntegrationFailure { interval }
            | Self::DecompositionFailure { interval }
            | Self::NegativeIncrement { interval, .. }
            | Self::NegativeVolume { interval, .. }
            | Self::DegenerateForcing { interval, .. } => Some(*interval),
        }
    }

    /// Whether redrawing the perturbations may produce an admissible path.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.interval().is_some()
    }
}

/// Handling of a forcing whose weighted volume vector is entirely zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroForcingPolicy {
    /// The distribution is zero and the forcing moves no mass.
    #[default]
    ZeroDistribution,
    /// Fail with [`LnaError::DegenerateForcing`].
    Reject,
}

/// Controls for path simulation.
#[derive(Debug, Clone, Copy)]
pub struct LnaOptions {
    /// Initial step size handed to the solver on every interval.
    pub step_size: f64,
    /// Total attempts allowed by [`crate::propose_lna_path`], including the first.
    pub max_attempts: usize,
    pub zero_forcing_policy: ZeroForcingPolicy,
}

impl Default for LnaOptions {
    fn default() -> Self {
        Self {
            step_size: 1.0e-6,
            max_attempts: 1,
            zero_forcing_policy: ZeroForcingPolicy::ZeroDistribution,
        }
    }
}

impl LnaOptions {
    /// # Errors
    ///
    /// Returns `LnaError::InvalidOptions` if the step size is not positive and
    /// finite or no attempts are allowed.
    pub fn validate(self) -> Result<(), LnaError> {
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(LnaError::InvalidOptions(
                "step size must be positive and finite",
            ));
        }
        if self.max_attempts == 0 {
            return Err(LnaError::InvalidOptions("max_attempts must be positive"));
        }
        Ok(())
    }
}

/// A simulated LNA path.
#[derive(Debug, Clone)]
pub struct LnaPath {
    /// The standard-normal draws the path was built from (events × intervals).
    pub draws: Mat<f64>,
    /// Grid times × (time, event increments...); row 0 holds zero increments.
    pub incidence: Mat<f64>,
    /// Grid times × (time, compartment volumes...).
    pub prevalence: Mat<f64>,
}

impl LnaPath {
    #[must_use]
    pub fn n_times(&self) -> usize {
        self.incidence.nrows()
    }

    /// Event increments recorded at grid index `time_index`.
    #[must_use]
    pub fn increments_at(&self, time_index: usize) -> Vec<f64> {
        (1..self.incidence.ncols())
            .map(|j| self.incidence[(time_index, j)])
            .collect()
    }

    /// Compartment volumes recorded at grid index `time_index`.
    #[must_use]
    pub fn volumes_at(&self, time_index: usize) -> Vec<f64> {
        (1..self.prevalence.ncols())
            .map(|j| self.prevalence[(time_index, j)])
            .collect()
    }
}

/// Result of [`crate::propose_lna_path`].
#[derive(Debug, Clone)]
pub struct LnaProposal {
    pub path: LnaPath,
    /// Attempts used, including the successful one.
    pub attempts: usize,
    /// Failures of the rejected attempts, in order.
    pub failures: Vec<LnaError>,
}
