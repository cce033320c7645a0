//! MCMC helpers used alongside path proposals: acceptance counters, a
//! componentwise random-walk kernel, and interval-width adaptation for slice
//! sampling.

use thiserror::Error;

use crate::utils::usize_to_f64;

pub mod random_walk;
pub mod slice;

pub use random_walk::ComponentwiseRandomWalk;
pub use slice::IntervalWidthAdapter;

/// Errors for MCMC helper configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InferenceError {
    #[error("expected {expected} components, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("component index {index} is out of range for {len} components")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("nugget weight of component {index} must lie in [0, 1]")]
    InvalidNugget { index: usize },
    #[error("kernel scale of component {index} must be non-negative and finite")]
    InvalidScale { index: usize },
    #[error("interval width of component {index} must be positive and finite")]
    InvalidWidth { index: usize },
    #[error("adaptation factor must be finite")]
    InvalidAdaptationFactor,
    #[error("target ratio must lie in (0, 1)")]
    InvalidTargetRatio,
}

/// Proposal counters for a single Metropolis-Hastings block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    /// Record one proposal and whether it was accepted.
    pub const fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_stats_tracks_acceptance() {
        let mut stats = ProposalStats::default();
        stats.record(true);
        stats.record(false);
        assert!((stats.acceptance_rate() - 0.5).abs() < 1.0e-12);
    }

    #[test]
    fn empty_stats_have_zero_rate() {
        assert_eq!(ProposalStats::default().acceptance_rate(), 0.0);
    }
}
