//! Componentwise adaptive random-walk proposals.
//!
//! Component `i` is perturbed by a mixture of two independent normal draws:
//! a unit-scale "nugget" draw weighted by `nugget[i]` and a kernel draw scaled
//! by `kernel_scales[i]` and weighted by `1 - nugget[i]`.

use rand::rngs::StdRng;

use super::{InferenceError, ProposalStats};
use crate::utils::sample_standard_normal;

#[derive(Debug, Clone)]
pub struct ComponentwiseRandomWalk {
    /// Per-component standard deviation of the kernel draw.
    pub kernel_scales: Vec<f64>,
    /// Per-component blend weight in `[0, 1]` of the unit nugget draw.
    pub nugget: Vec<f64>,
    stats: Vec<ProposalStats>,
}

impl ComponentwiseRandomWalk {
    /// # Errors
    ///
    /// Returns `InferenceError` if the vectors differ in length, a nugget lies
    /// outside `[0, 1]`, or a scale is negative or non-finite.
    pub fn new(kernel_scales: Vec<f64>, nugget: Vec<f64>) -> Result<Self, InferenceError> {
        if kernel_scales.len() != nugget.len() {
            return Err(InferenceError::LengthMismatch {
                expected: kernel_scales.len(),
                found: nugget.len(),
            });
        }
        if let Some(index) = nugget.iter().position(|w| !(0.0..=1.0).contains(w)) {
            return Err(InferenceError::InvalidNugget { index });
        }
        if let Some(index) = kernel_scales
            .iter()
            .position(|s| !(s.is_finite() && *s >= 0.0))
        {
            return Err(InferenceError::InvalidScale { index });
        }
        let stats = vec![ProposalStats::default(); nugget.len()];
        Ok(Self {
            kernel_scales,
            nugget,
            stats,
        })
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.nugget.len()
    }

    /// Write into `proposal[index]` a perturbation of `current[index]`. Other
    /// components of `proposal` are left as they are.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` on length mismatch or an out-of-range index.
    pub fn propose_into(
        &self,
        proposal: &mut [f64],
        current: &[f64],
        index: usize,
        rng: &mut StdRng,
    ) -> Result<(), InferenceError> {
        let dim = self.dimension();
        for len in [proposal.len(), current.len()] {
            if len != dim {
                return Err(InferenceError::LengthMismatch {
                    expected: dim,
                    found: len,
                });
            }
        }
        if index >= dim {
            return Err(InferenceError::IndexOutOfRange { index, len: dim });
        }
        let nugget = self.nugget[index];
        let nugget_draw = sample_standard_normal(rng);
        let kernel_draw = sample_standard_normal(rng);
        proposal[index] = (1.0 - nugget).mul_add(
            kernel_draw * self.kernel_scales[index],
            nugget.mul_add(nugget_draw, current[index]),
        );
        Ok(())
    }

    /// Copy of `current` with component `index` perturbed.
    ///
    /// # Errors
    ///
    /// See [`ComponentwiseRandomWalk::propose_into`].
    pub fn propose(
        &self,
        current: &[f64],
        index: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>, InferenceError> {
        let mut proposal = current.to_vec();
        self.propose_into(&mut proposal, current, index, rng)?;
        Ok(proposal)
    }

    /// Record whether the proposal for component `index` was accepted.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::IndexOutOfRange` for an unknown component.
    pub fn record(&mut self, index: usize, accepted: bool) -> Result<(), InferenceError> {
        let len = self.stats.len();
        self.stats
            .get_mut(index)
            .ok_or(InferenceError::IndexOutOfRange { index, len })?
            .record(accepted);
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> &[ProposalStats] {
        &self.stats
    }

    #[must_use]
    pub fn acceptance_rates(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.acceptance_rate()).collect()
    }
}
