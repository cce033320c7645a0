//! Robbins-Monro adaptation of slice-sampling interval widths.
//!
//! Each component keeps the expansions and contractions seen since the last
//! update and the cumulative totals over the whole run. On update the log
//! width moves by `adaptation_factor * (expansion_share - target_ratio)`.

use super::InferenceError;

#[derive(Debug, Clone)]
pub struct IntervalWidthAdapter {
    widths: Vec<f64>,
    expansions: Vec<f64>,
    contractions: Vec<f64>,
    cumulative_expansions: Vec<f64>,
    cumulative_contractions: Vec<f64>,
    slice_ratios: Vec<f64>,
}

impl IntervalWidthAdapter {
    /// # Errors
    ///
    /// Returns `InferenceError::InvalidWidth` if a width is not positive and finite.
    pub fn new(widths: Vec<f64>) -> Result<Self, InferenceError> {
        if let Some(index) = widths.iter().position(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(InferenceError::InvalidWidth { index });
        }
        let n = widths.len();
        Ok(Self {
            widths,
            expansions: vec![0.0; n],
            contractions: vec![0.0; n],
            cumulative_expansions: vec![0.0; n],
            cumulative_contractions: vec![0.0; n],
            slice_ratios: vec![0.0; n],
        })
    }

    #[must_use]
    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    /// Cumulative expansion share per component as of the last update.
    #[must_use]
    pub fn slice_ratios(&self) -> &[f64] {
        &self.slice_ratios
    }

    /// Expansions and contractions recorded since the last update.
    #[must_use]
    pub fn pending_counts(&self, index: usize) -> Option<(f64, f64)> {
        Some((*self.expansions.get(index)?, *self.contractions.get(index)?))
    }

    /// Record the expansions and contractions of one slice-sampling step.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::IndexOutOfRange` for an unknown component.
    pub fn record(
        &mut self,
        index: usize,
        expansions: usize,
        contractions: usize,
    ) -> Result<(), InferenceError> {
        let len = self.widths.len();
        if index >= len {
            return Err(InferenceError::IndexOutOfRange { index, len });
        }
        let expansions = crate::utils::usize_to_f64(expansions);
        let contractions = crate::utils::usize_to_f64(contractions);
        self.expansions[index] += expansions;
        self.contractions[index] += contractions;
        self.cumulative_expansions[index] += expansions;
        self.cumulative_contractions[index] += contractions;
        Ok(())
    }

    /// Move every log width toward the target expansion share and reset the
    /// per-update counters.
    ///
    /// Components with no expansions (or no contractions) since the last
    /// update use the cumulative expansion share in place of the zero count.
    /// A component with no cumulative history uses `target_ratio` as its
    /// share, and a width whose share is still undefined is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` if `adaptation_factor` is not finite or
    /// `target_ratio` lies outside `(0, 1)`.
    pub fn update(
        &mut self,
        adaptation_factor: f64,
        target_ratio: f64,
    ) -> Result<(), InferenceError> {
        if !adaptation_factor.is_finite() {
            return Err(InferenceError::InvalidAdaptationFactor);
        }
        if !(target_ratio > 0.0 && target_ratio < 1.0) {
            return Err(InferenceError::InvalidTargetRatio);
        }

        for k in 0..self.widths.len() {
            let total = self.cumulative_expansions[k] + self.cumulative_contractions[k];
            self.slice_ratios[k] = if total > 0.0 {
                self.cumulative_expansions[k] / total
            } else {
                target_ratio
            };

            let expansions = if self.expansions[k] == 0.0 {
                self.slice_ratios[k]
            } else {
                self.expansions[k]
            };
            let contractions = if self.contractions[k] == 0.0 {
                self.slice_ratios[k]
            } else {
                self.contractions[k]
            };
            let denominator = expansions + contractions;
            if denominator > 0.0 {
                let share = expansions / denominator;
                self.widths[k] = adaptation_factor
                    .mul_add(share - target_ratio, self.widths[k].ln())
                    .exp();
            }
        }

        self.expansions.fill(0.0);
        self.contractions.fill(0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frequent_expansions_widen_the_interval() {
        let mut adapter = IntervalWidthAdapter::new(vec![1.0]).expect("valid");
        adapter.record(0, 3, 1).expect("known");
        adapter.update(0.5, 0.5).expect("update");
        assert_relative_eq!(adapter.widths()[0], (0.5 * 0.25f64).exp(), epsilon = 1.0e-12);
        assert_relative_eq!(adapter.slice_ratios()[0], 0.75, epsilon = 1.0e-12);
    }

    #[test]
    fn frequent_contractions_narrow_the_interval() {
        let mut adapter = IntervalWidthAdapter::new(vec![2.0]).expect("valid");
        adapter.record(0, 1, 4).expect("known");
        adapter.update(1.0, 0.5).expect("update");
        assert!(adapter.widths()[0] < 2.0);
    }

    #[test]
    fn zero_counts_use_cumulative_ratio() {
        let mut adapter = IntervalWidthAdapter::new(vec![1.0]).expect("valid");
        adapter.record(0, 2, 2).expect("known");
        adapter.update(1.0, 0.5).expect("first update");
        adapter.record(0, 0, 3).expect("known");
        adapter.update(1.0, 0.5).expect("second update");
        // cumulative share 2/7 stands in for the zero expansion count
        let ratio: f64 = 2.0 / 7.0;
        let share = ratio / (ratio + 3.0);
        assert_relative_eq!(adapter.widths()[0], (share - 0.5).exp(), epsilon = 1.0e-12);
    }

    #[test]
    fn no_history_keeps_width_finite() {
        let mut adapter = IntervalWidthAdapter::new(vec![1.5, 0.5]).expect("valid");
        adapter.update(1.0, 0.3).expect("update");
        for width in adapter.widths() {
            assert!(width.is_finite());
        }
        assert_relative_eq!(adapter.widths()[0], 1.5 * 0.2f64.exp(), epsilon = 1.0e-12);
    }

    #[test]
    fn counters_reset_after_update() {
        let mut adapter = IntervalWidthAdapter::new(vec![1.0]).expect("valid");
        adapter.record(0, 5, 2).expect("known");
        adapter.update(0.1, 0.5).expect("update");
        assert_eq!(adapter.pending_counts(0), Some((0.0, 0.0)));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert_eq!(
            IntervalWidthAdapter::new(vec![1.0, 0.0]).map(|_| ()),
            Err(InferenceError::InvalidWidth { index: 1 })
        );
        let mut adapter = IntervalWidthAdapter::new(vec![1.0]).expect("valid");
        assert_eq!(adapter.update(1.0, 1.0), Err(InferenceError::InvalidTargetRatio));
        assert_eq!(
            adapter.record(3, 1, 1),
            Err(InferenceError::IndexOutOfRange { index: 3, len: 1 })
        );
    }
}
