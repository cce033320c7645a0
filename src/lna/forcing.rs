//! Forcing applicator.
//!
//! For each forcing type `k` at grid time `t` the magnitude `f` is read from the
//! trajectory, the weighted volumes `w ⊙ x` are L1-normalized into a
//! distribution, and `x += transfer[k] · (f · distribution)`. Forcing types are
//! applied in order, each seeing the volumes left by the previous one.

use faer::Mat;

use super::types::ZeroForcingPolicy;
use crate::input::ForcingSchedule;
use crate::utils::first_negative;

/// Failures detected while applying forcings at one grid time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForcingFailure {
    /// All weighted volumes of forcing `forcing` were zero under
    /// [`ZeroForcingPolicy::Reject`].
    Degenerate { forcing: usize },
    /// A compartment went negative once all forcings were applied.
    NegativeVolume { compartment: usize, value: f64 },
}

/// Applies scheduled forcings, reusing its scratch vectors between calls.
#[derive(Debug, Clone, Default)]
pub struct ForcingApplicator {
    distribution: Vec<f64>,
}

impl ForcingApplicator {
    #[must_use]
    pub fn new(n_compartments: usize) -> Self {
        Self {
            distribution: vec![0.0; n_compartments],
        }
    }

    /// Apply every forcing type of `schedule` at grid index `time_index`.
    ///
    /// # Errors
    ///
    /// Returns `ForcingFailure` on a rejected degenerate distribution or when a
    /// volume is negative after all forcing types were applied.
    pub fn apply(
        &mut self,
        volumes: &mut [f64],
        schedule: &ForcingSchedule,
        trajectory: &Mat<f64>,
        time_index: usize,
        policy: ZeroForcingPolicy,
    ) -> Result<(), ForcingFailure> {
        let n = volumes.len();
        self.distribution.resize(n, 0.0);

        for (forcing, &column) in schedule.magnitude_columns.iter().enumerate() {
            let magnitude = trajectory[(time_index, column)];
            let mut norm = 0.0;
            for (i, slot) in self.distribution.iter_mut().enumerate() {
                *slot = schedule.weights[(i, forcing)] * volumes[i];
                norm += slot.abs();
            }

            if norm == 0.0 {
                match policy {
                    ZeroForcingPolicy::ZeroDistribution => {
                        log::debug!(
                            "forcing {forcing} at time index {time_index} has no mass to move"
                        );
                        continue;
                    }
                    ZeroForcingPolicy::Reject => {
                        return Err(ForcingFailure::Degenerate { forcing });
                    }
                }
            }

            let scale = magnitude / norm;
            for slot in &mut self.distribution {
                *slot *= scale;
            }
            let transfer = &schedule.transfers[forcing];
            for (i, volume) in volumes.iter_mut().enumerate() {
                *volume += (0..n)
                    .map(|m| transfer[(i, m)] * self.distribution[m])
                    .sum::<f64>();
            }
        }

        if let Some(compartment) = first_negative(volumes) {
            return Err(ForcingFailure::NegativeVolume {
                compartment,
                value: volumes[compartment],
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Three compartments (S, E, V); forcing 0 vaccinates S and E into V.
    fn vaccination(flags: Vec<bool>) -> ForcingSchedule {
        ForcingSchedule::new(
            flags,
            vec![1],
            Mat::from_fn(3, 1, |i, _| if i < 2 { 1.0 } else { 0.0 }),
            vec![Mat::from_fn(3, 3, |i, j| match (i, j) {
                (0, 0) | (1, 1) => -1.0,
                (2, 0) | (2, 1) => 1.0,
                _ => 0.0,
            })],
        )
    }

    fn trajectory(magnitude: f64) -> Mat<f64> {
        Mat::from_fn(2, 2, |_, j| if j == 1 { magnitude } else { 0.1 })
    }

    #[test]
    fn mass_moves_proportionally_to_weighted_volumes() {
        let schedule = vaccination(vec![true, false]);
        let mut volumes = vec![60.0, 20.0, 0.0];
        let mut applicator = ForcingApplicator::new(3);
        applicator
            .apply(
                &mut volumes,
                &schedule,
                &trajectory(8.0),
                0,
                ZeroForcingPolicy::ZeroDistribution,
            )
            .expect("forcing applies");
        assert_relative_eq!(volumes[0], 54.0, epsilon = 1.0e-12);
        assert_relative_eq!(volumes[1], 18.0, epsilon = 1.0e-12);
        assert_relative_eq!(volumes[2], 8.0, epsilon = 1.0e-12);
        assert_relative_eq!(volumes.iter().sum::<f64>(), 80.0, epsilon = 1.0e-12);
    }

    #[test]
    fn empty_source_is_a_no_op_by_default() {
        let schedule = vaccination(vec![true, false]);
        let mut volumes = vec![0.0, 0.0, 5.0];
        let mut applicator = ForcingApplicator::new(3);
        applicator
            .apply(
                &mut volumes,
                &schedule,
                &trajectory(3.0),
                0,
                ZeroForcingPolicy::ZeroDistribution,
            )
            .expect("no-op");
        assert_eq!(volumes, vec![0.0, 0.0, 5.0]);
    }

    #[test]
    fn empty_source_is_rejected_when_requested() {
        let schedule = vaccination(vec![true, false]);
        let mut volumes = vec![0.0, 0.0, 5.0];
        let mut applicator = ForcingApplicator::new(3);
        let err = applicator
            .apply(
                &mut volumes,
                &schedule,
                &trajectory(3.0),
                0,
                ZeroForcingPolicy::Reject,
            )
            .expect_err("degenerate");
        assert_eq!(err, ForcingFailure::Degenerate { forcing: 0 });
    }

    #[test]
    fn oversized_forcing_reports_negative_volume() {
        let schedule = vaccination(vec![true, false]);
        let mut volumes = vec![3.0, 1.0, 0.0];
        let mut applicator = ForcingApplicator::new(3);
        let err = applicator
            .apply(
                &mut volumes,
                &schedule,
                &trajectory(10.0),
                1,
                ZeroForcingPolicy::ZeroDistribution,
            )
            .expect_err("too much mass moved");
        assert!(matches!(
            err,
            ForcingFailure::NegativeVolume { compartment: 0, value } if value < 0.0
        ));
    }
}
