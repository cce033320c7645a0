//! Path assembly for the non-centered LNA.
//!
//! Given the structural input, a matrix of standard-normal draws, and a
//! solver, the assembler walks the time grid once. On each interval it
//! integrates the moment equations, maps the interval's draws through the
//! square root of the diffusion, converts the log-scale increment with
//! `exp(x) - 1`, and advances the compartment volumes. Inadmissible states are
//! reported as soon as they appear; nothing is clamped.

use faer::Mat;

use super::diffusion::diffusion_sqrt_into;
use super::forcing::{ForcingApplicator, ForcingFailure};
use super::solver::{LnaSolver, moment_len};
use super::types::{LnaError, LnaOptions, LnaPath, VolumeStage};
use crate::input::LnaInput;
use crate::utils::{first_negative, matrix_is_finite, slice_is_finite};

/// Reusable working storage for path simulation.
///
/// Buffers are sized for one model configuration and resized automatically
/// when an input with different dimensions is simulated.
#[derive(Debug, Clone)]
pub struct LnaPathAssembler {
    moments: Vec<f64>,
    drift: Vec<f64>,
    diffusion: Mat<f64>,
    diffusion_sqrt: Mat<f64>,
    log_increment: Vec<f64>,
    increment: Vec<f64>,
    volumes: Vec<f64>,
    snapshot: Vec<f64>,
    forcing: ForcingApplicator,
}

impl LnaPathAssembler {
    #[must_use]
    pub fn new(n_events: usize, n_compartments: usize) -> Self {
        Self {
            moments: vec![0.0; moment_len(n_events)],
            drift: vec![0.0; n_events],
            diffusion: Mat::zeros(n_events, n_events),
            diffusion_sqrt: Mat::zeros(n_events, n_events),
            log_increment: vec![0.0; n_events],
            increment: vec![0.0; n_events],
            volumes: vec![0.0; n_compartments],
            snapshot: Vec::new(),
            forcing: ForcingApplicator::new(n_compartments),
        }
    }

    #[must_use]
    pub fn for_input(input: &LnaInput) -> Self {
        Self::new(input.n_events(), input.n_compartments())
    }

    fn fit_to(&mut self, n_events: usize, n_compartments: usize) {
        if self.drift.len() != n_events || self.volumes.len() != n_compartments {
            *self = Self::new(n_events, n_compartments);
        }
    }

    /// Simulate one path. Performs exactly one pass over the grid; retrying
    /// with fresh draws is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns `LnaError::InvalidInput` or `LnaError::InvalidOptions` before
    /// any integration if the inputs are malformed, and a path failure
    /// carrying the interval index if the draws lead to an inadmissible state.
    pub fn simulate<S: LnaSolver + ?Sized>(
        &mut self,
        input: &LnaInput,
        draws: &Mat<f64>,
        options: LnaOptions,
        solver: &mut S,
    ) -> Result<LnaPath, LnaError> {
        options.validate()?;
        input.validate()?;
        input.validate_draws(draws)?;

        let n_events = input.n_events();
        let n_compartments = input.n_compartments();
        let n_times = input.n_times();
        let init = input.init_offset..input.init_offset + n_compartments;
        self.fit_to(n_events, n_compartments);

        self.snapshot.clear();
        self.snapshot
            .extend((0..input.snapshot_len()).map(|col| input.trajectory[(0, col)]));
        solver.install_parameters(&self.snapshot);
        self.volumes.copy_from_slice(&self.snapshot[init.clone()]);

        let mut incidence = Mat::<f64>::zeros(n_times, n_events + 1);
        let mut prevalence = Mat::<f64>::zeros(n_times, n_compartments + 1);
        for (row, &time) in input.times.iter().enumerate() {
            incidence[(row, 0)] = time;
            prevalence[(row, 0)] = time;
        }

        if let Some(schedule) = input.forcing.as_ref().filter(|s| s.is_scheduled(0)) {
            self.forcing
                .apply(
                    &mut self.volumes,
                    schedule,
                    &input.trajectory,
                    0,
                    options.zero_forcing_policy,
                )
                .map_err(|failure| forcing_error(failure, 0))
                .map_err(log_failure)?;
            self.check_finite_volumes(0).map_err(log_failure)?;
        }
        record(&mut prevalence, 0, &self.volumes);

        for interval in 0..input.n_intervals() {
            self.advance(input, draws, options, solver, interval)
                .map_err(log_failure)?;

            let next = interval + 1;
            record(&mut incidence, next, &self.increment);
            record(&mut prevalence, next, &self.volumes);

            if let Some(schedule) = input.forcing.as_ref().filter(|s| s.is_scheduled(next)) {
                self.forcing
                    .apply(
                        &mut self.volumes,
                        schedule,
                        &input.trajectory,
                        next,
                        options.zero_forcing_policy,
                    )
                    .map_err(|failure| forcing_error(failure, interval))
                    .map_err(log_failure)?;
                self.check_finite_volumes(interval).map_err(log_failure)?;
            }

            if input.refresh_flags[next] {
                for col in input.time_varying_columns.clone() {
                    self.snapshot[col] = input.trajectory[(next, col)];
                }
            }
            self.snapshot[init.clone()].copy_from_slice(&self.volumes);
            solver.install_parameters(&self.snapshot);
        }

        Ok(LnaPath {
            draws: draws.clone(),
            incidence,
            prevalence,
        })
    }

    /// Integrate one interval and update `increment` and `volumes`.
    fn advance<S: LnaSolver + ?Sized>(
        &mut self,
        input: &LnaInput,
        draws: &Mat<f64>,
        options: LnaOptions,
        solver: &mut S,
        interval: usize,
    ) -> Result<(), LnaError> {
        let n_events = self.drift.len();
        let t_left = input.times[interval];
        let t_right = input.times[interval + 1];

        self.moments.fill(0.0);
        solver.integrate(&mut self.moments, t_left, t_right, options.step_size);
        log::trace!("integrated interval {interval} over [{t_left}, {t_right}]");

        self.drift.copy_from_slice(&self.moments[..n_events]);
        for row in 0..n_events {
            for col in 0..n_events {
                self.diffusion[(row, col)] = self.moments[n_events + row * n_events + col];
            }
        }
        if !slice_is_finite(&self.drift) || !matrix_is_finite(&self.diffusion) {
            return Err(LnaError::IntegrationFailure { interval });
        }

        diffusion_sqrt_into(&self.diffusion, &mut self.diffusion_sqrt)
            .map_err(|_| LnaError::DecompositionFailure { interval })?;

        for row in 0..n_events {
            let noise: f64 = (0..n_events)
                .map(|col| self.diffusion_sqrt[(row, col)] * draws[(col, interval)])
                .sum();
            self.log_increment[row] = self.drift[row] + noise;
            self.increment[row] = self.log_increment[row].exp_m1();
        }
        // Overflow in exp_m1 would poison every later volume.
        if !slice_is_finite(&self.increment) {
            return Err(LnaError::IntegrationFailure { interval });
        }
        if let Some(event) = first_negative(&self.increment) {
            return Err(LnaError::NegativeIncrement {
                interval,
                event,
                value: self.increment[event],
            });
        }

        for (compartment, volume) in self.volumes.iter_mut().enumerate() {
            *volume += (0..n_events)
                .map(|event| input.stoichiometry[(compartment, event)] * self.increment[event])
                .sum::<f64>();
        }
        self.check_finite_volumes(interval)?;
        if let Some(compartment) = first_negative(&self.volumes) {
            return Err(LnaError::NegativeVolume {
                interval,
                compartment,
                stage: VolumeStage::Increment,
                value: self.volumes[compartment],
            });
        }
        Ok(())
    }

    /// Overflowed volumes must not reach the path or the solver.
    fn check_finite_volumes(&self, interval: usize) -> Result<(), LnaError> {
        if slice_is_finite(&self.volumes) {
            Ok(())
        } else {
            Err(LnaError::IntegrationFailure { interval })
        }
    }
}

/// Simulate one LNA path with freshly allocated working storage.
///
/// # Errors
///
/// See [`LnaPathAssembler::simulate`].
pub fn simulate_lna_path<S: LnaSolver + ?Sized>(
    input: &LnaInput,
    draws: &Mat<f64>,
    options: LnaOptions,
    solver: &mut S,
) -> Result<LnaPath, LnaError> {
    LnaPathAssembler::for_input(input).simulate(input, draws, options, solver)
}

fn record(path: &mut Mat<f64>, row: usize, values: &[f64]) {
    for (col, value) in values.iter().enumerate() {
        path[(row, col + 1)] = *value;
    }
}

const fn forcing_error(failure: ForcingFailure, interval: usize) -> LnaError {
    match failure {
        ForcingFailure::Degenerate { forcing } => LnaError::DegenerateForcing { interval, forcing },
        ForcingFailure::NegativeVolume { compartment, value } => LnaError::NegativeVolume {
            interval,
            compartment,
            stage: VolumeStage::Forcing,
            value,
        },
    }
}

fn log_failure(err: LnaError) -> LnaError {
    log::debug!("LNA path rejected: {err}");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ForcingSchedule;
    use crate::lna::types::{FailureKind, ZeroForcingPolicy};
    use approx::assert_relative_eq;

    /// Returns the same drift and diffusion on every interval and records
    /// every installed snapshot.
    struct FixedSolver {
        drift: Vec<f64>,
        diffusion: Vec<f64>,
        installed: Vec<Vec<f64>>,
        calls: usize,
    }

    impl FixedSolver {
        fn new(drift: Vec<f64>, diffusion: Vec<f64>) -> Self {
            Self {
                drift,
                diffusion,
                installed: Vec::new(),
                calls: 0,
            }
        }
    }

    impl LnaSolver for FixedSolver {
        fn install_parameters(&mut self, snapshot: &[f64]) {
            self.installed.push(snapshot.to_vec());
        }

        fn integrate(&mut self, buffer: &mut [f64], _t_left: f64, _t_right: f64, _step: f64) {
            self.calls += 1;
            let n = self.drift.len();
            buffer[..n].copy_from_slice(&self.drift);
            buffer[n..].copy_from_slice(&self.diffusion);
        }
    }

    /// S -> I with volumes in trajectory columns 1..3 and a covariate in column 3.
    fn si_input(n_times: usize) -> LnaInput {
        let times = (0..n_times).map(crate::utils::usize_to_f64).collect();
        LnaInput::new(
            times,
            Mat::from_fn(n_times, 4, |i, j| match j {
                0 => 0.2,
                1 => 90.0,
                2 => 10.0,
                _ => 100.0 + crate::utils::usize_to_f64(i),
            }),
            Mat::from_fn(2, 1, |i, _| if i == 0 { -1.0 } else { 1.0 }),
            1,
        )
        .with_parameter_columns(0..1)
        .with_time_varying(3..4, vec![false; n_times])
    }

    #[test]
    fn zero_drift_and_draws_keep_volumes_constant() {
        let input = si_input(4);
        let mut solver = FixedSolver::new(vec![0.0], vec![0.5]);
        let path = simulate_lna_path(&input, &Mat::zeros(1, 3), LnaOptions::default(), &mut solver)
            .expect("path");
        for row in 0..4 {
            assert_eq!(path.increments_at(row), vec![0.0]);
            assert_eq!(path.volumes_at(row), vec![90.0, 10.0]);
        }
    }

    #[test]
    fn increments_follow_expm1_of_drift() {
        let input = si_input(3);
        let mut solver = FixedSolver::new(vec![0.1], vec![0.01]);
        let path = simulate_lna_path(&input, &Mat::zeros(1, 2), LnaOptions::default(), &mut solver)
            .expect("path");
        let expected = 0.1f64.exp_m1();
        assert_relative_eq!(path.incidence[(1, 1)], expected, epsilon = 1.0e-14);
        assert_relative_eq!(path.incidence[(2, 1)], expected, epsilon = 1.0e-14);
        assert_relative_eq!(
            path.prevalence[(2, 1)],
            2.0f64.mul_add(-expected, 90.0),
            epsilon = 1.0e-12
        );
        assert_relative_eq!(
            path.prevalence[(2, 2)],
            2.0f64.mul_add(expected, 10.0),
            epsilon = 1.0e-12
        );
        assert_eq!(path.incidence[(2, 0)], 2.0);
        assert_eq!(solver.calls, 2);
    }

    #[test]
    fn draws_are_scaled_by_diffusion_root() {
        let input = si_input(2);
        let mut solver = FixedSolver::new(vec![0.0], vec![0.04]);
        let draws = Mat::from_fn(1, 1, |_, _| 1.5);
        let path = simulate_lna_path(&input, &draws, LnaOptions::default(), &mut solver)
            .expect("path");
        assert_relative_eq!(path.incidence[(1, 1)], 0.3f64.exp_m1(), epsilon = 1.0e-12);
        assert_eq!(path.draws[(0, 0)], 1.5);
    }

    #[test]
    fn snapshot_carries_volumes_and_refreshed_covariates() {
        let input = si_input(3).with_time_varying(3..4, vec![false, false, true]);
        let mut solver = FixedSolver::new(vec![0.1], vec![0.0]);
        simulate_lna_path(&input, &Mat::zeros(1, 2), LnaOptions::default(), &mut solver)
            .expect("path");
        assert_eq!(solver.installed.len(), 3);
        assert_eq!(solver.installed[0], vec![0.2, 90.0, 10.0, 100.0]);
        let inc = 0.1f64.exp_m1();
        assert_relative_eq!(solver.installed[1][1], 90.0 - inc, epsilon = 1.0e-12);
        assert_eq!(solver.installed[1][3], 100.0);
        assert_eq!(solver.installed[2][3], 102.0);
    }

    #[test]
    fn negative_drift_is_a_negative_increment() {
        let input = si_input(3);
        let mut solver = FixedSolver::new(vec![-0.1], vec![0.0]);
        let err = simulate_lna_path(&input, &Mat::zeros(1, 2), LnaOptions::default(), &mut solver)
            .expect_err("negative increment");
        assert!(matches!(
            err,
            LnaError::NegativeIncrement { interval: 0, event: 0, .. }
        ));
    }

    #[test]
    fn large_draw_drives_negative_volume() {
        let input = si_input(3);
        let mut solver = FixedSolver::new(vec![0.0], vec![1.0]);
        let draws = Mat::from_fn(1, 2, |_, j| if j == 0 { 0.1 } else { 6.0 });
        let err = simulate_lna_path(&input, &draws, LnaOptions::default(), &mut solver)
            .expect_err("S exhausted");
        assert_eq!(err.kind(), FailureKind::NegativeVolume);
        assert!(matches!(
            err,
            LnaError::NegativeVolume {
                interval: 1,
                compartment: 0,
                stage: VolumeStage::Increment,
                ..
            }
        ));
    }

    #[test]
    fn volume_overflow_is_an_integration_failure() {
        // each increment is finite but the accumulated volume overflows on
        // the second interval
        let input = LnaInput::new(
            vec![0.0, 1.0, 2.0],
            Mat::from_fn(3, 2, |_, j| [0.1, 1.0][j]),
            Mat::from_fn(1, 2, |_, _| 1.0),
            1,
        )
        .with_parameter_columns(0..1);
        let mut solver = FixedSolver::new(vec![709.0, 709.0], vec![0.0; 4]);
        let err = simulate_lna_path(&input, &Mat::zeros(2, 2), LnaOptions::default(), &mut solver)
            .expect_err("overflow");
        assert_eq!(err, LnaError::IntegrationFailure { interval: 1 });
        assert_eq!(solver.calls, 2);
        assert_eq!(solver.installed.len(), 2);
        assert!(solver.installed.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn failed_square_root_is_a_decomposition_failure() {
        let input = si_input(3);
        let mut assembler = LnaPathAssembler::for_input(&input);
        // a root buffer of the wrong shape makes the decomposition step fail
        assembler.diffusion_sqrt = Mat::zeros(1, 2);
        let mut solver = FixedSolver::new(vec![0.1], vec![0.01]);
        let err = assembler
            .simulate(&input, &Mat::zeros(1, 2), LnaOptions::default(), &mut solver)
            .expect_err("decomposition");
        assert_eq!(err, LnaError::DecompositionFailure { interval: 0 });
        assert_eq!(err.kind(), FailureKind::DecompositionFailure);
        assert_eq!(solver.calls, 1);
    }

    #[test]
    fn nan_diffusion_is_an_integration_failure() {
        let input = si_input(3);
        let mut solver = FixedSolver::new(vec![0.1], vec![f64::NAN]);
        let err = simulate_lna_path(&input, &Mat::zeros(1, 2), LnaOptions::default(), &mut solver)
            .expect_err("nan");
        assert_eq!(err, LnaError::IntegrationFailure { interval: 0 });
    }

    #[test]
    fn invalid_draws_fail_before_integration() {
        let input = si_input(3);
        let mut solver = FixedSolver::new(vec![0.1], vec![0.0]);
        let err = simulate_lna_path(&input, &Mat::zeros(1, 5), LnaOptions::default(), &mut solver)
            .expect_err("shape");
        assert_eq!(err.kind(), FailureKind::InvalidInput);
        assert_eq!(solver.calls, 0);
        assert!(solver.installed.is_empty());
    }

    #[test]
    fn forcing_at_time_zero_is_recorded_in_first_row() {
        let n_times = 3;
        let mut trajectory = Mat::from_fn(n_times, 5, |_, j| [0.2, 90.0, 10.0, 100.0, 9.0][j]);
        trajectory[(1, 4)] = 4.0;
        let schedule = ForcingSchedule::new(
            vec![true, true, false],
            vec![4],
            Mat::from_fn(2, 1, |i, _| if i == 0 { 1.0 } else { 0.0 }),
            vec![Mat::from_fn(2, 2, |i, j| match (i, j) {
                (0, 0) => -1.0,
                (1, 0) => 1.0,
                _ => 0.0,
            })],
        );
        let input = LnaInput::new(
            vec![0.0, 1.0, 2.0],
            trajectory,
            Mat::from_fn(2, 1, |i, _| if i == 0 { -1.0 } else { 1.0 }),
            1,
        )
        .with_forcing(schedule);
        let mut solver = FixedSolver::new(vec![0.0], vec![0.0]);
        let path = simulate_lna_path(&input, &Mat::zeros(1, 2), LnaOptions::default(), &mut solver)
            .expect("path");
        assert_eq!(path.volumes_at(0), vec![81.0, 19.0]);
        // forcing at time 1 is applied after census and shows up at time 2
        assert_eq!(path.volumes_at(1), vec![81.0, 19.0]);
        assert_eq!(path.volumes_at(2), vec![77.0, 23.0]);
    }

    #[test]
    fn degenerate_forcing_can_be_rejected() {
        let schedule = ForcingSchedule::new(
            vec![false, true, false],
            vec![0],
            Mat::from_fn(2, 1, |_, _| 0.0),
            vec![Mat::<f64>::zeros(2, 2)],
        );
        let input = si_input(3).with_forcing(schedule);
        let options = LnaOptions {
            zero_forcing_policy: ZeroForcingPolicy::Reject,
            ..LnaOptions::default()
        };
        let mut solver = FixedSolver::new(vec![0.0], vec![0.0]);
        let err = simulate_lna_path(&input, &Mat::zeros(1, 2), options, &mut solver)
            .expect_err("degenerate");
        assert_eq!(err, LnaError::DegenerateForcing { interval: 0, forcing: 0 });
    }

    #[test]
    fn assembler_is_reusable_across_dimensions() {
        let mut assembler = LnaPathAssembler::new(3, 7);
        let input = si_input(3);
        let mut solver = FixedSolver::new(vec![0.1], vec![0.0]);
        let first = assembler
            .simulate(&input, &Mat::zeros(1, 2), LnaOptions::default(), &mut solver)
            .expect("first");
        let second = assembler
            .simulate(&input, &Mat::zeros(1, 2), LnaOptions::default(), &mut solver)
            .expect("second");
        for row in 0..3 {
            assert_eq!(first.volumes_at(row), second.volumes_at(row));
        }
    }
}
