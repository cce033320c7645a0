//! Solver interface for the LNA moment equations.
//!
//! The path engine treats the ODE integrator as a black box: it installs a
//! parameter snapshot, then asks for the drift and diffusion accumulated over
//! one interval. [`AdaptiveMomentSolver`] is a self-contained implementation for
//! a user-supplied right-hand side.

use super::types::LnaError;

/// Number of solver outputs for `n_events` event types: drift followed by the
/// row-major diffusion matrix.
#[must_use]
pub const fn moment_len(n_events: usize) -> usize {
    n_events + n_events * n_events
}

/// Integrator for the drift and diffusion of the log-scale LNA.
pub trait LnaSolver {
    /// Copy a parameter snapshot into the solver state.
    fn install_parameters(&mut self, snapshot: &[f64]);

    /// Integrate over `[t_left, t_right]` starting from the contents of
    /// `buffer` (zeroed by the caller) and write the drift into the first
    /// `n_events` slots and the row-major diffusion into the rest.
    fn integrate(&mut self, buffer: &mut [f64], t_left: f64, t_right: f64, step_size: f64);
}

impl<S: LnaSolver + ?Sized> LnaSolver for &mut S {
    fn install_parameters(&mut self, snapshot: &[f64]) {
        (**self).install_parameters(snapshot);
    }

    fn integrate(&mut self, buffer: &mut [f64], t_left: f64, t_right: f64, step_size: f64) {
        (**self).integrate(buffer, t_left, t_right, step_size);
    }
}

const RELATIVE_TOLERANCE: f64 = 1.0e-6;
const ABSOLUTE_TOLERANCE: f64 = 1.0e-9;
const MAX_STEPS: usize = 100_000;
const MIN_STEP: f64 = 1.0e-14;

// Dormand-Prince 5(4) tableau.
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Fifth-order minus embedded fourth-order weights.
const E1: f64 = B1 - 5179.0 / 57600.0;
const E3: f64 = B3 - 7571.0 / 16695.0;
const E4: f64 = B4 - 393.0 / 640.0;
const E5: f64 = B5 - -92097.0 / 339200.0;
const E6: f64 = B6 - 187.0 / 2100.0;
const E7: f64 = -1.0 / 40.0;

/// Adaptive Dormand-Prince integration of a moment system.
///
/// The right-hand side is called as `rhs(t, state, params, derivative)` where
/// `state` and `derivative` have the solver buffer's length and `params` is the
/// installed snapshot. The `step_size` passed to [`LnaSolver::integrate`] seeds
/// the step controller, which then grows or shrinks the step to keep the local
/// error within the configured tolerances.
///
/// If the controller cannot reach the end of the interval, or the right-hand
/// side produces non-finite values, the buffer is filled with NaN so that the
/// path engine reports an integration failure.
pub struct AdaptiveMomentSolver<F> {
    rhs: F,
    params: Vec<f64>,
    rtol: f64,
    atol: f64,
    max_steps: usize,
    stages: [Vec<f64>; 7],
    scratch: Vec<f64>,
    candidate: Vec<f64>,
}

impl<F> AdaptiveMomentSolver<F>
where
    F: FnMut(f64, &[f64], &[f64], &mut [f64]),
{
    #[must_use]
    pub const fn new(rhs: F) -> Self {
        Self {
            rhs,
            params: Vec::new(),
            rtol: RELATIVE_TOLERANCE,
            atol: ABSOLUTE_TOLERANCE,
            max_steps: MAX_STEPS,
            stages: [
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
            ],
            scratch: Vec::new(),
            candidate: Vec::new(),
        }
    }

    /// Replace the default tolerances (`rtol = 1e-6`, `atol = 1e-9`).
    ///
    /// # Errors
    ///
    /// Returns `LnaError::InvalidOptions` unless both tolerances are positive
    /// and finite.
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Result<Self, LnaError> {
        if !(rtol.is_finite() && rtol > 0.0 && atol.is_finite() && atol > 0.0) {
            return Err(LnaError::InvalidOptions(
                "solver tolerances must be positive and finite",
            ));
        }
        self.rtol = rtol;
        self.atol = atol;
        Ok(self)
    }

    /// Cap on attempted steps per interval (default 100 000).
    ///
    /// # Errors
    ///
    /// Returns `LnaError::InvalidOptions` if `max_steps` is zero.
    pub fn with_max_steps(mut self, max_steps: usize) -> Result<Self, LnaError> {
        if max_steps == 0 {
            return Err(LnaError::InvalidOptions("max_steps must be positive"));
        }
        self.max_steps = max_steps;
        Ok(self)
    }

    /// Installed parameter snapshot.
    #[must_use]
    pub fn parameters(&self) -> &[f64] {
        &self.params
    }

    fn resize(&mut self, len: usize) {
        for stage in &mut self.stages {
            stage.resize(len, 0.0);
        }
        self.scratch.resize(len, 0.0);
        self.candidate.resize(len, 0.0);
    }

    /// Take one trial step of size `h` from `state`, leaving the fifth-order
    /// solution in `candidate` and its derivative in the last stage. Returns
    /// the RMS of the scaled local error.
    fn trial_step(&mut self, t: f64, h: f64, state: &[f64]) -> f64 {
        let [k1, k2, k3, k4, k5, k6, k7] = &mut self.stages;
        let scratch = &mut self.scratch;
        let params = &self.params;

        for (i, value) in scratch.iter_mut().enumerate() {
            *value = state[i] + h * A21 * k1[i];
        }
        (self.rhs)(t + h / 5.0, scratch, params, k2);
        for (i, value) in scratch.iter_mut().enumerate() {
            *value = state[i] + h * (A31 * k1[i] + A32 * k2[i]);
        }
        (self.rhs)(t + 3.0 * h / 10.0, scratch, params, k3);
        for (i, value) in scratch.iter_mut().enumerate() {
            *value = state[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
        }
        (self.rhs)(t + 4.0 * h / 5.0, scratch, params, k4);
        for (i, value) in scratch.iter_mut().enumerate() {
            *value = state[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
        }
        (self.rhs)(t + 8.0 * h / 9.0, scratch, params, k5);
        for (i, value) in scratch.iter_mut().enumerate() {
            *value = state[i]
                + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
        }
        (self.rhs)(t + h, scratch, params, k6);
        for (i, value) in self.candidate.iter_mut().enumerate() {
            *value = state[i]
                + h * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
        }
        (self.rhs)(t + h, &self.candidate, params, k7);

        let mut sum = 0.0;
        for i in 0..state.len() {
            let error =
                h * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            let scale = self.rtol.mul_add(state[i].abs().max(self.candidate[i].abs()), self.atol);
            sum += (error / scale) * (error / scale);
        }
        (sum / crate::utils::usize_to_f64(state.len())).sqrt()
    }
}

impl<F> LnaSolver for AdaptiveMomentSolver<F>
where
    F: FnMut(f64, &[f64], &[f64], &mut [f64]),
{
    fn install_parameters(&mut self, snapshot: &[f64]) {
        self.params.clear();
        self.params.extend_from_slice(snapshot);
    }

    fn integrate(&mut self, buffer: &mut [f64], t_left: f64, t_right: f64, step_size: f64) {
        let width = t_right - t_left;
        if buffer.is_empty() || !(width > 0.0 && step_size > 0.0) {
            return;
        }
        self.resize(buffer.len());

        let mut t = t_left;
        let mut h = step_size.min(width);
        (self.rhs)(t, buffer, &self.params, &mut self.stages[0]);

        for _ in 0..self.max_steps {
            let remaining = t_right - t;
            let last = h >= remaining;
            if last {
                h = remaining;
            }
            let error = self.trial_step(t, h, buffer);
            if !error.is_finite() {
                log::debug!("non-finite local error at t = {t}");
                buffer.fill(f64::NAN);
                return;
            }
            if error <= 1.0 {
                buffer.copy_from_slice(&self.candidate);
                let [k1, .., k7] = &mut self.stages;
                k1.copy_from_slice(&k7[..]);
                if last {
                    return;
                }
                t += h;
            }
            let factor = if error == 0.0 {
                5.0
            } else {
                (0.9 * error.powf(-0.2)).clamp(0.2, 5.0)
            };
            h = (h * factor).max(MIN_STEP);
        }

        log::debug!(
            "step controller exhausted {} steps at t = {t} before reaching {t_right}",
            self.max_steps
        );
        buffer.fill(f64::NAN);
    }
}
