//! Retry driver for proposing LNA paths.
//!
//! The assembler performs exactly one pass; this driver owns the retry
//! policy. Each attempt draws a fresh matrix of standard normals and the first
//! admissible path is returned.

use rand::rngs::StdRng;

use super::path::LnaPathAssembler;
use super::solver::LnaSolver;
use super::types::{LnaError, LnaOptions, LnaProposal};
use crate::input::LnaInput;
use crate::utils::standard_normal_matrix;

/// Propose a path, redrawing perturbations after recoverable failures up to
/// `options.max_attempts` attempts in total.
///
/// # Errors
///
/// Returns input and option errors immediately, and the last path failure if
/// every attempt was rejected.
pub fn propose_lna_path<S: LnaSolver + ?Sized>(
    input: &LnaInput,
    options: LnaOptions,
    solver: &mut S,
    rng: &mut StdRng,
) -> Result<LnaProposal, LnaError> {
    options.validate()?;
    input.validate()?;

    let mut assembler = LnaPathAssembler::for_input(input);
    let mut failures = Vec::new();
    for attempt in 1..=options.max_attempts {
        let draws = standard_normal_matrix(rng, input.n_events(), input.n_intervals());
        match assembler.simulate(input, &draws, options, solver) {
            Ok(path) => {
                return Ok(LnaProposal {
                    path,
                    attempts: attempt,
                    failures,
                });
            }
            Err(err) if err.is_recoverable() => {
                log::debug!("attempt {attempt}/{} failed: {err}", options.max_attempts);
                failures.push(err);
            }
            Err(err) => return Err(err),
        }
    }

    log::warn!(
        "no admissible LNA path after {} attempts",
        options.max_attempts
    );
    // `max_attempts >= 1` and every failed attempt pushed an error.
    Err(failures
        .pop()
        .unwrap_or(LnaError::InvalidOptions("max_attempts must be positive")))
}
