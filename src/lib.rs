#![forbid(unsafe_code)]

//! # `lna_paths`
//!
//! Simulation of linear noise approximation (LNA) sample paths for
//! continuous-time compartmental models, using a non-centered
//! parameterization driven by standard-normal draws.
//!
//! The crate was written as the path-proposal core of particle and MCMC
//! samplers for epidemic models: given a time grid, a parameter trajectory,
//! and a draw matrix, it deterministically produces an incidence path and a
//! prevalence path, or a typed failure naming the interval that went wrong.
//! The moment-equation integrator is supplied by the caller through
//! [`LnaSolver`].

pub mod inference;
pub mod input;
pub mod lna;
pub mod utils;

pub use inference::{
    ComponentwiseRandomWalk, InferenceError, IntervalWidthAdapter, ProposalStats,
};
pub use input::{ForcingSchedule, InputError, LnaInput};
pub mod matrix_ops {
    pub use crate::lna::matrix_ops::*;
}

pub use lna::{
    AdaptiveMomentSolver, DecompositionError, FailureKind, ForcingApplicator, ForcingFailure,
    LnaError, LnaOptions, LnaPath, LnaPathAssembler, LnaProposal, LnaSolver, VolumeStage,
    ZeroForcingPolicy, diffusion_sqrt, diffusion_sqrt_into, moment_len, propose_lna_path,
    simulate_lna_path,
};
