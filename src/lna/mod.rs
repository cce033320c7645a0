//! Linear noise approximation (LNA) path engine.
//!
//! Paths are built with a non-centered parameterization: for a fixed grid,
//! parameter trajectory, and matrix of standard-normal draws the incidence and
//! prevalence paths are a deterministic function of the draws. All randomness
//! enters through the draw matrix, so a sampler can hold the draws fixed while
//! updating parameters, or the reverse.

pub mod diffusion;
pub mod forcing;
pub mod matrix_ops;
pub mod path;
pub mod proposal;
pub mod solver;
pub mod types;

pub use diffusion::{DecompositionError, diffusion_sqrt, diffusion_sqrt_into};
pub use forcing::{ForcingApplicator, ForcingFailure};
pub use path::{LnaPathAssembler, simulate_lna_path};
pub use proposal::propose_lna_path;
pub use solver::{AdaptiveMomentSolver, LnaSolver, moment_len};
pub use types::{
    FailureKind, LnaError, LnaOptions, LnaPath, LnaProposal, VolumeStage, ZeroForcingPolicy,
};
