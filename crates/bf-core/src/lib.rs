//! bayesfit core library.
//!
//! Bayesian inference over physical-model parameters:
//! - Parameter registry with attached uniform generators
//! - Prior distribution library (flat, curtailed Gaussian, scale,
//!   multivariate Gaussian) and the one-line prior grammar
//! - Posterior density composition and parameter bookkeeping
//! - Simplex mode finding, goodness-of-fit simulation
//! - Typed table store for persisted analysis state
//! - Proposal covariance seeding for external samplers

pub mod gof;
pub mod likelihood;
pub mod optimize;
pub mod params;
pub mod persist;
pub mod posterior;
pub mod prior;
pub mod proposal;
pub mod store;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_log;

pub use likelihood::{Constraint, GaussianLikelihood, LogLikelihood, ObservableCache, ResidualBlock};
pub use optimize::OptimizationOptions;
pub use params::{Parameter, Parameters};
pub use posterior::{LogPosterior, PosteriorError};
pub use prior::{ParameterDescription, ParameterRange, Prior, PriorError};
pub use proposal::proposal_covariance;
