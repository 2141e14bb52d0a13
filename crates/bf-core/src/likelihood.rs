//! Likelihood interface consumed by the posterior.
//!
//! The engine only needs a scalar log-likelihood, an observation count,
//! per-constraint residual blocks, an observable snapshot, and a
//! bootstrap routine. `GaussianLikelihood` is a concrete implementation
//! with independent Gaussian observations of named parameters; anything
//! richer (correlated constraints, theory predictions) plugs in through
//! the same trait.

use crate::params::{Parameter, Parameters};
use bf_math::{std_normal_inv_cdf, LOG_SQRT_2PI};
use thiserror::Error;

/// One residual block of a constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualBlock {
    significance: f64,
}

impl ResidualBlock {
    pub fn new(significance: f64) -> Self {
        Self { significance }
    }

    /// Signed pull of the block at the current parameter values.
    pub fn significance(&self) -> f64 {
        self.significance
    }
}

/// A named constraint with its residual blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    name: String,
    blocks: Vec<ResidualBlock>,
}

impl Constraint {
    pub fn new(name: impl Into<String>, blocks: Vec<ResidualBlock>) -> Self {
        Self {
            name: name.into(),
            blocks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blocks(&self) -> &[ResidualBlock] {
        &self.blocks
    }
}

/// Snapshot of the cached observable predictions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservableCache {
    entries: Vec<(String, f64)>,
}

impl ObservableCache {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name(&self, i: usize) -> &str {
        &self.entries[i].0
    }

    pub fn value(&self, i: usize) -> f64 {
        self.entries[i].1
    }
}

/// Scalar log-likelihood over ambient parameter state.
///
/// `clone_box` must produce a deep copy bound to a *fresh* parameter
/// registry; the posterior relies on that for independent clones.
pub trait LogLikelihood {
    /// Parameter registry this likelihood reads from.
    fn parameters(&self) -> Parameters;

    /// Log-likelihood at the current parameter values. Also refreshes
    /// any cached observable predictions.
    fn evaluate(&self) -> f64;

    fn number_of_observations(&self) -> u32;

    /// Simulate `datasets` pseudo experiments; returns the p-value-like
    /// statistic and the observed chi-square it was derived from.
    fn bootstrap_p_value(&self, datasets: u32) -> (f64, f64);

    /// Constraints with residual blocks at the current parameter values.
    fn constraints(&self) -> Vec<Constraint>;

    /// Observable predictions at the last evaluation.
    fn observable_cache(&self) -> ObservableCache;

    fn clone_box(&self) -> Box<dyn LogLikelihood>;
}

impl Clone for Box<dyn LogLikelihood> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Errors from building a [`GaussianLikelihood`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LikelihoodError {
    #[error("observation of '{name}': standard deviation must be > 0, got {sigma}")]
    InvalidSigma { name: String, sigma: f64 },
}

#[derive(Debug, Clone)]
struct GaussObservation {
    constraint: String,
    parameter: Parameter,
    measured: f64,
    sigma: f64,
}

impl GaussObservation {
    fn pull(&self) -> f64 {
        (self.parameter.evaluate() - self.measured) / self.sigma
    }
}

/// Independent Gaussian observations of named parameters.
#[derive(Clone, Default)]
pub struct GaussianLikelihood {
    parameters: Parameters,
    observations: Vec<GaussObservation>,
}

impl GaussianLikelihood {
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            observations: Vec::new(),
        }
    }

    /// Add an observation `parameter ~ N(measured, sigma^2)` under the
    /// given constraint name. Declares the parameter when missing.
    pub fn add_observation(
        &mut self,
        constraint: &str,
        parameter: &str,
        measured: f64,
        sigma: f64,
    ) -> Result<(), LikelihoodError> {
        if !(sigma > 0.0) {
            return Err(LikelihoodError::InvalidSigma {
                name: parameter.to_string(),
                sigma,
            });
        }
        let handle = self.parameters.declare(parameter, measured);
        self.observations.push(GaussObservation {
            constraint: constraint.to_string(),
            parameter: handle,
            measured,
            sigma,
        });
        Ok(())
    }

    fn observed_chi_square(&self) -> f64 {
        self.observations.iter().map(|o| o.pull() * o.pull()).sum()
    }
}

impl LogLikelihood for GaussianLikelihood {
    fn parameters(&self) -> Parameters {
        self.parameters.clone()
    }

    fn evaluate(&self) -> f64 {
        self.observations
            .iter()
            .map(|o| {
                let pull = o.pull();
                -LOG_SQRT_2PI - o.sigma.ln() - 0.5 * pull * pull
            })
            .sum()
    }

    fn number_of_observations(&self) -> u32 {
        self.observations.len() as u32
    }

    fn bootstrap_p_value(&self, datasets: u32) -> (f64, f64) {
        let observed = self.observed_chi_square();
        if datasets == 0 {
            return (1.0, observed);
        }

        // Parametric bootstrap: pseudo measurements drawn around the
        // current predictions with the observation widths, so each
        // simulated pull is standard normal.
        let mut at_least_as_extreme = 0u32;
        for _ in 0..datasets {
            let mut chi_square = 0.0;
            for _ in &self.observations {
                let z = std_normal_inv_cdf(self.parameters.random_unit());
                chi_square += z * z;
            }
            if chi_square >= observed {
                at_least_as_extreme += 1;
            }
        }
        (
            f64::from(at_least_as_extreme) / f64::from(datasets),
            observed,
        )
    }

    fn constraints(&self) -> Vec<Constraint> {
        self.observations
            .iter()
            .map(|o| Constraint::new(o.constraint.clone(), vec![ResidualBlock::new(o.pull())]))
            .collect()
    }

    fn observable_cache(&self) -> ObservableCache {
        ObservableCache::new(
            self.observations
                .iter()
                .map(|o| (o.constraint.clone(), o.parameter.evaluate()))
                .collect(),
        )
    }

    fn clone_box(&self) -> Box<dyn LogLikelihood> {
        // Deep copy with an independent registry; parameters keep their
        // current values.
        let parameters = Parameters::new();
        let observations = self
            .observations
            .iter()
            .map(|o| GaussObservation {
                constraint: o.constraint.clone(),
                parameter: parameters.declare(&o.parameter.name(), o.parameter.evaluate()),
                measured: o.measured,
                sigma: o.sigma,
            })
            .collect();
        Box::new(GaussianLikelihood {
            parameters,
            observations,
        })
    }
}

/// A likelihood that is constant in the parameters. Useful when the
/// posterior should reduce to the prior alone.
#[derive(Clone)]
pub struct ConstantLikelihood {
    parameters: Parameters,
    value: f64,
}

impl ConstantLikelihood {
    pub fn new(parameters: Parameters, value: f64) -> Self {
        Self { parameters, value }
    }
}

impl LogLikelihood for ConstantLikelihood {
    fn parameters(&self) -> Parameters {
        self.parameters.clone()
    }

    fn evaluate(&self) -> f64 {
        self.value
    }

    fn number_of_observations(&self) -> u32 {
        0
    }

    fn bootstrap_p_value(&self, _datasets: u32) -> (f64, f64) {
        (1.0, 0.0)
    }

    fn constraints(&self) -> Vec<Constraint> {
        Vec::new()
    }

    fn observable_cache(&self) -> ObservableCache {
        ObservableCache::default()
    }

    fn clone_box(&self) -> Box<dyn LogLikelihood> {
        Box::new(ConstantLikelihood {
            parameters: Parameters::new(),
            value: self.value,
        })
    }
}
