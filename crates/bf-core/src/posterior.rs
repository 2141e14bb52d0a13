//! Posterior density: likelihood times priors over a shared registry.
//!
//! The posterior owns the ordered list of priors and the bookkeeping
//! that maps scan/nuisance parameters to registry handles. Every
//! parameter entering the posterior must be covered by exactly one
//! prior; [`LogPosterior::add`] enforces this at assembly time.

use crate::likelihood::LogLikelihood;
use crate::params::{Parameter, Parameters};
use crate::prior::{ParameterDescription, Prior, PriorError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PosteriorError {
    #[error("parameter '{name}' is not part of the posterior")]
    UnknownParameter { name: String },
    #[error("no priors have been added to the posterior")]
    NoPriors,
    #[error("got {got} values for {expected} parameters")]
    Dimension { expected: usize, got: usize },
    #[error("prior evaluation failed: {0}")]
    Prior(#[from] PriorError),
}

/// Log of the unnormalized posterior density.
pub struct LogPosterior {
    log_likelihood: Box<dyn LogLikelihood>,
    parameters: Parameters,
    priors: Vec<Prior>,
    parameter_descriptions: Vec<ParameterDescription>,
    // parallel to parameter_descriptions
    parameter_names: Vec<String>,
    informative_priors: usize,
}

impl LogPosterior {
    /// Wrap a likelihood; priors are attached with [`LogPosterior::add`].
    pub fn new(log_likelihood: Box<dyn LogLikelihood>) -> Self {
        let parameters = log_likelihood.parameters();
        Self {
            log_likelihood,
            parameters,
            priors: Vec::new(),
            parameter_descriptions: Vec::new(),
            parameter_names: Vec::new(),
            informative_priors: 0,
        }
    }

    /// Attach a prior. Returns false (and leaves the posterior
    /// untouched) when any parameter of the prior is already covered
    /// by an earlier prior.
    pub fn add(&mut self, prior: &Prior, nuisance: bool) -> bool {
        for description in prior.descriptions() {
            let name = description.parameter.name();
            if self.parameter_names.iter().any(|n| *n == name) {
                debug!(parameter = %name, "rejecting duplicate prior");
                return false;
            }
        }

        let prior = prior.clone_to(&self.parameters);
        if prior.informative() {
            self.informative_priors += 1;
        }
        for description in prior.descriptions() {
            self.parameter_names.push(description.parameter.name());
            self.parameter_descriptions.push(ParameterDescription {
                nuisance,
                ..description.clone()
            });
        }
        self.priors.push(prior);
        true
    }

    /// Sum of all prior log-densities at the current parameter values.
    ///
    /// A posterior without priors is not a density; evaluation refuses
    /// rather than degenerating to the bare likelihood.
    pub fn log_prior(&self) -> Result<f64, PosteriorError> {
        if self.priors.is_empty() {
            return Err(PosteriorError::NoPriors);
        }
        Ok(self.priors.iter().map(Prior::evaluate).sum())
    }

    /// The prior covering the named parameter, if any.
    pub fn prior_of(&self, name: &str) -> Option<&Prior> {
        self.priors.iter().find(|prior| {
            prior
                .descriptions()
                .iter()
                .any(|d| d.parameter.name() == name)
        })
    }

    /// Log-likelihood at the current parameter values.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood.evaluate()
    }

    /// log(prior * likelihood); NEG_INFINITY short-circuits the
    /// likelihood evaluation.
    pub fn log_posterior(&self) -> Result<f64, PosteriorError> {
        let log_prior = self.log_prior()?;
        if log_prior == f64::NEG_INFINITY {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(log_prior + self.log_likelihood.evaluate())
    }

    /// Set the scan/nuisance parameters to `values` (in declaration
    /// order) and return the log-posterior there. The dimension is
    /// checked before any parameter is touched.
    pub fn evaluate(&self, values: &[f64]) -> Result<f64, PosteriorError> {
        if values.len() != self.parameter_descriptions.len() {
            return Err(PosteriorError::Dimension {
                expected: self.parameter_descriptions.len(),
                got: values.len(),
            });
        }
        for (description, &value) in self.parameter_descriptions.iter().zip(values) {
            description.parameter.set(value);
        }
        self.log_posterior()
    }

    /// Index of the named parameter in declaration order.
    pub fn index(&self, name: &str) -> Result<usize, PosteriorError> {
        self.parameter_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PosteriorError::UnknownParameter {
                name: name.to_string(),
            })
    }

    /// Nuisance flag of the named parameter.
    pub fn nuisance(&self, name: &str) -> Result<bool, PosteriorError> {
        let idx = self.index(name)?;
        Ok(self.parameter_descriptions[idx].nuisance)
    }

    /// Number of priors that carry information (everything but flat).
    pub fn informative_priors(&self) -> usize {
        self.informative_priors
    }

    pub fn parameter_descriptions(&self) -> &[ParameterDescription] {
        &self.parameter_descriptions
    }

    /// Registry shared by the likelihood and all priors.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Handle to the i-th posterior parameter.
    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.parameter_descriptions
            .get(index)
            .map(|d| &d.parameter)
    }

    pub fn priors(&self) -> &[Prior] {
        &self.priors
    }

    /// Number of observations entering the likelihood.
    pub fn number_of_observations(&self) -> u32 {
        self.log_likelihood.number_of_observations()
    }

    pub fn likelihood(&self) -> &dyn LogLikelihood {
        self.log_likelihood.as_ref()
    }
}

impl Clone for LogPosterior {
    /// Deep copy: a fresh registry, the likelihood cloned onto it, and
    /// every prior re-bound. Parameter values, ranges and nuisance
    /// flags carry over by name.
    fn clone(&self) -> Self {
        let log_likelihood = self.log_likelihood.clone_box();
        let parameters = log_likelihood.parameters();

        let priors: Vec<Prior> = self
            .priors
            .iter()
            .map(|prior| prior.clone_to(&parameters))
            .collect();

        let mut parameter_descriptions = Vec::with_capacity(self.parameter_descriptions.len());
        for description in &self.parameter_descriptions {
            let name = description.parameter.name();
            let parameter = parameters.declare(&name, description.parameter.evaluate());
            parameter.set(description.parameter.evaluate());
            parameter_descriptions.push(ParameterDescription {
                parameter,
                min: description.min,
                max: description.max,
                nuisance: description.nuisance,
            });
        }

        Self {
            log_likelihood,
            parameters,
            priors,
            parameter_descriptions,
            parameter_names: self.parameter_names.clone(),
            informative_priors: self.informative_priors,
        }
    }
}

impl std::fmt::Debug for LogPosterior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogPosterior")
            .field("parameters", &self.parameter_names)
            .field("priors", &self.priors.len())
            .field("informative_priors", &self.informative_priors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::likelihood::GaussianLikelihood;
    use crate::prior::ParameterRange;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn simple_posterior() -> LogPosterior {
        let parameters = Parameters::with_seed(11);
        let mut llh = GaussianLikelihood::new(parameters.clone());
        llh.add_observation("test::obs", "x", 0.5, 0.1).unwrap();

        let mut posterior = LogPosterior::new(Box::new(llh));
        let prior = Prior::flat(&parameters, "x", ParameterRange::new(-1.0, 1.0)).unwrap();
        assert!(posterior.add(&prior, false));
        posterior
    }

    #[test]
    fn add_rejects_duplicate_parameter() {
        let mut posterior = simple_posterior();
        let other = Parameters::with_seed(1);
        let duplicate = Prior::flat(&other, "x", ParameterRange::new(0.0, 2.0)).unwrap();
        assert!(!posterior.add(&duplicate, true));
        // state untouched by the rejected add
        assert_eq!(posterior.priors().len(), 1);
        assert_eq!(posterior.parameter_descriptions().len(), 1);
    }

    #[test]
    fn add_multivariate_rejects_partial_overlap() {
        let mut posterior = simple_posterior();
        let other = Parameters::with_seed(1);
        let cov = bf_math::SquareMatrix::from_vec(2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let mvg =
            Prior::multivariate_gauss(&other, &["y", "x"], vec![0.0, 0.0], cov).unwrap();
        assert!(!posterior.add(&mvg, false));
        // "y" must not have leaked into the bookkeeping
        assert!(posterior.index("y").is_err());
    }

    #[test]
    fn log_posterior_is_prior_plus_likelihood() {
        let posterior = simple_posterior();
        posterior.parameters().get("x").unwrap().set(0.3);
        let expected = posterior.log_prior().unwrap() + posterior.log_likelihood();
        assert!(approx_eq(posterior.log_posterior().unwrap(), expected, 1e-14));
    }

    #[test]
    fn neg_infinity_prior_short_circuits() {
        let parameters = Parameters::with_seed(5);
        let mut llh = GaussianLikelihood::new(parameters.clone());
        llh.add_observation("test::obs", "mu", 4.0, 0.5).unwrap();

        let mut posterior = LogPosterior::new(Box::new(llh));
        let prior = Prior::scale(&parameters, "mu", 4.0, 2.0).unwrap();
        assert!(posterior.add(&prior, false));

        posterior.parameters().get("mu").unwrap().set(100.0);
        assert_eq!(posterior.log_posterior().unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn evaluate_sets_values_in_declaration_order() {
        let posterior = simple_posterior();
        let value = posterior.evaluate(&[0.25]).unwrap();
        assert_eq!(posterior.parameters().get("x").unwrap().evaluate(), 0.25);
        assert!(value.is_finite());
    }

    #[test]
    fn evaluate_rejects_wrong_dimension_before_mutation() {
        let posterior = simple_posterior();
        posterior.parameters().get("x").unwrap().set(0.3);

        assert!(matches!(
            posterior.evaluate(&[0.1, 0.2]),
            Err(PosteriorError::Dimension { expected: 1, got: 2 })
        ));
        assert!(matches!(
            posterior.evaluate(&[]),
            Err(PosteriorError::Dimension { expected: 1, got: 0 })
        ));
        // the rejected calls must not have written a prefix
        assert_eq!(posterior.parameters().get("x").unwrap().evaluate(), 0.3);
    }

    #[test]
    fn prior_less_posterior_refuses_to_evaluate() {
        let parameters = Parameters::with_seed(3);
        let llh = crate::likelihood::ConstantLikelihood::new(parameters, -1.25);
        let posterior = LogPosterior::new(Box::new(llh));

        assert!(matches!(posterior.log_prior(), Err(PosteriorError::NoPriors)));
        assert!(matches!(
            posterior.log_posterior(),
            Err(PosteriorError::NoPriors)
        ));
        assert!(matches!(posterior.evaluate(&[]), Err(PosteriorError::NoPriors)));
    }

    #[test]
    fn index_and_nuisance_lookups() {
        let mut posterior = simple_posterior();
        let other = Parameters::with_seed(1);
        let nuisance_prior = Prior::curtailed_gauss(
            &other,
            "sigma_th",
            ParameterRange::new(0.0, 2.0),
            0.8,
            1.0,
            1.2,
        )
        .unwrap();
        assert!(posterior.add(&nuisance_prior, true));

        assert_eq!(posterior.index("x").unwrap(), 0);
        assert_eq!(posterior.index("sigma_th").unwrap(), 1);
        assert!(!posterior.nuisance("x").unwrap());
        assert!(posterior.nuisance("sigma_th").unwrap());
        assert!(matches!(
            posterior.index("missing"),
            Err(PosteriorError::UnknownParameter { .. })
        ));
        assert!(posterior.nuisance("missing").is_err());
    }

    #[test]
    fn informative_prior_count() {
        let mut posterior = simple_posterior();
        assert_eq!(posterior.informative_priors(), 0);
        let other = Parameters::with_seed(1);
        let gauss = Prior::curtailed_gauss(
            &other,
            "y",
            ParameterRange::new(-1.0, 1.0),
            -0.1,
            0.0,
            0.1,
        )
        .unwrap();
        assert!(posterior.add(&gauss, false));
        assert_eq!(posterior.informative_priors(), 1);
    }

    #[test]
    fn clone_is_deep_and_value_preserving() {
        let posterior = simple_posterior();
        posterior.parameters().get("x").unwrap().set(0.4);

        let clone = posterior.clone();
        assert!(!posterior.parameters().same_registry(clone.parameters()));
        assert!(approx_eq(
            clone.parameters().get("x").unwrap().evaluate(),
            0.4,
            1e-15
        ));
        assert!(approx_eq(
            posterior.log_posterior().unwrap(),
            clone.log_posterior().unwrap(),
            1e-12
        ));

        // independent registries
        clone.parameters().get("x").unwrap().set(-0.9);
        assert_eq!(posterior.parameters().get("x").unwrap().evaluate(), 0.4);
    }

    #[test]
    fn prior_of_finds_owning_prior() {
        let posterior = simple_posterior();
        assert!(posterior.prior_of("x").is_some());
        assert!(posterior.prior_of("z").is_none());
    }
}
