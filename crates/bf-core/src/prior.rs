//! Prior densities over named parameters.
//!
//! A closed set of prior kinds: flat, curtailed (possibly asymmetric)
//! Gaussian on finite support, log-uniform scale, and multivariate
//! Gaussian. Evaluation reads the *current* parameter values through
//! shared handles; sampling writes back through the same handles using
//! each distribution's analytic inverse CDF.

use crate::params::{Parameter, Parameters};
use bf_math::{gaussian_cdf, gaussian_inv_cdf, std_normal_inv_cdf, LinalgError, SquareMatrix, LOG_SQRT_2PI};
use thiserror::Error;

/// Errors from prior construction and the prior grammar.
#[derive(Debug, Error)]
pub enum PriorError {
    #[error("range error: {0}")]
    Range(String),
    #[error("unknown prior error: cannot construct prior from '{0}'")]
    UnknownPrior(String),
    #[error("prior grammar error in {field}: {message}")]
    Parse {
        field: &'static str,
        message: String,
    },
    #[error("multivariate Gaussian: {0}")]
    Dimension(String),
    #[error(transparent)]
    Linalg(#[from] LinalgError),
    #[error("multivariate Gaussian priors have no single-line text form")]
    NoTextForm,
}

/// Allowed interval of a scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// A scalar parameter controlled by a prior, with its allowed range
/// and nuisance tag.
#[derive(Debug, Clone)]
pub struct ParameterDescription {
    pub parameter: Parameter,
    pub min: f64,
    pub max: f64,
    pub nuisance: bool,
}

/// Flat (uniform, improper in information content) prior on [min, max].
#[derive(Debug, Clone)]
pub struct Flat {
    parameter: Parameter,
    name: String,
    range: ParameterRange,
    // evaluate() always returns this constant
    value: f64,
    descriptions: Vec<ParameterDescription>,
}

/// Asymmetric Gaussian truncated to [min, max].
///
/// The density is piecewise Gaussian with widths `sigma_lower` below
/// and `sigma_upper` above the central value; the two branch constants
/// `c_a`, `c_b` make it continuous at the center and normalized over
/// the range.
#[derive(Debug, Clone)]
pub struct CurtailedGauss {
    parameter: Parameter,
    name: String,
    range: ParameterRange,
    central: f64,
    sigma_lower: f64,
    sigma_upper: f64,
    c_a: f64,
    c_b: f64,
    // probability mass of the branch below the central value,
    // precomputed for sampling
    prob_lower: f64,
    norm_lower: f64,
    norm_upper: f64,
    descriptions: Vec<ParameterDescription>,
}

/// Log-uniform prior on [mu_0/lambda, mu_0*lambda] for a
/// multiplicative scale uncertainty.
#[derive(Debug, Clone)]
pub struct Scale {
    parameter: Parameter,
    name: String,
    mu_0: f64,
    lambda: f64,
    min: f64,
    max: f64,
    ln_lambda: f64,
    descriptions: Vec<ParameterDescription>,
}

/// Joint Gaussian over several named parameters.
#[derive(Debug, Clone)]
pub struct MultivariateGaussian {
    parameters: Vec<Parameter>,
    names: Vec<String>,
    mean: Vec<f64>,
    covariance: SquareMatrix,
    // log normalization constant
    norm: f64,
    // lower Cholesky factor (sampling) and covariance inverse (evaluation)
    chol: SquareMatrix,
    covariance_inv: SquareMatrix,
    descriptions: Vec<ParameterDescription>,
}

/// Prior density over a fixed, ordered set of parameters.
#[derive(Debug, Clone)]
pub enum Prior {
    Flat(Flat),
    CurtailedGauss(CurtailedGauss),
    Scale(Scale),
    MultivariateGaussian(MultivariateGaussian),
}

impl Prior {
    /// Uniform prior on [min, max].
    pub fn flat(
        parameters: &Parameters,
        name: &str,
        range: ParameterRange,
    ) -> Result<Prior, PriorError> {
        if range.min >= range.max {
            return Err(PriorError::Range(format!(
                "Flat({name}): minimum ({}) must be smaller than maximum ({})",
                range.min, range.max
            )));
        }
        let parameter = parameters.declare(name, 0.5 * (range.min + range.max));
        let descriptions = vec![ParameterDescription {
            parameter: parameter.clone(),
            min: range.min,
            max: range.max,
            nuisance: false,
        }];
        Ok(Prior::Flat(Flat {
            parameter,
            name: name.to_string(),
            range,
            value: (1.0 / (range.max - range.min)).ln(),
            descriptions,
        }))
    }

    /// Asymmetric Gaussian prior with support [min, max], parameterized
    /// by the (lower, central, upper) interval edges.
    pub fn curtailed_gauss(
        parameters: &Parameters,
        name: &str,
        range: ParameterRange,
        lower: f64,
        central: f64,
        upper: f64,
    ) -> Result<Prior, PriorError> {
        if lower >= central {
            return Err(PriorError::Range(format!(
                "Gauss({name}): lower value ({lower}) must be smaller than central value ({central})"
            )));
        }
        if upper <= central {
            return Err(PriorError::Range(format!(
                "Gauss({name}): upper value ({upper}) must be larger than central value ({central})"
            )));
        }
        if range.min >= range.max {
            return Err(PriorError::Range(format!(
                "Gauss({name}): minimum ({}) must be smaller than maximum ({})",
                range.min, range.max
            )));
        }

        let sigma_lower = central - lower;
        let sigma_upper = upper - central;

        // Fix c_a, c_b so the density is continuous at the central value
        // and integrates to one over [min, max].
        let mass_lower = 0.5 - gaussian_cdf(range.min - central, sigma_lower);
        let mass_upper = gaussian_cdf(range.max - central, sigma_upper) - 0.5;
        let c_a = 1.0 / ((sigma_lower / sigma_upper) * mass_lower + mass_upper);
        let c_b = sigma_lower / sigma_upper * c_a;
        let prob_lower = c_b * mass_lower;

        let parameter = parameters.declare(name, central);
        let descriptions = vec![ParameterDescription {
            parameter: parameter.clone(),
            min: range.min,
            max: range.max,
            nuisance: false,
        }];

        Ok(Prior::CurtailedGauss(CurtailedGauss {
            parameter,
            name: name.to_string(),
            range,
            central,
            sigma_lower,
            sigma_upper,
            c_a,
            c_b,
            prob_lower,
            norm_lower: c_b.ln() - LOG_SQRT_2PI - sigma_lower.ln(),
            norm_upper: c_a.ln() - LOG_SQRT_2PI - sigma_upper.ln(),
            descriptions,
        }))
    }

    /// Log-uniform prior on [mu_0/lambda, mu_0*lambda].
    pub fn scale(
        parameters: &Parameters,
        name: &str,
        mu_0: f64,
        lambda: f64,
    ) -> Result<Prior, PriorError> {
        if mu_0 <= 0.0 {
            return Err(PriorError::Range(format!(
                "Scale({name}): default value mu_0 must be strictly positive, got {mu_0}"
            )));
        }
        if lambda <= 1.0 {
            return Err(PriorError::Range(format!(
                "Scale({name}): scale factor lambda must be strictly larger than 1, got {lambda}"
            )));
        }

        let min = mu_0 / lambda;
        let max = mu_0 * lambda;
        let parameter = parameters.declare(name, mu_0);
        let descriptions = vec![ParameterDescription {
            parameter: parameter.clone(),
            min,
            max,
            nuisance: false,
        }];

        Ok(Prior::Scale(Scale {
            parameter,
            name: name.to_string(),
            mu_0,
            lambda,
            min,
            max,
            ln_lambda: lambda.ln(),
            descriptions,
        }))
    }

    /// Joint Gaussian over the named parameters with the given mean
    /// vector and covariance matrix.
    pub fn multivariate_gauss(
        parameters: &Parameters,
        names: &[&str],
        mean: Vec<f64>,
        covariance: SquareMatrix,
    ) -> Result<Prior, PriorError> {
        let dim = names.len();
        if covariance.dim() != mean.len() {
            return Err(PriorError::Dimension(format!(
                "dimension of covariance matrix ({}) and mean vector ({}) are not identical",
                covariance.dim(),
                mean.len()
            )));
        }
        if dim != mean.len() {
            return Err(PriorError::Dimension(format!(
                "number of parameters ({dim}) and dimension of mean vector ({}) are not identical",
                mean.len()
            )));
        }

        // log normalization: -k/2 log(2 pi) - 1/2 log det(V)
        let log_det = covariance.lu_log_abs_det()?;
        let norm = -(dim as f64) * LOG_SQRT_2PI - 0.5 * log_det;

        let chol = covariance.cholesky()?;
        let covariance_inv = chol.invert_from_cholesky();

        let mut handles = Vec::with_capacity(dim);
        let mut descriptions = Vec::with_capacity(dim);
        for (i, name) in names.iter().enumerate() {
            let parameter = parameters.declare(name, mean[i]);
            handles.push(parameter.clone());
            descriptions.push(ParameterDescription {
                parameter,
                min: f64::NEG_INFINITY,
                max: f64::INFINITY,
                nuisance: false,
            });
        }

        Ok(Prior::MultivariateGaussian(MultivariateGaussian {
            parameters: handles,
            names: names.iter().map(|n| n.to_string()).collect(),
            mean,
            covariance,
            norm,
            chol,
            covariance_inv,
            descriptions,
        }))
    }

    /// Log-density at the current parameter values.
    pub fn evaluate(&self) -> f64 {
        match self {
            Prior::Flat(p) => p.value,
            Prior::CurtailedGauss(p) => {
                let x = p.parameter.evaluate();
                let (sigma, norm) = if x < p.central {
                    (p.sigma_lower, p.norm_lower)
                } else {
                    (p.sigma_upper, p.norm_upper)
                };
                let pull = (x - p.central) / sigma;
                norm - 0.5 * pull * pull
            }
            Prior::Scale(p) => {
                let x = p.parameter.evaluate();
                if x < p.min || p.max < x {
                    return f64::NEG_INFINITY;
                }
                -(2.0 * p.ln_lambda * x).ln()
            }
            Prior::MultivariateGaussian(p) => {
                // centered vector d = mean - x
                let d: Vec<f64> = p
                    .parameters
                    .iter()
                    .zip(&p.mean)
                    .map(|(param, mu)| mu - param.evaluate())
                    .collect();
                // quadratic form d^T V^{-1} d; dimensions fixed at construction
                let vd = match p.covariance_inv.matvec(&d) {
                    Ok(vd) => vd,
                    Err(_) => return f64::NAN,
                };
                let chi_square: f64 = d.iter().zip(&vd).map(|(a, b)| a * b).sum();
                p.norm - 0.5 * chi_square
            }
        }
    }

    /// Draw from the prior through the parameter's attached generator
    /// and write the result back into the parameter.
    pub fn sample(&self) {
        match self {
            Prior::Flat(p) => {
                let u = p.parameter.evaluate_generator();
                p.parameter
                    .set(u * (p.range.max - p.range.min) + p.range.min);
            }
            Prior::CurtailedGauss(p) => {
                // Decide the branch by the precomputed lower-branch mass,
                // then invert the truncated-Gaussian CDF of that branch.
                let u = p.parameter.evaluate_generator();
                let x = if u < p.prob_lower {
                    gaussian_inv_cdf((u - p.prob_lower) / p.c_b + 0.5, p.sigma_lower) + p.central
                } else {
                    gaussian_inv_cdf((u - p.prob_lower) / p.c_a + 0.5, p.sigma_upper) + p.central
                };
                p.parameter.set(x);
            }
            Prior::Scale(p) => {
                // inverse CDF: x = mu_0 * lambda^(2u - 1)
                let u = p.parameter.evaluate_generator();
                p.parameter.set(p.mu_0 * p.lambda.powf(2.0 * u - 1.0));
            }
            Prior::MultivariateGaussian(p) => {
                // x = mean + L * z with z standard normal
                let z: Vec<f64> = p
                    .parameters
                    .iter()
                    .map(|param| std_normal_inv_cdf(param.evaluate_generator()))
                    .collect();
                if let Ok(lz) = p.chol.matvec(&z) {
                    for ((param, mu), lz_i) in p.parameters.iter().zip(&p.mean).zip(&lz) {
                        param.set(mu + lz_i);
                    }
                }
            }
        }
    }

    /// Clone this prior with its parameters re-bound to a different
    /// registry. Distribution shape is preserved exactly.
    pub fn clone_to(&self, parameters: &Parameters) -> Prior {
        match self {
            Prior::Flat(p) => {
                let parameter = parameters.declare(&p.name, p.parameter.evaluate());
                let descriptions = rebind(&p.descriptions, parameters);
                Prior::Flat(Flat {
                    parameter,
                    name: p.name.clone(),
                    range: p.range,
                    value: p.value,
                    descriptions,
                })
            }
            Prior::CurtailedGauss(p) => {
                let parameter = parameters.declare(&p.name, p.parameter.evaluate());
                let descriptions = rebind(&p.descriptions, parameters);
                Prior::CurtailedGauss(CurtailedGauss {
                    parameter,
                    descriptions,
                    name: p.name.clone(),
                    ..p.clone()
                })
            }
            Prior::Scale(p) => {
                let parameter = parameters.declare(&p.name, p.parameter.evaluate());
                let descriptions = rebind(&p.descriptions, parameters);
                Prior::Scale(Scale {
                    parameter,
                    descriptions,
                    name: p.name.clone(),
                    ..p.clone()
                })
            }
            Prior::MultivariateGaussian(p) => {
                let handles: Vec<Parameter> = p
                    .parameters
                    .iter()
                    .map(|param| parameters.declare(&param.name(), param.evaluate()))
                    .collect();
                let descriptions = rebind(&p.descriptions, parameters);
                Prior::MultivariateGaussian(MultivariateGaussian {
                    parameters: handles,
                    descriptions,
                    names: p.names.clone(),
                    mean: p.mean.clone(),
                    covariance: p.covariance.clone(),
                    chol: p.chol.clone(),
                    covariance_inv: p.covariance_inv.clone(),
                    ..*p
                })
            }
        }
    }

    /// Canonical one-line textual form; parseable by [`Prior::parse`].
    ///
    /// The multivariate Gaussian has no such form and errors.
    pub fn as_string(&self) -> Result<String, PriorError> {
        match self {
            Prior::Flat(p) => Ok(format!(
                "Parameter: {}, prior type: flat, range: [{},{}]",
                p.name, p.range.min, p.range.max
            )),
            Prior::CurtailedGauss(p) => {
                let mut result = format!(
                    "Parameter: {}, prior type: Gaussian, range: [{},{}], x = {}",
                    p.name, p.range.min, p.range.max, p.central
                );
                if (p.sigma_upper - p.sigma_lower).abs() < 1e-15 {
                    result += &format!(" +- {}", p.sigma_upper);
                } else {
                    result += &format!(" + {} - {}", p.sigma_upper, p.sigma_lower);
                }
                Ok(result)
            }
            Prior::Scale(p) => Ok(format!(
                "Parameter: {}, prior type: Scale, range: [{},{}], mu_0 = {}, lambda = {}",
                p.name, p.min, p.max, p.mu_0, p.lambda
            )),
            Prior::MultivariateGaussian(_) => Err(PriorError::NoTextForm),
        }
    }

    /// False only for the flat prior.
    pub fn informative(&self) -> bool {
        !matches!(self, Prior::Flat(_))
    }

    /// Descriptions of the parameters this prior controls, in order.
    pub fn descriptions(&self) -> &[ParameterDescription] {
        match self {
            Prior::Flat(p) => &p.descriptions,
            Prior::CurtailedGauss(p) => &p.descriptions,
            Prior::Scale(p) => &p.descriptions,
            Prior::MultivariateGaussian(p) => &p.descriptions,
        }
    }

    /// Marginal variance of the named parameter under this prior, or
    /// None when the prior does not own that parameter. Used to seed
    /// proposal covariances.
    pub fn variance(&self, name: &str) -> Option<f64> {
        match self {
            Prior::Flat(p) => {
                if p.name != name {
                    return None;
                }
                let width = p.range.max - p.range.min;
                Some(width * width / 12.0)
            }
            Prior::CurtailedGauss(p) => {
                if p.name != name {
                    return None;
                }
                // mean width squared; exact in the symmetric untruncated limit
                let sigma = 0.5 * (p.sigma_lower + p.sigma_upper);
                Some(sigma * sigma)
            }
            Prior::Scale(p) => {
                if p.name != name {
                    return None;
                }
                let mean = (p.mu_0 * p.lambda - p.mu_0 / p.lambda) / (2.0 * p.ln_lambda);
                let mean_sq = (p.mu_0 * p.mu_0 * p.lambda * p.lambda
                    - p.mu_0 * p.mu_0 / (p.lambda * p.lambda))
                    / (4.0 * p.ln_lambda);
                Some(mean_sq - mean * mean)
            }
            Prior::MultivariateGaussian(p) => {
                let i = p.names.iter().position(|n| n == name)?;
                Some(p.covariance.get(i, i))
            }
        }
    }

    /// Parse the one-line prior grammar:
    ///
    /// `Parameter: <name>, prior type: <type>, range: [<min>,<max>]`
    /// optionally followed by `, x = <central> +- <sigma>` or
    /// `, x = <central> + <upper> - <lower>` (Gaussian), or
    /// `, mu_0 = <value>, lambda = <value>` (Scale).
    pub fn parse(parameters: &Parameters, s: &str) -> Result<Prior, PriorError> {
        let mut cur = Cursor::new(s);
        cur.tag("Parameter:", "parameter name")?;
        let name = cur.until(',', "parameter name")?.trim().to_string();
        cur.tag("prior type:", "prior type")?;
        let prior_type = cur.until(',', "prior type")?.trim().to_string();
        cur.tag("range:", "range")?;
        cur.tag("[", "range")?;
        let min = cur.number_until(',', "range minimum")?;
        let max = cur.number_until(']', "range maximum")?;
        let range = ParameterRange::new(min, max);

        match prior_type.as_str() {
            "flat" => Prior::flat(parameters, &name, range),
            "Gaussian" => {
                cur.tag(",", "central value")?;
                cur.tag("x =", "central value")?;
                let central = cur.number_until('+', "central value")?;
                let (sigma_lower, sigma_upper) = if cur.next_is('-') {
                    // symmetric form: +- sigma
                    cur.tag("-", "sigma")?;
                    let sigma = cur.rest_number("sigma")?;
                    (sigma, sigma)
                } else {
                    let upper = cur.number_until('-', "sigma upper")?;
                    let lower = cur.rest_number("sigma lower")?;
                    (lower, upper)
                };
                Prior::curtailed_gauss(
                    parameters,
                    &name,
                    range,
                    central - sigma_lower,
                    central,
                    central + sigma_upper,
                )
            }
            "Scale" => {
                cur.tag(",", "mu_0")?;
                cur.tag("mu_0 =", "mu_0")?;
                let mu_0 = cur.number_until(',', "mu_0")?;
                cur.tag("lambda =", "lambda")?;
                let lambda = cur.rest_number("lambda")?;
                Prior::scale(parameters, &name, mu_0, lambda)
            }
            _ => Err(PriorError::UnknownPrior(s.to_string())),
        }
    }
}

fn rebind(descriptions: &[ParameterDescription], parameters: &Parameters) -> Vec<ParameterDescription> {
    descriptions
        .iter()
        .map(|d| ParameterDescription {
            parameter: parameters.declare(&d.parameter.name(), d.parameter.evaluate()),
            min: d.min,
            max: d.max,
            nuisance: d.nuisance,
        })
        .collect()
}

/// Tiny cursor over the grammar string with explicit error production
/// for every malformed field.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }

    fn tag(&mut self, literal: &str, field: &'static str) -> Result<(), PriorError> {
        let trimmed = self.rest.trim_start();
        match trimmed.strip_prefix(literal) {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(PriorError::Parse {
                field,
                message: format!("expected '{literal}' before '{trimmed}'"),
            }),
        }
    }

    fn until(&mut self, delim: char, field: &'static str) -> Result<&'a str, PriorError> {
        match self.rest.find(delim) {
            Some(pos) => {
                let token = &self.rest[..pos];
                self.rest = &self.rest[pos + delim.len_utf8()..];
                Ok(token)
            }
            None => Err(PriorError::Parse {
                field,
                message: format!("expected '{delim}' after '{}'", self.rest.trim()),
            }),
        }
    }

    fn number_until(&mut self, delim: char, field: &'static str) -> Result<f64, PriorError> {
        let token = self.until(delim, field)?.trim();
        token.parse::<f64>().map_err(|_| PriorError::Parse {
            field,
            message: format!("'{token}' is not a number"),
        })
    }

    fn rest_number(&mut self, field: &'static str) -> Result<f64, PriorError> {
        let token = self.rest.trim();
        self.rest = "";
        token.parse::<f64>().map_err(|_| PriorError::Parse {
            field,
            message: format!("'{token}' is not a number"),
        })
    }

    fn next_is(&self, c: char) -> bool {
        self.rest.trim_start().starts_with(c)
    }
}
