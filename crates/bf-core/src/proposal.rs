//! Seed covariance for external Markov chain proposals.

use crate::posterior::{LogPosterior, PosteriorError};

/// Diagonal proposal covariance from the prior variances, row-major
/// over the posterior's parameters in declaration order.
///
/// Scan parameter variances are divided by `scale_reduction` squared;
/// nuisance parameters only when `scale_nuisance` is set.
pub fn proposal_covariance(
    posterior: &LogPosterior,
    scale_reduction: f64,
    scale_nuisance: bool,
) -> Result<Vec<f64>, PosteriorError> {
    let descriptions = posterior.parameter_descriptions();
    let n = descriptions.len();
    let mut covariance = vec![0.0; n * n];

    for (i, description) in descriptions.iter().enumerate() {
        let name = description.parameter.name();
        let variance = posterior
            .prior_of(&name)
            .and_then(|prior| prior.variance(&name))
            .ok_or_else(|| PosteriorError::UnknownParameter { name })?;
        let scaled = if !description.nuisance || scale_nuisance {
            variance / (scale_reduction * scale_reduction)
        } else {
            variance
        };
        covariance[i * n + i] = scaled;
    }
    Ok(covariance)
}
