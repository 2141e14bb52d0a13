//! Goodness-of-fit check at a fixed parameter point.
//!
//! Two routes to a p-value: a parametric bootstrap of the likelihood
//! (converted to an effective chi-square at the observation count,
//! then corrected for fitted parameters), and the analytic chi-square
//! built from the summed squared pulls of all constraint blocks.
//! Results can be persisted to a table store document together with
//! the analysis descriptions.

use crate::persist::{dump_descriptions, PersistError};
use crate::posterior::{LogPosterior, PosteriorError};
use crate::store::{Attribute, Column, ColumnKind, StoreError, TableFile, Value};
use bf_math::{chisq_survival, chisq_survival_inv};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum GofError {
    #[error("got {got} values for {expected} parameters")]
    Dimension { expected: usize, got: usize },
    #[error("value {value} for parameter '{name}' lies outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error(transparent)]
    Posterior(#[from] PosteriorError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Evaluate the fit quality at `values` (in parameter declaration
/// order).
///
/// Returns `(p_bootstrap, p_simulated)`: the raw bootstrap p-value of
/// the likelihood, and the chi-square p-value obtained from it after
/// correcting for the full number of fitted parameters. The analytic
/// significance route is logged and persisted but not returned. A
/// non-positive number of degrees of freedom yields `NEG_INFINITY`
/// for the corrected p-value.
pub fn goodness_of_fit(
    posterior: &LogPosterior,
    values: &[f64],
    simulated_datasets: u32,
    output: Option<&Path>,
) -> Result<(f64, f64), GofError> {
    let descriptions = posterior.parameter_descriptions();
    if values.len() != descriptions.len() {
        return Err(GofError::Dimension {
            expected: descriptions.len(),
            got: values.len(),
        });
    }
    // full validation before any parameter is touched
    for (description, &value) in descriptions.iter().zip(values) {
        if value < description.min || description.max < value {
            return Err(GofError::OutOfRange {
                name: description.parameter.name(),
                value,
                min: description.min,
                max: description.max,
            });
        }
    }

    let log_posterior = posterior.evaluate(values)?;
    let log_likelihood = posterior.log_likelihood();
    info!(log_posterior, log_likelihood, "evaluating fit point");

    let observations = posterior.number_of_observations();
    let parameters_total = descriptions.len();
    let parameters_scan = descriptions.iter().filter(|d| !d.nuisance).count();
    let dof_total = f64::from(observations) - parameters_total as f64;
    let dof_scan = f64::from(observations) - parameters_scan as f64;

    // simulation route
    let (p_bootstrap, observed_chi2) = posterior
        .likelihood()
        .bootstrap_p_value(simulated_datasets);
    let chi2_simulation = chisq_survival_inv(p_bootstrap, f64::from(observations));
    let p_simulated = p_value_at(chi2_simulation, dof_total);
    let p_simulated_scan = p_value_at(chi2_simulation, dof_scan);
    info!(
        p_bootstrap,
        observed_chi2, chi2_simulation, p_simulated, p_simulated_scan, "simulation route"
    );

    // analytic route: summed squared pulls over all constraint blocks
    let constraints = posterior.likelihood().constraints();
    for constraint in &constraints {
        for block in constraint.blocks() {
            debug!(
                constraint = constraint.name(),
                significance = block.significance(),
                "constraint pull"
            );
        }
    }
    let cache = posterior.likelihood().observable_cache();
    for i in 0..cache.len() {
        debug!(observable = cache.name(i), value = cache.value(i), "prediction");
    }
    let chi2_significance: f64 = constraints
        .iter()
        .flat_map(|c| c.blocks())
        .map(|block| block.significance() * block.significance())
        .sum();
    let p_analytic = p_value_at(chi2_significance, dof_total);
    let p_analytic_scan = p_value_at(chi2_significance, dof_scan);
    info!(
        chi2_significance,
        p_analytic, p_analytic_scan, "significance route"
    );

    if let Some(path) = output {
        let mut file = TableFile::new();
        dump_descriptions(&mut file, "descriptions", posterior)?;

        file.create_table(
            "data/parameters",
            vec![
                Column::new("name", ColumnKind::Str),
                Column::new("value", ColumnKind::F64),
            ],
        )?;
        for (description, &value) in descriptions.iter().zip(values) {
            file.append(
                "data/parameters",
                vec![Value::str(description.parameter.name()), Value::F64(value)],
            )?;
        }

        file.create_table(
            "data/significances",
            vec![
                Column::new("constraint", ColumnKind::Str),
                Column::new("significance", ColumnKind::F64),
            ],
        )?;
        for constraint in &constraints {
            for block in constraint.blocks() {
                file.append(
                    "data/significances",
                    vec![
                        Value::str(constraint.name()),
                        Value::F64(block.significance()),
                    ],
                )?;
            }
        }
        let significances = file.table_mut("data/significances")?;
        significances.set_attribute("chi2_significance", Attribute::F64(chi2_significance));
        significances.set_attribute("chi2_simulation", Attribute::F64(chi2_simulation));

        file.save(path)?;
        info!(path = %path.display(), "wrote goodness-of-fit document");
    }

    Ok((p_bootstrap, p_simulated))
}

fn p_value_at(chi2: f64, dof: f64) -> f64 {
    if dof <= 0.0 {
        warn!(dof, "non-positive degrees of freedom");
        return f64::NEG_INFINITY;
    }
    chisq_survival(chi2, dof)
}
