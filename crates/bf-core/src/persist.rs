//! Dump and reload analysis descriptions through the table store.
//!
//! Three tables under a caller-chosen base name describe an analysis:
//! `{base}/parameters` (name, range, nuisance flag, prior string, plus
//! a `version` attribute), `{base}/constraints` and
//! `{base}/observables` (names only). The parameter table is enough to
//! rebuild the scan setup; the other two identify the data that went
//! into the fit.

use crate::params::Parameters;
use crate::posterior::LogPosterior;
use crate::prior::{ParameterDescription, PriorError};
use crate::store::{Attribute, Column, ColumnKind, StoreError, TableFile, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Prior(#[from] PriorError),
    #[error("parameter '{name}' has no prior attached")]
    MissingPrior { name: String },
    #[error("table '{table}': {message}")]
    Malformed { table: String, message: String },
}

/// Summary of a dumped analysis, as read back by
/// [`read_analysis_info`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInfo {
    pub version: String,
    pub priors: Vec<String>,
    pub constraints: Vec<String>,
    pub observables: Vec<String>,
}

fn parameter_columns() -> Vec<Column> {
    vec![
        Column::new("name", ColumnKind::Str),
        Column::new("min", ColumnKind::F64),
        Column::new("max", ColumnKind::F64),
        Column::new("nuisance", ColumnKind::I32),
        Column::new("prior", ColumnKind::Str),
    ]
}

fn name_column() -> Vec<Column> {
    vec![Column::new("name", ColumnKind::Str)]
}

/// Write the posterior's parameter descriptions, constraint names and
/// observable names under `base`.
///
/// Fails for priors without a one-line text form (the multivariate
/// Gaussian).
pub fn dump_descriptions(
    file: &mut TableFile,
    base: &str,
    posterior: &LogPosterior,
) -> Result<(), PersistError> {
    let parameters_table = format!("{base}/parameters");
    file.create_table(&parameters_table, parameter_columns())?;
    for description in posterior.parameter_descriptions() {
        let name = description.parameter.name();
        let prior = posterior
            .prior_of(&name)
            .ok_or_else(|| PersistError::MissingPrior { name: name.clone() })?;
        file.append(
            &parameters_table,
            vec![
                Value::str(name),
                Value::F64(description.min),
                Value::F64(description.max),
                Value::I32(i32::from(description.nuisance)),
                Value::str(prior.as_string()?),
            ],
        )?;
    }
    file.table_mut(&parameters_table)?.set_attribute(
        "version",
        Attribute::Str(env!("CARGO_PKG_VERSION").to_string()),
    );

    let constraints_table = format!("{base}/constraints");
    file.create_table(&constraints_table, name_column())?;
    for constraint in posterior.likelihood().constraints() {
        file.append(&constraints_table, vec![Value::str(constraint.name())])?;
    }

    let observables_table = format!("{base}/observables");
    file.create_table(&observables_table, name_column())?;
    let cache = posterior.likelihood().observable_cache();
    for i in 0..cache.len() {
        file.append(&observables_table, vec![Value::str(cache.name(i))])?;
    }

    Ok(())
}

/// Rebuild parameter descriptions from `{base}/parameters` on a fresh
/// registry. Parameters start at the midpoint of their range.
pub fn read_descriptions(
    file: &TableFile,
    base: &str,
) -> Result<(Parameters, Vec<ParameterDescription>), PersistError> {
    let table_name = format!("{base}/parameters");
    let table = file.table(&table_name)?;

    let parameters = Parameters::new();
    let mut descriptions = Vec::with_capacity(table.len());
    for row in table.rows() {
        let malformed = |message: &str| PersistError::Malformed {
            table: table_name.clone(),
            message: message.to_string(),
        };
        let name = row
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing parameter name"))?;
        let min = row
            .get(1)
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed("missing range minimum"))?;
        let max = row
            .get(2)
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed("missing range maximum"))?;
        let nuisance = row
            .get(3)
            .and_then(Value::as_i32)
            .ok_or_else(|| malformed("missing nuisance flag"))?;

        let start = if min.is_finite() && max.is_finite() {
            0.5 * (min + max)
        } else {
            0.0
        };
        descriptions.push(ParameterDescription {
            parameter: parameters.declare(name, start),
            min,
            max,
            nuisance: nuisance != 0,
        });
    }
    Ok((parameters, descriptions))
}

/// Read back everything dumped by [`dump_descriptions`] that is not a
/// parameter description: prior strings, constraint and observable
/// names, and the writing library version.
pub fn read_analysis_info(file: &TableFile, base: &str) -> Result<AnalysisInfo, PersistError> {
    let parameters_table = format!("{base}/parameters");
    let table = file.table(&parameters_table)?;

    let version = match table.attribute("version") {
        Some(Attribute::Str(v)) => v.clone(),
        _ => {
            return Err(PersistError::Malformed {
                table: parameters_table,
                message: "missing version attribute".to_string(),
            })
        }
    };

    let mut priors = Vec::with_capacity(table.len());
    for row in table.rows() {
        let prior = row.get(4).and_then(Value::as_str).ok_or_else(|| {
            PersistError::Malformed {
                table: parameters_table.clone(),
                message: "missing prior string".to_string(),
            }
        })?;
        priors.push(prior.to_string());
    }

    let read_names = |table_name: String| -> Result<Vec<String>, PersistError> {
        let table = file.table(&table_name)?;
        table
            .rows()
            .iter()
            .map(|row| {
                row.first()
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| PersistError::Malformed {
                        table: table_name.clone(),
                        message: "missing name".to_string(),
                    })
            })
            .collect()
    };

    Ok(AnalysisInfo {
        version,
        priors,
        constraints: read_names(format!("{base}/constraints"))?,
        observables: read_names(format!("{base}/observables"))?,
    })
}
