//! Mode finding on the log-posterior with a randomized Nelder-Mead
//! simplex.
//!
//! The simplex is seeded with a randomly oriented cloud around the
//! starting point, scaled per parameter by its allowed range. Higher
//! strategy levels re-seed the simplex around the incumbent best point
//! after convergence, which helps escape shallow local modes.

use crate::posterior::{LogPosterior, PosteriorError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("invalid optimization option: {0}")]
    InvalidOptions(String),
    #[error("got {got} starting values for {expected} parameters")]
    Dimension { expected: usize, got: usize },
    #[error(transparent)]
    Posterior(#[from] PosteriorError),
}

/// Knobs of the simplex run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationOptions {
    /// Initial simplex spread as a fraction of each parameter's range,
    /// in (0, 1].
    pub initial_step_size: f64,
    /// Total iteration budget across all restarts.
    pub maximum_iterations: u32,
    /// Convergence threshold on the mean vertex-centroid distance,
    /// in (0, 1].
    pub tolerance: f64,
    /// Number of simplex re-seedings after convergence, in 0..=2.
    pub strategy_level: u8,
}

impl OptimizationOptions {
    pub fn defaults() -> Self {
        Self {
            initial_step_size: 0.1,
            maximum_iterations: 8000,
            tolerance: 0.1,
            strategy_level: 1,
        }
    }

    fn validate(&self) -> Result<(), OptimizeError> {
        if !(self.initial_step_size > 0.0 && self.initial_step_size <= 1.0) {
            return Err(OptimizeError::InvalidOptions(format!(
                "initial_step_size must lie in (0, 1], got {}",
                self.initial_step_size
            )));
        }
        if self.maximum_iterations == 0 {
            return Err(OptimizeError::InvalidOptions(
                "maximum_iterations must be positive".to_string(),
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance <= 1.0) {
            return Err(OptimizeError::InvalidOptions(format!(
                "tolerance must lie in (0, 1], got {}",
                self.tolerance
            )));
        }
        if self.strategy_level > 2 {
            return Err(OptimizeError::InvalidOptions(format!(
                "strategy_level must lie in 0..=2, got {}",
                self.strategy_level
            )));
        }
        Ok(())
    }
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self::defaults()
    }
}

struct Vertex {
    x: Vec<f64>,
    f: f64,
}

/// Maximize the log-posterior starting from `initial`.
///
/// Returns the best point found; when no point strictly better than the
/// start shows up, the start itself is returned. The posterior's
/// parameters are left at the returned point.
pub fn optimize(
    posterior: &LogPosterior,
    initial: &[f64],
    options: &OptimizationOptions,
) -> Result<Vec<f64>, OptimizeError> {
    options.validate()?;
    let n = posterior.parameter_descriptions().len();
    if initial.len() != n {
        return Err(OptimizeError::Dimension {
            expected: n,
            got: initial.len(),
        });
    }

    // Minimize the negative log posterior.
    let objective = |x: &[f64]| -> Result<f64, OptimizeError> {
        let value = posterior.evaluate(x)?;
        Ok(if value == f64::NEG_INFINITY {
            f64::INFINITY
        } else {
            -value
        })
    };

    // Per-parameter spread; infinite ranges fall back to the magnitude
    // of the starting value.
    let steps: Vec<f64> = posterior
        .parameter_descriptions()
        .iter()
        .zip(initial)
        .map(|(d, &x0)| {
            let width = d.max - d.min;
            if width.is_finite() {
                width * options.initial_step_size
            } else {
                (1.0 + x0.abs()) * options.initial_step_size
            }
        })
        .collect();

    let f_initial = objective(initial)?;
    let mut best = initial.to_vec();
    let mut f_best = f_initial;

    let mut iterations_left = options.maximum_iterations;
    let restarts = u32::from(options.strategy_level);

    for restart in 0..=restarts {
        if iterations_left == 0 {
            break;
        }
        let mut simplex = seed_simplex(posterior, &best, &steps, &objective)?;
        let used = run_simplex(&mut simplex, options.tolerance, iterations_left, &objective)?;
        iterations_left -= used;

        simplex.sort_by(|a, b| a.f.total_cmp(&b.f));
        if simplex[0].f < f_best {
            f_best = simplex[0].f;
            best = simplex[0].x.clone();
        }
        debug!(
            restart,
            iterations = used,
            objective = f_best,
            "simplex converged"
        );
    }

    if !(f_best < f_initial) {
        warn!("no improvement over the starting point, returning it unchanged");
        best = initial.to_vec();
    }

    // Leave the registry at the reported mode.
    posterior.evaluate(&best)?;
    info!(log_posterior = -f_best, "mode search finished");
    Ok(best)
}

/// Randomly oriented simplex around `center`: every extra vertex is the
/// center displaced by a uniform variate in [-step, step] per axis.
fn seed_simplex(
    posterior: &LogPosterior,
    center: &[f64],
    steps: &[f64],
    objective: &impl Fn(&[f64]) -> Result<f64, OptimizeError>,
) -> Result<Vec<Vertex>, OptimizeError> {
    let n = center.len();
    let parameters = posterior.parameters();
    let mut simplex = Vec::with_capacity(n + 1);
    simplex.push(Vertex {
        x: center.to_vec(),
        f: objective(center)?,
    });
    for _ in 0..n {
        let x: Vec<f64> = center
            .iter()
            .zip(steps)
            .map(|(&c, &s)| c + s * (2.0 * parameters.random_unit() - 1.0))
            .collect();
        let f = objective(&x)?;
        simplex.push(Vertex { x, f });
    }
    Ok(simplex)
}

/// Standard Nelder-Mead moves until the simplex size drops below
/// `tolerance` or the iteration budget runs out. Returns the number of
/// iterations used.
fn run_simplex(
    simplex: &mut Vec<Vertex>,
    tolerance: f64,
    budget: u32,
    objective: &impl Fn(&[f64]) -> Result<f64, OptimizeError>,
) -> Result<u32, OptimizeError> {
    let n = simplex.len() - 1;
    if n == 0 {
        return Ok(0);
    }

    for iteration in 0..budget {
        simplex.sort_by(|a, b| a.f.total_cmp(&b.f));

        // centroid of all but the worst vertex
        let mut centroid = vec![0.0; n];
        for vertex in simplex.iter().take(n) {
            for (c, &xi) in centroid.iter_mut().zip(&vertex.x) {
                *c += xi / n as f64;
            }
        }

        if simplex_size(simplex, &centroid) < tolerance {
            return Ok(iteration);
        }

        let worst = simplex[n].x.clone();
        let reflected = blend(&centroid, &worst, -1.0);
        let f_reflected = objective(&reflected)?;

        if f_reflected < simplex[0].f {
            // try to expand further along the same direction
            let expanded = blend(&centroid, &worst, -2.0);
            let f_expanded = objective(&expanded)?;
            simplex[n] = if f_expanded < f_reflected {
                Vertex {
                    x: expanded,
                    f: f_expanded,
                }
            } else {
                Vertex {
                    x: reflected,
                    f: f_reflected,
                }
            };
            continue;
        }

        if f_reflected < simplex[n - 1].f {
            simplex[n] = Vertex {
                x: reflected,
                f: f_reflected,
            };
            continue;
        }

        // contraction toward the centroid
        let contracted = blend(&centroid, &worst, 0.5);
        let f_contracted = objective(&contracted)?;
        if f_contracted < simplex[n].f {
            simplex[n] = Vertex {
                x: contracted,
                f: f_contracted,
            };
            continue;
        }

        // shrink everything toward the best vertex
        let best = simplex[0].x.clone();
        for vertex in simplex.iter_mut().skip(1) {
            vertex.x = blend(&best, &vertex.x, 0.5);
            vertex.f = objective(&vertex.x)?;
        }
    }
    Ok(budget)
}

/// Mean distance of the vertices from the centroid.
fn simplex_size(simplex: &[Vertex], centroid: &[f64]) -> f64 {
    let total: f64 = simplex
        .iter()
        .map(|vertex| {
            vertex
                .x
                .iter()
                .zip(centroid)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt()
        })
        .sum();
    total / simplex.len() as f64
}

/// `centroid + t * (point - centroid)`.
fn blend(centroid: &[f64], point: &[f64], t: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(&c, &p)| c + t * (p - c))
        .collect()
}
