//! Integration-style test for the full analysis pipeline:
//! assemble posterior → find the mode → goodness of fit with
//! persistence → reload the dumped descriptions.

use bf_core::gof::goodness_of_fit;
use bf_core::likelihood::GaussianLikelihood;
use bf_core::optimize::optimize;
use bf_core::persist::{read_analysis_info, read_descriptions};
use bf_core::store::TableFile;
use bf_core::{
    proposal_covariance, LogPosterior, OptimizationOptions, ParameterRange, Parameters, Prior,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Two measurements of a scan parameter plus one nuisance parameter
/// with an informative prior.
fn build_posterior() -> LogPosterior {
    let parameters = Parameters::with_seed(2024);
    let mut llh = GaussianLikelihood::new(parameters.clone());
    llh.add_observation("exp::A", "coupling", 0.52, 0.05)
        .unwrap();
    llh.add_observation("exp::B", "coupling", 0.48, 0.04)
        .unwrap();
    llh.add_observation("theory::norm", "normalization", 1.02, 0.08)
        .unwrap();

    let mut posterior = LogPosterior::new(Box::new(llh));
    let scan = Prior::flat(&parameters, "coupling", ParameterRange::new(0.0, 1.0)).unwrap();
    assert!(posterior.add(&scan, false));
    let nuisance = Prior::curtailed_gauss(
        &parameters,
        "normalization",
        ParameterRange::new(0.5, 1.5),
        0.9,
        1.0,
        1.1,
    )
    .unwrap();
    assert!(posterior.add(&nuisance, true));
    posterior
}

#[test]
fn mode_then_gof_then_reload() {
    init_tracing();
    let posterior = build_posterior();

    // 1. mode finding from a displaced start
    let mut options = OptimizationOptions::defaults();
    options.tolerance = 1e-5;
    options.strategy_level = 2;
    let mode = optimize(&posterior, &[0.1, 0.6], &options).unwrap();

    // weighted average of the two coupling measurements is ~0.4995
    let weighted = (0.52 / 0.0025 + 0.48 / 0.0016) / (1.0 / 0.0025 + 1.0 / 0.0016);
    assert!(approx_eq(mode[0], weighted, 5e-3), "mode = {:?}", mode);
    // normalization pulled slightly away from 1.02 by its prior
    assert!(mode[1] > 1.0 && mode[1] < 1.02);

    // 2. goodness of fit at the mode, persisted
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis.json");
    let (p_bootstrap, p_sim) = goodness_of_fit(&posterior, &mode, 500, Some(&path)).unwrap();
    // a good fit on 3 observations with 2 fitted parameters
    assert!(p_bootstrap > 0.3, "p_bootstrap = {p_bootstrap}");
    assert!(p_sim > 0.05, "p_sim = {p_sim}");

    // 3. reload and cross-check the dumped analysis
    let file = TableFile::load(&path).unwrap();
    let (_, descriptions) = read_descriptions(&file, "descriptions").unwrap();
    assert_eq!(descriptions.len(), 2);
    assert_eq!(descriptions[0].parameter.name(), "coupling");
    assert!(!descriptions[0].nuisance);
    assert!(descriptions[1].nuisance);

    let info = read_analysis_info(&file, "descriptions").unwrap();
    assert_eq!(info.constraints.len(), 3);
    assert_eq!(info.priors.len(), 2);
    // prior strings reconstruct equivalent priors on a fresh registry
    let fresh = Parameters::with_seed(7);
    for s in &info.priors {
        let prior = Prior::parse(&fresh, s).unwrap();
        assert_eq!(&prior.as_string().unwrap(), s);
    }

    // the persisted fit point matches the mode
    let point = file.table("data/parameters").unwrap();
    assert!(approx_eq(point.rows()[0][1].as_f64().unwrap(), mode[0], 1e-12));
    assert!(approx_eq(point.rows()[1][1].as_f64().unwrap(), mode[1], 1e-12));
}

#[test]
fn proposal_covariance_reflects_priors() {
    let posterior = build_posterior();
    let covariance = proposal_covariance(&posterior, 2.0, false).unwrap();
    assert_eq!(covariance.len(), 4);
    // scan: uniform variance 1/12, reduced by 4
    assert!(approx_eq(covariance[0], 1.0 / 12.0 / 4.0, 1e-12));
    // nuisance: sigma 0.1, unscaled
    assert!(approx_eq(covariance[3], 0.01, 1e-12));
}

#[test]
fn cloned_posterior_runs_independently() {
    let posterior = build_posterior();
    let clone = posterior.clone();

    posterior.parameters().get("coupling").unwrap().set(0.1);
    clone.parameters().get("coupling").unwrap().set(0.9);

    // evaluations see their own registries
    assert!(posterior.log_posterior().unwrap() != clone.log_posterior().unwrap());
}
