//! Standard normal CDF and quantile function.
//!
//! The CDF goes through the incomplete-gamma relation
//! erf(x / sqrt(2)) = P(1/2, x^2 / 2), so it shares precision with the
//! chi-square machinery. The quantile uses Acklam's rational
//! approximation refined by a single Halley step against the CDF.

use super::gammainc::{gamma_p, gamma_q};
use super::stable::LOG_SQRT_2PI;

// Acklam (2003) rational approximation coefficients.
#[allow(clippy::excessive_precision)]
const ACKLAM_A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_690e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
#[allow(clippy::excessive_precision)]
const ACKLAM_B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
#[allow(clippy::excessive_precision)]
const ACKLAM_C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
#[allow(clippy::excessive_precision)]
const ACKLAM_D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const ACKLAM_P_LOW: f64 = 0.02425;

/// CDF of the standard normal distribution.
pub fn std_normal_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x == 0.0 {
        return 0.5;
    }
    let half_x2 = 0.5 * x * x;
    if x > 0.0 {
        0.5 * (1.0 + gamma_p(0.5, half_x2))
    } else {
        0.5 * gamma_q(0.5, half_x2)
    }
}

/// Quantile (inverse CDF) of the standard normal distribution.
///
/// Returns -inf for p <= 0 and +inf for p >= 1.
pub fn std_normal_inv_cdf(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let x = if p < ACKLAM_P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        acklam_tail(q)
    } else if p > 1.0 - ACKLAM_P_LOW {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -acklam_tail(q)
    } else {
        let q = p - 0.5;
        let r = q * q;
        q * (((((ACKLAM_A[0] * r + ACKLAM_A[1]) * r + ACKLAM_A[2]) * r + ACKLAM_A[3]) * r
            + ACKLAM_A[4])
            * r
            + ACKLAM_A[5])
            / (((((ACKLAM_B[0] * r + ACKLAM_B[1]) * r + ACKLAM_B[2]) * r + ACKLAM_B[3]) * r
                + ACKLAM_B[4])
                * r
                + 1.0)
    };

    // One Halley refinement step against the full-precision CDF.
    let err = std_normal_cdf(x) - p;
    let u = err * (LOG_SQRT_2PI + 0.5 * x * x).exp();
    x - u / (1.0 + 0.5 * x * u)
}

fn acklam_tail(q: f64) -> f64 {
    (((((ACKLAM_C[0] * q + ACKLAM_C[1]) * q + ACKLAM_C[2]) * q + ACKLAM_C[3]) * q + ACKLAM_C[4])
        * q
        + ACKLAM_C[5])
        / ((((ACKLAM_D[0] * q + ACKLAM_D[1]) * q + ACKLAM_D[2]) * q + ACKLAM_D[3]) * q + 1.0)
}

/// CDF of a centered Gaussian with standard deviation `sigma`.
pub fn gaussian_cdf(x: f64, sigma: f64) -> f64 {
    if sigma.is_nan() || sigma <= 0.0 {
        return f64::NAN;
    }
    std_normal_cdf(x / sigma)
}

/// Quantile of a centered Gaussian with standard deviation `sigma`.
pub fn gaussian_inv_cdf(p: f64, sigma: f64) -> f64 {
    if sigma.is_nan() || sigma <= 0.0 {
        return f64::NAN;
    }
    sigma * std_normal_inv_cdf(p)
}
