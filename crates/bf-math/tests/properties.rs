//! Property-based tests for bf-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use bf_math::{
    chisq_survival, chisq_survival_inv, gamma_p, gamma_q, log_gamma, std_normal_cdf,
    std_normal_inv_cdf, SquareMatrix,
};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-9;

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a.is_infinite() && b.is_infinite() {
        return a.signum() == b.signum();
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log_gamma properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Recurrence Gamma(z+1) = z Gamma(z) in log form.
    #[test]
    fn log_gamma_recurrence(z in 0.1..50.0f64) {
        let lhs = log_gamma(z + 1.0);
        let rhs = z.ln() + log_gamma(z);
        prop_assert!(approx_eq(lhs, rhs, TOL), "recurrence failed at z={}: {} vs {}", z, lhs, rhs);
    }

    /// Duplication-free sanity: log_gamma is finite and smooth on (0, 100).
    #[test]
    fn log_gamma_finite_on_positive_axis(z in 0.01..100.0f64) {
        prop_assert!(log_gamma(z).is_finite());
    }
}

// ============================================================================
// incomplete gamma properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// P and Q are complementary.
    #[test]
    fn gamma_p_q_complementary(a in 0.1..30.0f64, x in 0.0..60.0f64) {
        let sum = gamma_p(a, x) + gamma_q(a, x);
        prop_assert!(approx_eq(sum, 1.0, TOL), "P+Q={} at a={}, x={}", sum, a, x);
    }

    /// P lies in [0, 1] and is monotone in x.
    #[test]
    fn gamma_p_monotone(a in 0.1..30.0f64, x in 0.0..50.0f64, dx in 0.001..5.0f64) {
        let p1 = gamma_p(a, x);
        let p2 = gamma_p(a, x + dx);
        prop_assert!((0.0..=1.0).contains(&p1));
        prop_assert!(p2 >= p1 - TOL, "P not monotone: P({})={} > P({})={}", x, p1, x + dx, p2);
    }
}

// ============================================================================
// normal CDF / quantile properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// CDF symmetry: Phi(x) + Phi(-x) = 1.
    #[test]
    fn normal_cdf_symmetric(x in -8.0..8.0f64) {
        let sum = std_normal_cdf(x) + std_normal_cdf(-x);
        prop_assert!(approx_eq(sum, 1.0, TOL));
    }

    /// Quantile inverts the CDF.
    #[test]
    fn normal_quantile_inverts_cdf(p in 0.0001..0.9999f64) {
        let x = std_normal_inv_cdf(p);
        prop_assert!(approx_eq(std_normal_cdf(x), p, 1e-10), "p={} -> x={} -> {}", p, x, std_normal_cdf(x));
    }

    /// Quantile is antisymmetric about the median.
    #[test]
    fn normal_quantile_antisymmetric(p in 0.001..0.5f64) {
        let lo = std_normal_inv_cdf(p);
        let hi = std_normal_inv_cdf(1.0 - p);
        prop_assert!(approx_eq(lo, -hi, 1e-8), "quantiles not antisymmetric: {} vs {}", lo, hi);
    }
}

// ============================================================================
// chi-square properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Survival function decreases in x.
    #[test]
    fn chisq_survival_decreasing(dof in 1.0..30.0f64, x in 0.01..40.0f64, dx in 0.01..10.0f64) {
        let q1 = chisq_survival(x, dof);
        let q2 = chisq_survival(x + dx, dof);
        prop_assert!(q2 <= q1 + TOL);
    }

    /// Inverse round-trips the survival function.
    #[test]
    fn chisq_inverse_round_trip(dof in 1.0..25.0f64, p in 0.001..0.999f64) {
        let x = chisq_survival_inv(p, dof);
        prop_assert!(approx_eq(chisq_survival(x, dof), p, 1e-8), "p={}, dof={}, x={}", p, dof, x);
    }
}

// ============================================================================
// linalg properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A random SPD matrix (B B^T + eps I) factors and inverts cleanly.
    #[test]
    fn cholesky_inverse_identity(seed in proptest::collection::vec(-2.0..2.0f64, 9)) {
        let b = SquareMatrix::from_vec(3, seed).unwrap();
        // a = b * b^T + I, guaranteed SPD
        let mut a = SquareMatrix::zeros(3);
        for i in 0..3 {
            for j in 0..3 {
                let mut sum = if i == j { 1.0 } else { 0.0 };
                for k in 0..3 {
                    sum += b.get(i, k) * b.get(j, k);
                }
                a.set(i, j, sum);
            }
        }

        let chol = a.cholesky().unwrap();
        let inv = chol.invert_from_cholesky();
        for i in 0..3 {
            for j in 0..3 {
                let mut sum = 0.0;
                for k in 0..3 {
                    sum += a.get(i, k) * inv.get(k, j);
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                prop_assert!(approx_eq(sum, expected, 1e-7), "A*Ainv[{}][{}]={}", i, j, sum);
            }
        }

        // determinant consistency between LU and Cholesky routes
        let via_chol: f64 = 2.0 * (0..3).map(|i| chol.get(i, i).ln()).sum::<f64>();
        prop_assert!(approx_eq(a.lu_log_abs_det().unwrap(), via_chol, 1e-8));
    }
}
