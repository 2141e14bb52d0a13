//! Chi-square tail probabilities.
//!
//! Survival function Q(x; k) = Q(k/2, x/2) through the regularized
//! incomplete gamma function, and its inverse by bracketed bisection.

use super::gammainc::gamma_q;

const INV_MAX_ITERS: usize = 200;
const INV_TOL: f64 = 1e-12;

/// Upper tail probability P(X > x) for X ~ chi-square with `dof`
/// degrees of freedom.
pub fn chisq_survival(x: f64, dof: f64) -> f64 {
    if x.is_nan() || dof.is_nan() || dof <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    gamma_q(0.5 * dof, 0.5 * x)
}

/// Inverse of [`chisq_survival`]: the x with P(X > x) = p.
pub fn chisq_survival_inv(p: f64, dof: f64) -> f64 {
    if p.is_nan() || dof.is_nan() || dof <= 0.0 || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 1.0 {
        return 0.0;
    }
    if p == 0.0 {
        return f64::INFINITY;
    }

    // Bracket the root, then bisect. The survival function is strictly
    // decreasing in x.
    let mut low = 0.0;
    let mut high = dof.max(1.0);
    while chisq_survival(high, dof) > p {
        high *= 2.0;
        if high.is_infinite() {
            return f64::INFINITY;
        }
    }

    let mut mid = 0.5 * (low + high);
    for _ in 0..INV_MAX_ITERS {
        mid = 0.5 * (low + high);
        let q = chisq_survival(mid, dof);
        if q.is_nan() {
            return f64::NAN;
        }
        let delta = q - p;
        if delta.abs() < INV_TOL {
            return mid;
        }
        if delta > 0.0 {
            low = mid;
        } else {
            high = mid;
        }
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn survival_two_dof_is_exponential() {
        // For k = 2, Q(x) = exp(-x/2).
        for x in [0.5, 1.0, 3.0, 10.0] {
            let expected = (-0.5 * x as f64).exp();
            assert!(approx_eq(chisq_survival(x, 2.0), expected, 1e-12));
        }
    }

    #[test]
    fn survival_boundaries() {
        assert_eq!(chisq_survival(0.0, 3.0), 1.0);
        assert_eq!(chisq_survival(-1.0, 3.0), 1.0);
        assert!(chisq_survival(1.0, 0.0).is_nan());
    }

    #[test]
    fn survival_decreasing() {
        let q1 = chisq_survival(1.0, 5.0);
        let q2 = chisq_survival(4.0, 5.0);
        assert!(q1 > q2);
    }

    #[test]
    fn inverse_round_trip() {
        for dof in [1.0, 2.0, 5.0, 17.0] {
            for p in [0.01, 0.1, 0.5, 0.9, 0.99] {
                let x = chisq_survival_inv(p, dof);
                assert!(
                    approx_eq(chisq_survival(x, dof), p, 1e-9),
                    "round trip failed at p={p}, dof={dof}"
                );
            }
        }
    }

    #[test]
    fn inverse_known_value() {
        // Median of chi-square with 1 dof: 0.45493642...
        let x = chisq_survival_inv(0.5, 1.0);
        assert!(approx_eq(x, 0.454_936_423_119_572, 1e-8));
    }

    #[test]
    fn inverse_edge_probabilities() {
        assert_eq!(chisq_survival_inv(1.0, 4.0), 0.0);
        assert_eq!(chisq_survival_inv(0.0, 4.0), f64::INFINITY);
        assert!(chisq_survival_inv(1.5, 4.0).is_nan());
    }
}
