//! Stable log-domain primitives: log-sum-exp, log-gamma, log-beta.
//!
//! Conventions shared by every function here:
//! - NaN inputs propagate to NaN.
//! - Inputs outside a function's domain return NaN rather than panicking.
//! - `-inf` is the log of zero and is handled as an ordinary value.

use std::f64::consts::PI;

const HALF_LOG_TWO_PI: f64 = 0.918_938_533_204_672_8;

// Lanczos approximation, g = 7, 9 terms. Published coefficients.
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)]
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Stable `log(Σ exp(v))` over a slice.
///
/// Empty input and all-`-inf` input both return `-inf` (log of zero).
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        // Covers the empty slice (-inf), all-(-inf), and any +inf input.
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Stable `log(exp(a) + exp(b))`.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let hi = a.max(b);
    hi + (-(a - b).abs()).exp().ln_1p()
}

/// Natural log of `|Γ(z)|` via Lanczos, with reflection for `z < 0.5`.
///
/// Returns NaN at the poles (zero and the negative integers).
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z <= 0.0 && (z - z.round()).abs() < 1e-15 {
        return f64::NAN;
    }
    if z < 0.5 {
        // Reflection: Γ(z)Γ(1-z) = π / sin(πz).
        let sin_pi_z = (PI * z).sin();
        if sin_pi_z == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - sin_pi_z.abs().ln() - log_gamma(1.0 - z);
    }

    let w = z - 1.0;
    let mut series = LANCZOS[0];
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        series += c / (w + i as f64);
    }
    let t = w + LANCZOS_G + 0.5;
    HALF_LOG_TWO_PI + (w + 0.5) * t.ln() - t + series.ln()
}

/// `log B(a, b) = log Γ(a) + log Γ(b) - log Γ(a + b)`.
pub fn log_beta(a: f64, b: f64) -> f64 {
    log_gamma(a) + log_gamma(b) - log_gamma(a + b)
}

/// `log B(a_num, b_num) - log B(a_den, b_den)`.
///
/// The marginal likelihood of a Beta-mixed transaction history is a product
/// of such ratios, so this is the unit the model layer works in.
pub fn log_beta_ratio(a_num: f64, b_num: f64, a_den: f64, b_den: f64) -> f64 {
    log_beta(a_num, b_num) - log_beta(a_den, b_den)
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
    fn log_sum_exp_two_equal_terms() {
        assert!(approx_eq(log_sum_exp(&[0.0, 0.0]), 2.0f64.ln(), 1e-12));
    }

    #[test]
    fn log_sum_exp_extreme_spread_keeps_dominant_term() {
        assert!(approx_eq(log_sum_exp(&[-900.0, 0.0]), 0.0, 1e-12));
    }

    #[test]
    fn log_sum_exp_empty_is_log_zero() {
        let out = log_sum_exp(&[]);
        assert!(out.is_infinite() && out.is_sign_negative());
    }

    #[test]
    fn log_sum_exp_propagates_nan() {
        assert!(log_sum_exp(&[1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn log_add_exp_agrees_with_slice_form() {
        let a = 0.37;
        let b = -2.11;
        assert!(approx_eq(log_add_exp(a, b), log_sum_exp(&[a, b]), 1e-12));
    }

    #[test]
    fn log_add_exp_neg_inf_is_identity() {
        assert!(approx_eq(log_add_exp(f64::NEG_INFINITY, 1.5), 1.5, 1e-12));
    }

    #[test]
    fn log_gamma_known_values() {
        assert!(approx_eq(log_gamma(1.0), 0.0, 1e-12));
        assert!(approx_eq(log_gamma(2.0), 0.0, 1e-12));
        assert!(approx_eq(log_gamma(5.0), 24.0f64.ln(), 1e-10));
        assert!(approx_eq(log_gamma(0.5), 0.5 * PI.ln(), 1e-10));
    }

    #[test]
    fn log_gamma_poles_are_nan() {
        assert!(log_gamma(0.0).is_nan());
        assert!(log_gamma(-3.0).is_nan());
    }

    #[test]
    fn log_beta_uniform_is_zero() {
        assert!(approx_eq(log_beta(1.0, 1.0), 0.0, 1e-12));
    }

    #[test]
    fn log_beta_known_value() {
        // B(2, 3) = 1/12.
        assert!(approx_eq(log_beta(2.0, 3.0), (1.0f64 / 12.0).ln(), 1e-10));
    }

    #[test]
    fn log_beta_ratio_matches_difference() {
        let r = log_beta_ratio(3.5, 2.0, 1.5, 1.0);
        let expected = log_beta(3.5, 2.0) - log_beta(1.5, 1.0);
        assert!(approx_eq(r, expected, 1e-12));
    }
}
