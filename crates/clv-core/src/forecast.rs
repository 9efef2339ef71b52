//! Per-customer forecasts from fitted model parameters: probability of
//! being alive, discounted expected residual transactions, and the cohort
//! transaction curve.
//!
//! Everything here is a pure function of `(params, x, t_x, n)`; evaluations
//! are independent across customers and may be run in any order or in
//! parallel by the caller.

use tracing::warn;

use clv_math::{beta_mean, log_beta_ratio};

use crate::bgbb::{log_marginal, BgbbParams};
use crate::error::{Error, Result};

/// Relative tail tolerance at which the residual-transaction series stops.
const DERT_REL_TOL: f64 = 1e-12;

/// Hard horizon cap for the series. At discount rate zero with a
/// heavy-tailed dropout mixture (gamma <= 1) the untruncated sum diverges;
/// the cap keeps that case finite without disturbing monotonicity.
const DERT_MAX_HORIZON: u32 = 10_000;

/// Probability that a customer with history `(x, t_x, n)` is still alive:
/// the still-alive likelihood component over the total marginal likelihood,
/// evaluated entirely in log space.
///
/// Exactly 1.0 when `t_x == n` (no silent periods, so no death component),
/// including the degenerate brand-new customer `(0, 0, 0)`.
pub fn p_alive(params: &BgbbParams, x: u32, t_x: u32, n: u32) -> Result<f64> {
    params.validate()?;
    validate_triple(x, t_x, n)?;

    let lm = log_marginal(params, x, t_x, n);
    Ok((lm.alive - lm.total).exp())
}

/// Discounted expected residual transactions for a customer with history
/// `(x, t_x, n)`, under a continuous per-period discount factor
/// `exp(-rate * s)`.
///
/// The series over future periods is evaluated with an O(1)-per-term
/// recurrence (consecutive Beta-function ratios telescope) and truncated
/// once a term drops below `1e-12` of the running sum, or at the horizon
/// cap. Accepts `(0, 0, 0)` and returns the newly-acquired-customer
/// expectation.
pub fn dert(params: &BgbbParams, x: u32, t_x: u32, n: u32, discount_rate: f64) -> Result<f64> {
    params.validate()?;
    validate_triple(x, t_x, n)?;
    if !discount_rate.is_finite() || discount_rate < 0.0 {
        return Err(Error::InvalidInput(format!(
            "discount rate must be finite and non-negative, got {discount_rate}"
        )));
    }

    let xf = f64::from(x);
    let nf = f64::from(n);
    let lm = log_marginal(params, x, t_x, n);

    // First future period: E[θ^(x+1)(1-θ)^(n-x)] E[(1-p)^(n+1)] / L.
    let log_first = log_beta_ratio(
        params.alpha + xf + 1.0,
        params.beta + nf - xf,
        params.alpha,
        params.beta,
    ) + log_beta_ratio(
        params.gamma,
        params.delta + nf + 1.0,
        params.gamma,
        params.delta,
    ) - discount_rate
        - lm.total;

    // Sum the tail relative to the first term; successive terms shrink by
    // exp(-rate) * (δ+n+s) / (γ+δ+n+s).
    let damp = (-discount_rate).exp();
    let mut scaled_term = 1.0;
    let mut scaled_sum = 1.0;
    let mut s: u32 = 1;
    while s < DERT_MAX_HORIZON {
        let tail = params.delta + nf + f64::from(s);
        scaled_term *= damp * tail / (params.gamma + tail);
        scaled_sum += scaled_term;
        s += 1;
        if scaled_term < DERT_REL_TOL * scaled_sum {
            break;
        }
    }
    if s >= DERT_MAX_HORIZON {
        warn!(
            x,
            t_x,
            n,
            discount_rate,
            "residual-transaction series truncated at the horizon cap"
        );
    }

    Ok(log_first.exp() * scaled_sum)
}

/// Expected cumulative transactions over the first `n_periods` periods of a
/// newly acquired customer, by direct summation of
/// `E[θ] · B(γ, δ+t)/B(γ, δ)` over `t = 1..=n_periods`.
///
/// External collaborators plot this against actual cumulative counts to
/// judge a discretization choice.
pub fn expected_cohort_transactions(params: &BgbbParams, n_periods: u32) -> Result<f64> {
    params.validate()?;

    let mean_theta = beta_mean(params.alpha, params.beta);
    let mut log_survival = 0.0;
    let mut sum = 0.0;
    for t in 1..=n_periods {
        let tf = f64::from(t);
        log_survival +=
            ((params.delta + tf - 1.0) / (params.gamma + params.delta + tf - 1.0)).ln();
        sum += log_survival.exp();
    }
    Ok(mean_theta * sum)
}

fn validate_triple(x: u32, t_x: u32, n: u32) -> Result<()> {
    if x > t_x || t_x > n {
        return Err(Error::InvalidInput(format!(
            "invalid history triple: x = {x}, t_x = {t_x}, n = {n}"
        )));
    }
    Ok(())
}
