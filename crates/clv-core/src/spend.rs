//! Gamma-Gamma monetary value model.
//!
//! Per-transaction value is Gamma(p, ν) with the customer-level scale ν
//! itself Gamma(q, γ) across the population. Only each customer's mean
//! observed value and transaction-period count enter the likelihood; the
//! sufficient-statistic form is exact, never an approximation over raw
//! transactions:
//!
//! ```text
//! ln L(p,q,γ | m̄,c) = lnΓ(pc+q) − lnΓ(pc) − lnΓ(q)
//!                    + q·lnγ + (pc−1)·ln m̄ + pc·ln c − (pc+q)·ln(γ + c·m̄)
//! ```
//!
//! The conditional expectation shrinks each customer's observed mean toward
//! the population mean `pγ/(q−1)`, with weight growing in the count.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use clv_math::log_gamma;

use crate::cbs::SpendRow;
use crate::error::{Error, Result};
use crate::optim::{minimize, SimplexOptions, SimplexOutcome};

/// Relative spread of observed means below which a cohort is treated as
/// having zero monetary heterogeneity.
const ZERO_VARIANCE_TOL: f64 = 1e-12;

/// Fitted Gamma-Gamma shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpendParams {
    /// Within-customer shape of per-transaction value.
    pub p: f64,
    /// Across-customer shape of the scale mixture.
    pub q: f64,
    /// Across-customer rate of the scale mixture.
    pub gamma: f64,
}

impl SpendParams {
    pub fn new(p: f64, q: f64, gamma: f64) -> Result<Self> {
        let params = Self { p, q, gamma };
        params.validate()?;
        Ok(params)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [("p", self.p), ("q", self.q), ("gamma", self.gamma)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Domain {
                    parameter: name,
                    value,
                    constraint: "all shape parameters must be positive and finite",
                });
            }
        }
        Ok(())
    }

    /// Population mean per-transaction value `pγ/(q−1)`.
    ///
    /// Only defined for q > 1; a fit landing at q <= 1 has infinite mean
    /// spend and must be surfaced, not papered over.
    pub fn population_mean_value(&self) -> Result<f64> {
        self.validate()?;
        if self.q <= 1.0 {
            return Err(Error::Domain {
                parameter: "q",
                value: self.q,
                constraint: "q > 1 required for a finite population mean",
            });
        }
        Ok(self.p * self.gamma / (self.q - 1.0))
    }
}

/// Aggregate log-likelihood of the spend rows under `params`.
pub fn log_likelihood(params: &SpendParams, rows: &[SpendRow]) -> f64 {
    rows.iter()
        .map(|row| row_log_likelihood(params, row.mean_value, row.count))
        .sum()
}

fn row_log_likelihood(params: &SpendParams, mean_value: f64, count: u32) -> f64 {
    let pc = params.p * f64::from(count);
    let cf = f64::from(count);
    log_gamma(pc + params.q) - log_gamma(pc) - log_gamma(params.q)
        + params.q * params.gamma.ln()
        + (pc - 1.0) * mean_value.ln()
        + pc * cf.ln()
        - (pc + params.q) * (params.gamma + cf * mean_value).ln()
}

/// Diagnostics attached to a spend fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendFitDiagnostics {
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Set when the cohort's observed means carry no variance and the
    /// population mean was pinned to the common value.
    pub degenerate: bool,
    /// Fitted population mean per-transaction value.
    pub population_mean_value: f64,
    /// Customers with a single transaction period; they contribute weak
    /// likelihood signal and shrink almost fully toward the population mean.
    pub singleton_count: usize,
}

/// Fit the Gamma-Gamma parameters by maximum likelihood with default search
/// options.
pub fn fit_spend(rows: &[SpendRow]) -> Result<(SpendParams, SpendFitDiagnostics)> {
    fit_spend_with(rows, &SimplexOptions::default())
}

/// Fit with caller-controlled search options.
///
/// A cohort whose observed means are all identical is degenerate: the
/// likelihood prefers an unbounded q, so the estimator pins the population
/// mean to the common observed mean, flags the fit, and skips the search.
/// A search landing at q <= 1 is a domain error, not a usable fit.
pub fn fit_spend_with(
    rows: &[SpendRow],
    options: &SimplexOptions,
) -> Result<(SpendParams, SpendFitDiagnostics)> {
    if rows.is_empty() {
        return Err(Error::InsufficientData(
            "empty cohort for spend fit".into(),
        ));
    }
    for row in rows {
        row.validate()?;
    }

    let singleton_count = rows.iter().filter(|r| r.count == 1).count();

    let min_mean = rows.iter().map(|r| r.mean_value).fold(f64::INFINITY, f64::min);
    let max_mean = rows
        .iter()
        .map(|r| r.mean_value)
        .fold(f64::NEG_INFINITY, f64::max);
    if (max_mean - min_mean) <= ZERO_VARIANCE_TOL * max_mean {
        let common = rows[0].mean_value;
        // q = 2 with γ = m̄/p makes the population mean exactly the common
        // observed mean and keeps every conditional expectation there too.
        let params = SpendParams::new(1.0, 2.0, common)?;
        warn!(
            cohort = rows.len(),
            mean_value = common,
            "zero variance in observed means; pinning population mean to the common value"
        );
        let diagnostics = SpendFitDiagnostics {
            log_likelihood: log_likelihood(&params, rows),
            iterations: 0,
            converged: true,
            degenerate: true,
            population_mean_value: common,
            singleton_count,
        };
        return Ok((params, diagnostics));
    }

    let objective = |log_params: &[f64]| -> f64 {
        let params = match params_from_log(log_params) {
            Some(p) => p,
            None => return f64::INFINITY,
        };
        -log_likelihood(&params, rows)
    };

    let outcome = minimize(objective, &[0.0; 3], options)?;
    let achieved = -outcome.value;
    if !outcome.converged || !achieved.is_finite() {
        return Err(convergence_failure(&outcome));
    }
    let params = params_from_log(&outcome.x).ok_or_else(|| convergence_failure(&outcome))?;

    // Surfaces the q <= 1 case as a domain error with the offending value.
    let population_mean_value = params.population_mean_value()?;
    debug!(
        p = params.p,
        q = params.q,
        gamma = params.gamma,
        population_mean_value,
        log_likelihood = achieved,
        iterations = outcome.iterations,
        "gamma-gamma fit converged"
    );

    Ok((
        params,
        SpendFitDiagnostics {
            log_likelihood: achieved,
            iterations: outcome.iterations,
            converged: outcome.converged,
            degenerate: false,
            population_mean_value,
            singleton_count,
        },
    ))
}

/// Expected per-transaction value for a customer with observed mean
/// `mean_value` over `count` transaction periods.
///
/// The weight `pc/(pc+q−1)` moves from zero (no history, population mean)
/// toward one as the count grows. `count = 0` is allowed and yields the
/// population mean, which is how customers without a spend row are scored.
pub fn expected_spend(params: &SpendParams, mean_value: f64, count: u32) -> Result<f64> {
    let population = params.population_mean_value()?;
    if count == 0 {
        return Ok(population);
    }
    if !mean_value.is_finite() || mean_value <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "observed mean value must be positive and finite, got {mean_value}"
        )));
    }

    let pc = params.p * f64::from(count);
    let weight = pc / (pc + params.q - 1.0);
    Ok(weight * mean_value + (1.0 - weight) * population)
}

fn params_from_log(log_params: &[f64]) -> Option<SpendParams> {
    let [lp, lq, lg] = log_params else {
        return None;
    };
    SpendParams::new(lp.exp(), lq.exp(), lg.exp()).ok()
}

fn convergence_failure(outcome: &SimplexOutcome) -> Error {
    Error::Convergence {
        model: "gamma-gamma",
        iterations: outcome.iterations,
        last_value: -outcome.value,
    }
}
