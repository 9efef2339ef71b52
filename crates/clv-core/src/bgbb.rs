//! Beta-Geometric / Beta-Binomial transaction model.
//!
//! Each period, an alive customer transacts with probability θ drawn once
//! per customer from `Beta(alpha, beta)`; after every period survived, the
//! customer dies with probability p drawn once from `Beta(gamma, delta)`.
//! Marginalizing both mixing distributions gives a per-customer likelihood
//! for the sufficient triple `(x, t_x, n)`: one still-alive component plus
//! one component per possible death period in `[t_x, n)`:
//!
//! ```text
//! L(x, t_x, n) = B(α+x, β+n−x)/B(α,β) · B(γ, δ+n)/B(γ,δ)
//!              + Σ_{i=t_x}^{n−1} B(α+x, β+i−x)/B(α,β) · B(γ+1, δ+i)/B(γ,δ)
//! ```
//!
//! Components differ by hundreds of log units across a cohort, so they are
//! combined with log-sum-exp, never in probability space.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use clv_math::{beta_mean, log_beta_ratio, log_sum_exp};

use crate::cbs::CbsRow;
use crate::error::{Error, Result};
use crate::optim::{minimize, SimplexOptions, SimplexOutcome};
use crate::types::CustomerId;

/// Fitted shape parameters of the transaction/dropout mixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BgbbParams {
    /// Transaction-probability mixture: θ ~ Beta(alpha, beta).
    pub alpha: f64,
    pub beta: f64,
    /// Dropout-probability mixture: p ~ Beta(gamma, delta).
    pub gamma: f64,
    pub delta: f64,
}

impl BgbbParams {
    pub fn new(alpha: f64, beta: f64, gamma: f64, delta: f64) -> Result<Self> {
        let params = Self {
            alpha,
            beta,
            gamma,
            delta,
        };
        params.validate()?;
        Ok(params)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("delta", self.delta),
        ] {
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

    /// Population mean per-period transaction probability E[θ].
    pub fn mean_transaction_probability(&self) -> f64 {
        beta_mean(self.alpha, self.beta)
    }

    /// Population mean per-period dropout probability E[p].
    pub fn mean_dropout_probability(&self) -> f64 {
        beta_mean(self.gamma, self.delta)
    }
}

/// Log-space split of one customer's marginal likelihood: the still-alive
/// component and the total. The forecast layer needs both.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LogMarginal {
    pub alive: f64,
    pub total: f64,
}

/// Evaluate the marginal likelihood components for one `(x, t_x, n)` triple.
///
/// Caller guarantees `x <= t_x <= n` and valid params; this is the hot loop
/// of the fit.
pub(crate) fn log_marginal(params: &BgbbParams, x: u32, t_x: u32, n: u32) -> LogMarginal {
    let xf = f64::from(x);
    let alive = log_beta_ratio(
        params.alpha + xf,
        params.beta + f64::from(n) - xf,
        params.alpha,
        params.beta,
    ) + log_beta_ratio(params.gamma, params.delta + f64::from(n), params.gamma, params.delta);

    let mut components = Vec::with_capacity((n - t_x + 1) as usize);
    components.push(alive);
    for i in t_x..n {
        let ifl = f64::from(i);
        components.push(
            log_beta_ratio(params.alpha + xf, params.beta + ifl - xf, params.alpha, params.beta)
                + log_beta_ratio(
                    params.gamma + 1.0,
                    params.delta + ifl,
                    params.gamma,
                    params.delta,
                ),
        );
    }

    LogMarginal {
        alive,
        total: log_sum_exp(&components),
    }
}

/// Aggregate log-likelihood of a cohort under `params`.
///
/// Rows sharing a `(x, t_x, n)` pattern contribute identical terms, so the
/// cohort is collapsed to weighted unique patterns first; retail cohorts
/// collapse by an order of magnitude or more.
pub fn log_likelihood(params: &BgbbParams, rows: &[CbsRow]) -> f64 {
    let mut sum = 0.0;
    for (&(x, t_x, n), &weight) in &collapse(rows) {
        sum += weight * log_marginal(params, x, t_x, n).total;
    }
    sum
}

fn collapse(rows: &[CbsRow]) -> HashMap<(u32, u32, u32), f64> {
    let mut patterns: HashMap<(u32, u32, u32), f64> = HashMap::new();
    for row in rows {
        *patterns.entry((row.x, row.t_x, row.n_periods)).or_insert(0.0) += 1.0;
    }
    patterns
}

/// Diagnostics attached to a successful fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgbbFitDiagnostics {
    /// Achieved aggregate log-likelihood, for comparing discretizations.
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Customers with no repeat activity (x = 0).
    pub zero_repeat_customers: Vec<CustomerId>,
    /// Customers active in every observable period (x = n_periods).
    pub saturated_customers: Vec<CustomerId>,
    /// Set when one of the extreme classes covers the whole cohort; the
    /// likelihood carries no heterogeneity signal and the parameters sit on
    /// a boundary ridge.
    pub degenerate: bool,
}

/// Fit the four shape parameters by maximum likelihood with default search
/// options.
pub fn fit_bgbb(rows: &[CbsRow]) -> Result<(BgbbParams, BgbbFitDiagnostics)> {
    fit_bgbb_with(rows, &SimplexOptions::default())
}

/// Fit with caller-controlled search options.
///
/// The search runs over the log of the parameters, so positivity is
/// structural rather than a constraint; all four start at 1.0. Non-finite
/// likelihood at the optimum or an exhausted iteration budget surfaces as a
/// convergence error carrying the last objective value, never as a silent
/// partial parameter set.
pub fn fit_bgbb_with(
    rows: &[CbsRow],
    options: &SimplexOptions,
) -> Result<(BgbbParams, BgbbFitDiagnostics)> {
    if rows.is_empty() {
        return Err(Error::InsufficientData("empty cohort for BG/BB fit".into()));
    }
    for row in rows {
        row.validate()?;
    }

    let zero_repeat: Vec<CustomerId> = rows
        .iter()
        .filter(|r| r.x == 0)
        .map(|r| r.customer_id.clone())
        .collect();
    let saturated: Vec<CustomerId> = rows
        .iter()
        .filter(|r| r.x > 0 && r.x == r.n_periods)
        .map(|r| r.customer_id.clone())
        .collect();
    let degenerate =
        zero_repeat.len() == rows.len() || (!saturated.is_empty() && saturated.len() == rows.len());
    if degenerate {
        warn!(
            cohort = rows.len(),
            zero_repeat = zero_repeat.len(),
            saturated = saturated.len(),
            "cohort has no heterogeneity in repeat activity; fit may sit on a boundary"
        );
    }

    let patterns = collapse(rows);
    let objective = |log_params: &[f64]| -> f64 {
        let params = match params_from_log(log_params) {
            Some(p) => p,
            None => return f64::INFINITY,
        };
        let mut nll = 0.0;
        for (&(x, t_x, n), &weight) in &patterns {
            nll -= weight * log_marginal(&params, x, t_x, n).total;
        }
        nll
    };

    let outcome = minimize(objective, &[0.0; 4], options)?;
    let achieved = -outcome.value;
    if !outcome.converged || !achieved.is_finite() {
        return Err(convergence_failure("bg/bb", &outcome));
    }

    let params = params_from_log(&outcome.x).ok_or_else(|| convergence_failure("bg/bb", &outcome))?;
    debug!(
        alpha = params.alpha,
        beta = params.beta,
        gamma = params.gamma,
        delta = params.delta,
        log_likelihood = achieved,
        iterations = outcome.iterations,
        "bg/bb fit converged"
    );

    Ok((
        params,
        BgbbFitDiagnostics {
            log_likelihood: achieved,
            iterations: outcome.iterations,
            converged: outcome.converged,
            zero_repeat_customers: zero_repeat,
            saturated_customers: saturated,
            degenerate,
        },
    ))
}

fn params_from_log(log_params: &[f64]) -> Option<BgbbParams> {
    let [la, lb, lg, ld] = log_params else {
        return None;
    };
    BgbbParams::new(la.exp(), lb.exp(), lg.exp(), ld.exp()).ok()
}

fn convergence_failure(model: &'static str, outcome: &SimplexOutcome) -> Error {
    Error::Convergence {
        model,
        iterations: outcome.iterations,
        last_value: -outcome.value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BgbbParams {
        // Published estimates from the discrete-time donation study.
        BgbbParams::new(1.204, 0.750, 0.657, 2.783).unwrap()
    }

    fn row(id: &str, x: u32, t_x: u32, n: u32) -> CbsRow {
        CbsRow::new(id, x, t_x, n).unwrap()
    }

    #[test]
    fn params_reject_non_positive_shapes() {
        assert!(BgbbParams::new(0.0, 1.0, 1.0, 1.0).is_err());
        assert!(BgbbParams::new(1.0, 1.0, -2.0, 1.0).is_err());
        assert!(BgbbParams::new(1.0, f64::NAN, 1.0, 1.0).is_err());
    }

    #[test]
    fn mixture_means_are_beta_means() {
        let p = params();
        assert!((p.mean_transaction_probability() - 1.204 / (1.204 + 0.750)).abs() < 1e-12);
        assert!((p.mean_dropout_probability() - 0.657 / (0.657 + 2.783)).abs() < 1e-12);
    }

    #[test]
    fn alive_component_never_exceeds_total() {
        let p = params();
        for (x, t_x, n) in [(0, 0, 0), (0, 0, 10), (2, 5, 10), (10, 10, 10)] {
            let lm = log_marginal(&p, x, t_x, n);
            assert!(lm.alive <= lm.total + 1e-12, "({x},{t_x},{n})");
            assert!(lm.total.is_finite());
        }
    }

    #[test]
    fn empty_history_has_unit_likelihood() {
        let lm = log_marginal(&params(), 0, 0, 0);
        assert!(lm.total.abs() < 1e-12);
        assert!(lm.alive.abs() < 1e-12);
    }

    #[test]
    fn log_likelihood_is_weighted_sum_over_patterns() {
        let p = params();
        let rows = vec![
            row("a", 2, 5, 10),
            row("b", 2, 5, 10),
            row("c", 0, 0, 10),
        ];
        let expected = 2.0 * log_marginal(&p, 2, 5, 10).total + log_marginal(&p, 0, 0, 10).total;
        assert!((log_likelihood(&p, &rows) - expected).abs() < 1e-10);
    }

    #[test]
    fn likelihood_is_negative_for_informative_histories() {
        // Any non-trivial history has probability below one.
        let p = params();
        assert!(log_marginal(&p, 3, 8, 12).total < 0.0);
    }

    #[test]
    fn fit_rejects_empty_cohort() {
        assert!(matches!(
            fit_bgbb(&[]),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn fit_rejects_corrupt_rows() {
        let bad = CbsRow {
            customer_id: "bad".into(),
            x: 6,
            t_x: 2,
            n_periods: 8,
        };
        assert!(matches!(
            fit_bgbb(&[bad]),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn fit_recovers_plausible_parameters_from_mixed_cohort() {
        // A cohort with genuine heterogeneity: loyal, lapsed, and one-shot
        // customers over a 12-period window.
        let mut rows = Vec::new();
        for i in 0..30 {
            rows.push(row(&format!("loyal-{i}"), 9, 11, 12));
        }
        for i in 0..40 {
            rows.push(row(&format!("lapsed-{i}"), 3, 4, 12));
        }
        for i in 0..30 {
            rows.push(row(&format!("oneshot-{i}"), 0, 0, 12));
        }

        let (params, diag) = fit_bgbb(&rows).unwrap();
        assert!(diag.converged);
        assert!(!diag.degenerate);
        assert_eq!(diag.zero_repeat_customers.len(), 30);
        assert!(diag.log_likelihood.is_finite());

        // The fitted mixture must reproduce the data better than the
        // uniform start point.
        let start = BgbbParams::new(1.0, 1.0, 1.0, 1.0).unwrap();
        assert!(log_likelihood(&params, &rows) >= log_likelihood(&start, &rows));
    }

    #[test]
    fn zero_variance_cohort_is_flagged_degenerate() {
        let rows: Vec<CbsRow> = (0..50).map(|i| row(&format!("c{i}"), 0, 0, 10)).collect();
        match fit_bgbb(&rows) {
            Ok((_, diag)) => assert!(diag.degenerate),
            Err(Error::Convergence { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
