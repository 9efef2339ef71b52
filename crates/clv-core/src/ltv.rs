//! Residual-lifetime-value composer: joins the transaction model's
//! forecasts with the spend model's conditional expectations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bgbb::BgbbParams;
use crate::cbs::{CbsRow, SpendRow};
use crate::error::Result;
use crate::forecast::{dert, p_alive};
use crate::spend::{expected_spend, SpendParams};
use crate::types::CustomerId;

/// Per-customer model output. Pure derivation from the sufficient
/// statistics and fitted parameters; recomputed whenever either changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerValue {
    pub customer_id: CustomerId,
    pub p_alive: f64,
    pub dert: f64,
    pub expected_spend: f64,
    /// Residual lifetime value: `dert * expected_spend`.
    pub ltv: f64,
}

/// Score every customer in the cohort.
///
/// Spend rows are joined by customer id; a customer without one is scored
/// at the population mean value (count zero, full shrinkage). Evaluations
/// are independent per customer and merged by concatenation, so the output
/// order is the CBS row order.
pub fn compute_ltv(
    cbs: &[CbsRow],
    bgbb_params: &BgbbParams,
    spend_rows: &[SpendRow],
    spend_params: &SpendParams,
    discount_rate: f64,
) -> Result<Vec<CustomerValue>> {
    let spend_by_customer: HashMap<&str, &SpendRow> = spend_rows
        .iter()
        .map(|row| (row.customer_id.as_str(), row))
        .collect();

    let mut values = Vec::with_capacity(cbs.len());
    for row in cbs {
        row.validate()?;
        let alive = p_alive(bgbb_params, row.x, row.t_x, row.n_periods)?;
        let residual = dert(bgbb_params, row.x, row.t_x, row.n_periods, discount_rate)?;
        let spend = match spend_by_customer.get(row.customer_id.as_str()) {
            Some(s) => expected_spend(spend_params, s.mean_value, s.count)?,
            None => expected_spend(spend_params, 1.0, 0)?,
        };
        values.push(CustomerValue {
            customer_id: row.customer_id.clone(),
            p_alive: alive,
            dert: residual,
            expected_spend: spend,
            ltv: residual * spend,
        });
    }

    debug!(
        customers = values.len(),
        discount_rate, "cohort scored"
    );
    Ok(values)
}

/// Expected residual value of a hypothetical brand-new customer: the
/// `(0, 0, 0)` transaction expectation times the population mean spend.
/// Used as an acquisition-spend benchmark.
pub fn new_customer_value(
    bgbb_params: &BgbbParams,
    spend_params: &SpendParams,
    discount_rate: f64,
) -> Result<f64> {
    let residual = dert(bgbb_params, 0, 0, 0, discount_rate)?;
    let spend = spend_params.population_mean_value()?;
    Ok(residual * spend)
}
