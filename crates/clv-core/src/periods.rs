//! Period discretizer: raw timestamped transactions to discrete,
//! population-aligned period indices.
//!
//! The origin is the minimum timestamp across the whole population (unless
//! the caller pins one), so period indices are globally aligned rather than
//! per-customer. Several transactions by one customer inside one period
//! merge into a single active period with their amounts summed.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{CustomerId, PeriodIndex, Transaction};

/// Discretization settings. Explicit value object handed from the caller to
/// `discretize`; stages never share hidden state.
#[derive(Debug, Clone)]
pub struct PeriodConfig {
    /// Length of one observation period.
    pub period: Duration,
    /// Population-wide origin. Defaults to the earliest transaction.
    pub origin: Option<DateTime<Utc>>,
    /// End of the calibration window, exclusive. Transactions at or after
    /// this instant are dropped. Defaults to observing everything.
    pub calibration_end: Option<DateTime<Utc>>,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            period: Duration::days(7),
            origin: None,
            calibration_end: None,
        }
    }
}

/// The resolved discretization grid: what `discretize` actually used once
/// defaults were filled in from the data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodGrid {
    pub origin: DateTime<Utc>,
    pub period: Duration,
    /// Index of the last observable period in the calibration window.
    pub end_period: PeriodIndex,
}

/// One customer's active periods within the calibration window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPeriods {
    pub customer_id: CustomerId,
    /// Distinct period indices with at least one transaction, ascending.
    pub active: Vec<PeriodIndex>,
    /// Spend summed per active period, parallel to `active`.
    pub spend: Vec<f64>,
}

impl CustomerPeriods {
    /// First active period (the customer's trial period).
    pub fn first(&self) -> PeriodIndex {
        self.active.first().copied().unwrap_or(0)
    }

    /// Most recent active period.
    pub fn last(&self) -> PeriodIndex {
        self.active.last().copied().unwrap_or(0)
    }

    /// Total calibration-window spend.
    pub fn total_spend(&self) -> f64 {
        self.spend.iter().sum()
    }
}

/// Convert raw transactions into per-customer active-period records.
///
/// Returns the resolved grid alongside the records; the statistics builder
/// needs `end_period` to size each customer's observation horizon.
///
/// Fails with a validation error on a non-positive period length, a
/// calibration end at or before the origin, a transaction preceding a
/// caller-pinned origin, or a non-finite/non-positive amount.
pub fn discretize(
    transactions: &[Transaction],
    config: &PeriodConfig,
) -> Result<(PeriodGrid, Vec<CustomerPeriods>)> {
    let period_ms = config.period.num_milliseconds();
    if period_ms <= 0 {
        return Err(Error::InvalidInput(format!(
            "period length must be positive, got {period_ms} ms"
        )));
    }
    if transactions.is_empty() {
        return Err(Error::InsufficientData(
            "no transactions to discretize".into(),
        ));
    }

    for txn in transactions {
        if !txn.amount.is_finite() || txn.amount <= 0.0 {
            return Err(Error::Validation {
                customer_id: txn.customer_id.clone(),
                detail: format!("non-positive or non-finite amount {}", txn.amount),
            });
        }
    }

    let earliest = transactions
        .iter()
        .map(|t| t.at)
        .min()
        .ok_or_else(|| Error::InsufficientData("no transactions to discretize".into()))?;
    let origin = config.origin.unwrap_or(earliest);
    if earliest < origin {
        return Err(Error::InvalidInput(format!(
            "transaction at {earliest} precedes configured origin {origin}"
        )));
    }

    if let Some(end) = config.calibration_end {
        if end <= origin {
            return Err(Error::InvalidInput(format!(
                "calibration end {end} is not after origin {origin}"
            )));
        }
    }

    // Group and merge: customer -> period -> summed spend. BTreeMaps keep
    // the output deterministic regardless of input order.
    let mut by_customer: BTreeMap<&str, BTreeMap<PeriodIndex, f64>> = BTreeMap::new();
    let mut observed_max: PeriodIndex = 0;
    for txn in transactions {
        if let Some(end) = config.calibration_end {
            if txn.at >= end {
                continue;
            }
        }
        let idx = period_index(txn.at, origin, period_ms)?;
        observed_max = observed_max.max(idx);
        *by_customer
            .entry(txn.customer_id.as_str())
            .or_default()
            .entry(idx)
            .or_insert(0.0) += txn.amount;
    }

    if by_customer.is_empty() {
        return Err(Error::InsufficientData(
            "calibration window excludes every transaction".into(),
        ));
    }

    let end_period = match config.calibration_end {
        // Last period containing any observable instant before the cutoff.
        Some(end) => {
            let span_ms = (end - origin).num_milliseconds() - 1;
            index_from_offset(span_ms / period_ms)?
        }
        None => observed_max,
    };

    let customers = by_customer
        .into_iter()
        .map(|(id, periods)| {
            let (active, spend): (Vec<_>, Vec<_>) = periods.into_iter().unzip();
            CustomerPeriods {
                customer_id: id.to_owned(),
                active,
                spend,
            }
        })
        .collect();

    let grid = PeriodGrid {
        origin,
        period: config.period,
        end_period,
    };
    Ok((grid, customers))
}

fn period_index(at: DateTime<Utc>, origin: DateTime<Utc>, period_ms: i64) -> Result<PeriodIndex> {
    let offset_ms = (at - origin).num_milliseconds();
    index_from_offset(offset_ms / period_ms)
}

fn index_from_offset(index: i64) -> Result<PeriodIndex> {
    PeriodIndex::try_from(index)
        .map_err(|_| Error::InvalidInput(format!("period index {index} out of range")))
}
