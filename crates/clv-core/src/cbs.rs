//! Sufficient-statistics builder: active-period records to the compact
//! customer-by-sufficient-statistic (CBS) representation the estimators
//! consume.
//!
//! Per customer, relative to the first active period:
//! - `x`   = distinct active periods minus one (repeat-transaction periods),
//! - `t_x` = index of the last active period,
//! - `n_periods` = repeat opportunities through the end of the calibration
//!   window.
//!
//! The invariant `0 <= x <= t_x <= n_periods` is the contract boundary with
//! the estimators. A violation means the discretization upstream is buggy,
//! so construction rejects it outright instead of propagating corrupt rows.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::periods::{discretize, PeriodConfig};
use crate::types::{CustomerId, PeriodIndex, Transaction};

/// One customer's recency/frequency/opportunity triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CbsRow {
    pub customer_id: CustomerId,
    /// Repeat-transaction periods: distinct active periods minus one.
    pub x: u32,
    /// Last active period, relative to the customer's first.
    pub t_x: u32,
    /// Observation horizon in periods, relative to the customer's first.
    pub n_periods: u32,
}

impl CbsRow {
    /// Construct a row, enforcing `x <= t_x <= n_periods`.
    pub fn new(
        customer_id: impl Into<CustomerId>,
        x: u32,
        t_x: u32,
        n_periods: u32,
    ) -> Result<Self> {
        let row = Self {
            customer_id: customer_id.into(),
            x,
            t_x,
            n_periods,
        };
        row.validate()?;
        Ok(row)
    }

    /// Re-check the row invariant. Fit entry points call this so rows built
    /// by hand get the same rejection as builder output would.
    pub fn validate(&self) -> Result<()> {
        if self.x > self.t_x {
            return Err(Error::Validation {
                customer_id: self.customer_id.clone(),
                detail: format!("x = {} exceeds t_x = {}", self.x, self.t_x),
            });
        }
        if self.t_x > self.n_periods {
            return Err(Error::Validation {
                customer_id: self.customer_id.clone(),
                detail: format!(
                    "t_x = {} exceeds observation horizon n_periods = {}",
                    self.t_x, self.n_periods
                ),
            });
        }
        Ok(())
    }
}

/// One customer's spend summary: mean value per active period and the
/// number of active periods it averages over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendRow {
    pub customer_id: CustomerId,
    pub mean_value: f64,
    pub count: u32,
}

impl SpendRow {
    pub fn new(customer_id: impl Into<CustomerId>, mean_value: f64, count: u32) -> Result<Self> {
        let row = Self {
            customer_id: customer_id.into(),
            mean_value,
            count,
        };
        row.validate()?;
        Ok(row)
    }

    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(Error::Validation {
                customer_id: self.customer_id.clone(),
                detail: "spend row with zero transaction periods".into(),
            });
        }
        if !self.mean_value.is_finite() || self.mean_value <= 0.0 {
            return Err(Error::Validation {
                customer_id: self.customer_id.clone(),
                detail: format!("non-positive or non-finite mean value {}", self.mean_value),
            });
        }
        Ok(())
    }
}

/// Output of the statistics builder: the recency/frequency table and the
/// spend table, one row each per retained customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortStatistics {
    pub cbs: Vec<CbsRow>,
    pub spend: Vec<SpendRow>,
}

/// Build sufficient statistics for a cohort of raw transactions.
///
/// Discretizes, then reduces each customer's active periods to a `CbsRow`
/// and a `SpendRow`. Single-transaction customers are retained (x = 0);
/// they carry no repeat signal but the spend model needs them.
pub fn build_statistics(
    transactions: &[Transaction],
    config: &PeriodConfig,
) -> Result<CohortStatistics> {
    let (grid, customers) = discretize(transactions, config)?;

    let mut cbs = Vec::with_capacity(customers.len());
    let mut spend = Vec::with_capacity(customers.len());
    for customer in &customers {
        let first = customer.first();
        let last = customer.last();
        let x = u32::try_from(customer.active.len() - 1).map_err(|_| Error::Validation {
            customer_id: customer.customer_id.clone(),
            detail: "active period count out of range".into(),
        })?;
        cbs.push(CbsRow::new(
            customer.customer_id.clone(),
            x,
            last - first,
            horizon(grid.end_period, first, customer)?,
        )?);

        let count = x + 1;
        spend.push(SpendRow::new(
            customer.customer_id.clone(),
            customer.total_spend() / f64::from(count),
            count,
        )?);
    }

    Ok(CohortStatistics { cbs, spend })
}

fn horizon(
    end_period: PeriodIndex,
    first: PeriodIndex,
    customer: &crate::periods::CustomerPeriods,
) -> Result<PeriodIndex> {
    end_period.checked_sub(first).ok_or_else(|| Error::Validation {
        customer_id: customer.customer_id.clone(),
        detail: format!(
            "first active period {first} is past the observation end {end_period}"
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn day(d: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(d)
    }

    fn txn(id: &str, d: i64, amount: f64) -> Transaction {
        Transaction::new(id, day(d), amount)
    }

    #[test]
    fn active_periods_reduce_to_recency_frequency() {
        // Active periods {0, 2, 5} with the two period-2 transactions
        // merged, observed through period 6.
        let txns = vec![
            txn("a", 1, 10.0),
            txn("a", 15, 4.0),
            txn("a", 16, 6.0),
            txn("a", 36, 10.0),
        ];
        let config = PeriodConfig {
            calibration_end: Some(day(50)),
            ..PeriodConfig::default()
        };
        let stats = build_statistics(&txns, &config).unwrap();

        assert_eq!(stats.cbs.len(), 1);
        let row = &stats.cbs[0];
        assert_eq!((row.x, row.t_x, row.n_periods), (2, 5, 6));

        let spend = &stats.spend[0];
        assert_eq!(spend.count, 3);
        assert!((spend.mean_value - 10.0).abs() < 1e-12);
    }

    #[test]
    fn single_transaction_customer_has_zero_repeat_periods() {
        let txns = vec![txn("a", 0, 1.0), txn("b", 3, 25.0)];
        let stats = build_statistics(&txns, &PeriodConfig::default()).unwrap();

        let b = stats.cbs.iter().find(|r| r.customer_id == "b").unwrap();
        assert_eq!((b.x, b.t_x), (0, 0));
        let b_spend = stats.spend.iter().find(|r| r.customer_id == "b").unwrap();
        assert_eq!(b_spend.count, 1);
        assert!((b_spend.mean_value - 25.0).abs() < 1e-12);
    }

    #[test]
    fn later_cohort_entrants_get_shorter_horizons() {
        let txns = vec![txn("a", 0, 1.0), txn("b", 14, 1.0), txn("b", 28, 1.0)];
        let config = PeriodConfig {
            calibration_end: Some(day(42)),
            ..PeriodConfig::default()
        };
        let stats = build_statistics(&txns, &config).unwrap();

        let a = stats.cbs.iter().find(|r| r.customer_id == "a").unwrap();
        let b = stats.cbs.iter().find(|r| r.customer_id == "b").unwrap();
        assert_eq!(a.n_periods, 5);
        assert_eq!((b.x, b.t_x, b.n_periods), (1, 2, 3));
    }

    #[test]
    fn frequency_beyond_recency_is_rejected() {
        let err = CbsRow::new("bad", 4, 2, 8).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(err.to_string().contains("x = 4"));
    }

    #[test]
    fn recency_beyond_horizon_is_rejected() {
        assert!(CbsRow::new("bad", 1, 9, 6).is_err());
    }

    #[test]
    fn spend_row_rejects_zero_count_and_bad_means() {
        assert!(SpendRow::new("s", 10.0, 0).is_err());
        assert!(SpendRow::new("s", 0.0, 2).is_err());
        assert!(SpendRow::new("s", f64::NAN, 2).is_err());
        assert!(SpendRow::new("s", 10.0, 2).is_ok());
    }
}
