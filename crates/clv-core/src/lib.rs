//! Customer-lifetime-value and churn-risk model engine.
//!
//! Turns a log of per-customer transaction events into per-customer
//! survival and value forecasts, in four stages of immutable value objects:
//!
//! 1. [`periods`] discretizes raw timestamps into population-aligned
//!    periods, merging same-period transactions.
//! 2. [`cbs`] reduces each customer to the sufficient triple
//!    `(x, t_x, n_periods)` plus a spend summary, rejecting any triple that
//!    violates `x <= t_x <= n_periods`.
//! 3. [`bgbb`] and [`spend`] fit the Beta-Geometric/Beta-Binomial
//!    transaction model and the Gamma-Gamma monetary model by maximum
//!    likelihood over the [`optim`] simplex search.
//! 4. [`forecast`] and [`ltv`] evaluate per-customer probability-of-alive,
//!    discounted expected residual transactions, conditional spend, and
//!    their product.
//!
//! The engine performs no I/O: loading tabular data, plotting, reporting
//! and segmentation all live with callers that consume these outputs.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use clv_core::{build_statistics, p_alive, BgbbParams, PeriodConfig, Transaction};
//!
//! let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let transactions = vec![
//!     Transaction::new("c1", origin, 12.0),
//!     Transaction::new("c1", origin + Duration::days(15), 8.0),
//!     Transaction::new("c2", origin + Duration::days(2), 30.0),
//! ];
//! let stats = build_statistics(&transactions, &PeriodConfig::default()).unwrap();
//! assert_eq!(stats.cbs.len(), 2);
//!
//! let params = BgbbParams::new(1.2, 0.75, 0.66, 2.78).unwrap();
//! let row = &stats.cbs[0];
//! let alive = p_alive(&params, row.x, row.t_x, row.n_periods).unwrap();
//! assert!((0.0..=1.0).contains(&alive));
//! ```

pub mod bgbb;
pub mod cbs;
pub mod error;
pub mod forecast;
pub mod ltv;
pub mod optim;
pub mod periods;
pub mod spend;
pub mod types;

pub use bgbb::{fit_bgbb, fit_bgbb_with, BgbbFitDiagnostics, BgbbParams};
pub use cbs::{build_statistics, CbsRow, CohortStatistics, SpendRow};
pub use error::{Error, ErrorCategory, Result};
pub use forecast::{dert, expected_cohort_transactions, p_alive};
pub use ltv::{compute_ltv, new_customer_value, CustomerValue};
pub use optim::{minimize, SimplexOptions, SimplexOutcome};
pub use periods::{discretize, CustomerPeriods, PeriodConfig, PeriodGrid};
pub use spend::{expected_spend, fit_spend, fit_spend_with, SpendFitDiagnostics, SpendParams};
pub use types::{CustomerId, PeriodIndex, Transaction};
