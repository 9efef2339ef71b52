//! Shared primitive types used across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable customer identifier, assigned by the caller's loader.
pub type CustomerId = String;

/// Zero-based index of a discrete observation period, aligned to the
/// population-wide origin.
pub type PeriodIndex = u32;

/// A single raw transaction event. Immutable input record; the engine never
/// parses dates or files, callers hand it already-typed timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_id: CustomerId,
    pub at: DateTime<Utc>,
    /// Monetary amount, in the caller's currency unit. Must be positive and
    /// finite; refunds and voids are the loader's problem.
    pub amount: f64,
}

impl Transaction {
    pub fn new(customer_id: impl Into<CustomerId>, at: DateTime<Utc>, amount: f64) -> Self {
        Self {
            customer_id: customer_id.into(),
            at,
            amount,
        }
    }
}
