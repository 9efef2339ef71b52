//! Error types for the CLV engine.
//!
//! Three failure families matter to callers and each keeps its diagnostic
//! context attached:
//! - validation failures at statistics-construction time (never silently
//!   corrected),
//! - optimizer non-convergence (last objective value and iteration count
//!   preserved so the caller can retry with different starts or a coarser
//!   discretization),
//! - domain failures where a fitted parameter leaves the region in which a
//!   derived quantity is defined.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed inputs or sufficient statistics violating an invariant.
    Validation,
    /// Numerical optimization failed to converge.
    Convergence,
    /// A parameter left the domain where a derived quantity exists.
    Domain,
    /// Not enough observations to attempt a fit.
    Data,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Convergence => write!(f, "convergence"),
            ErrorCategory::Domain => write!(f, "domain"),
            ErrorCategory::Data => write!(f, "data"),
        }
    }
}

/// Unified error type for the CLV engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid statistics for customer {customer_id}: {detail}")]
    Validation {
        customer_id: String,
        detail: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{model} fit did not converge: {iterations} iterations, last log-likelihood {last_value}")]
    Convergence {
        model: &'static str,
        iterations: usize,
        last_value: f64,
    },

    #[error("parameter {parameter} = {value} outside supported domain ({constraint})")]
    Domain {
        parameter: &'static str,
        value: f64,
        constraint: &'static str,
    },

    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

impl Error {
    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation { .. } | Error::InvalidInput(_) => ErrorCategory::Validation,
            Error::Convergence { .. } => ErrorCategory::Convergence,
            Error::Domain { .. } => ErrorCategory::Domain,
            Error::InsufficientData(_) => ErrorCategory::Data,
        }
    }

    /// Whether retrying with different inputs can plausibly succeed.
    ///
    /// Convergence and domain failures often resolve with different starting
    /// values or a coarser discretization; validation failures indicate an
    /// upstream bug and will recur until the input is fixed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Validation { .. } | Error::InvalidInput(_) => false,
            Error::Convergence { .. } => true,
            Error::Domain { .. } => true,
            Error::InsufficientData(_) => false,
        }
    }
}
