//! Numerical building blocks.
//!
//! Everything here operates in log space where probabilities are involved:
//! the likelihood terms of a heterogeneous customer population span many
//! orders of magnitude, and probability-space summation loses the small
//! terms entirely.

pub mod beta;
pub mod stable;
