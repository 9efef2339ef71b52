//! Log-domain math utilities for the CLV model engine.

pub mod math;

pub use math::beta::*;
pub use math::stable::*;
