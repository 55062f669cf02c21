//! Volatility and order-flow regime filters.
//!
//! [`VolatilityHistory`] classifies implied volatility against its trailing
//! year; [`FlowState`] gates call and put buying on the put-call ratio.

pub mod iv_rank;
pub mod pcr;

pub use iv_rank::*;
pub use pcr::*;
