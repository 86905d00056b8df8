//! Integration tests for the lifepath simulation engine
//!
//! Tests are organized by topic:
//! - `plan` - Plan model, validation and serde boundary
//! - `timeline` - Event timing resolution and offset chains
//! - `normalize` - Snapshot normalization and forward fill
//! - `simulation` - Deterministic stepper and cashflow math
//! - `spending` - Withdrawal-capped spending policy
//! - `monte_carlo` - Trial fan-out, samplers and percentiles

mod monte_carlo;
mod support;
