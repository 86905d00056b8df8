//! Withdrawal-capped spending policy.
//!
//! The cap constrains *withdrawals* (the gross-up), not raw expenses:
//! spending one unit of raw expense costs `1/(1-tax_rate)` of withdrawal,
//! so remaining withdrawal room converts back to a raw discretionary
//! allowance through the inverse relation. Fixed obligations are never
//! reduced; discretionary categories are funded from the allowance in
//! priority order and the shortfall goes unfunded.

use std::collections::BTreeMap;

use crate::model::{ExpenseClass, Granularity};
use crate::simulation::compute_cashflow;
use crate::simulation_state::SimulationState;

/// Outcome of resolving the spending policy for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingOutcome {
    /// Raw expenses to use for this step's cashflow.
    pub effective_breakdown: BTreeMap<String, f64>,
    /// Discretionary raw spend actually funded.
    pub discretionary_spend: f64,
    /// `W_cap`: portfolio * cap_rate / periods per year.
    pub withdrawal_cap: f64,
    /// `W_fixed`: withdrawal need of fixed-only expenses.
    pub fixed_withdrawal_need: f64,
    /// Desired discretionary raw spend before capping.
    pub requested_discretionary: f64,
}

/// Resolve the effective expense breakdown for one step.
///
/// Without an active portfolio-cap policy the requested breakdown passes
/// through unmodified (unconstrained is the back-compatible default).
pub fn apply_spending_policy(state: &SimulationState, granularity: Granularity) -> SpendingOutcome {
    let requested = &state.expenses_breakdown;

    let discretionary_keys: Vec<&String> = requested
        .keys()
        .filter(|key| state.class_of(key) == ExpenseClass::Discretionary)
        .collect();
    let requested_disc: f64 = discretionary_keys
        .iter()
        .map(|key| requested.get(*key).copied().unwrap_or(0.0))
        .sum();

    // No discretionary categories: nothing to cap.
    if discretionary_keys.is_empty() {
        return SpendingOutcome {
            effective_breakdown: requested.clone(),
            discretionary_spend: 0.0,
            withdrawal_cap: 0.0,
            fixed_withdrawal_need: 0.0,
            requested_discretionary: requested_disc,
        };
    }

    let Some(cap_rate) = state.spending_policy.active_cap_rate() else {
        return SpendingOutcome {
            effective_breakdown: requested.clone(),
            discretionary_spend: requested_disc,
            withdrawal_cap: 0.0,
            fixed_withdrawal_need: 0.0,
            requested_discretionary: requested_disc,
        };
    };

    let withdrawal_cap =
        state.portfolio * cap_rate / f64::from(granularity.steps_per_year());

    let fixed_breakdown: BTreeMap<String, f64> = requested
        .iter()
        .filter(|(key, _)| state.class_of(key) != ExpenseClass::Discretionary)
        .map(|(key, value)| (key.clone(), *value))
        .collect();

    let fixed_withdrawal_need =
        compute_cashflow(&state.income, &fixed_breakdown, state.tax_rate).gross_up;

    let withdrawal_room = (withdrawal_cap - fixed_withdrawal_need).max(0.0);
    let mut remaining = withdrawal_room * (1.0 - state.tax_rate);

    // Explicit priority first (restricted to known discretionary keys),
    // then the rest in alphabetical key order.
    let mut order: Vec<&String> = state
        .spending_policy
        .priority_order
        .iter()
        .filter(|key| discretionary_keys.contains(key))
        .collect();
    for key in &discretionary_keys {
        if !order.contains(key) {
            order.push(*key);
        }
    }

    let mut funded: BTreeMap<String, f64> = BTreeMap::new();
    let mut discretionary_spend = 0.0;
    for key in order {
        let want = requested.get(key).copied().unwrap_or(0.0);
        let spend = want.min(remaining);
        funded.insert(key.clone(), spend);
        discretionary_spend += spend;
        remaining -= spend;
        if remaining <= 0.0 {
            break;
        }
    }
    // Any discretionary category not reached gets 0.
    for key in &discretionary_keys {
        funded.entry((*key).clone()).or_insert(0.0);
    }

    let mut effective_breakdown = fixed_breakdown;
    effective_breakdown.extend(funded);

    SpendingOutcome {
        effective_breakdown,
        discretionary_spend,
        withdrawal_cap,
        fixed_withdrawal_need,
        requested_discretionary: requested_disc,
    }
}
