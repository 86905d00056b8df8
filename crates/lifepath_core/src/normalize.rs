//! Snapshot normalization.
//!
//! Rewrites every event's partial override blocks into complete snapshots
//! of every known category key, forward-filled from a running baseline.
//! After this pass each event declares values for every key, not just the
//! ones it changed, so the downstream schema is stable and any event can
//! be inspected independently.
//!
//! Runs exactly once, after the timeline resolver and before simulation.
//! Normalizing an already-normalized list is a no-op.

use tracing::debug;

use crate::error::NormalizeError;
use crate::model::{AssumptionsUpdate, Plan};

/// Expand partial event overrides into complete forward-filled snapshots.
///
/// Keys first introduced by an event's override are back-filled into the
/// plan's baseline at 0.0, so they exist from step 0. Classification and
/// spending-policy overrides stay partial; the stepper merges them
/// key-wise at apply time.
pub fn normalize_events(plan: &mut Plan) -> Result<(), NormalizeError> {
    // Upstream contract: resolved and time-sorted.
    let mut prev: Option<i32> = None;
    for ev in &plan.events {
        let Some(tm) = ev.t_month else {
            return Err(NormalizeError::Unresolved {
                event: ev.name.clone(),
            });
        };
        if let Some(p) = prev
            && tm < p
        {
            return Err(NormalizeError::OutOfOrder {
                event: ev.name.clone(),
                t_month: tm,
                previous: p,
            });
        }
        prev = Some(tm);
    }

    // Back-fill keys introduced by events into the baseline at 0.0.
    for ev in &plan.events {
        for key in ev
            .updated_expenses
            .breakdown
            .keys()
            .chain(ev.updated_expenses.classification.keys())
        {
            plan.expenses.breakdown.entry(key.clone()).or_insert(0.0);
        }
        for key in ev.updated_income.keys() {
            plan.income.entry(key.clone()).or_insert(0.0);
        }
        for (category, sub) in &ev.updated_portfolio.breakdown {
            let slot = plan
                .portfolio
                .breakdown
                .entry(category.clone())
                .or_default();
            for sub_key in sub.keys() {
                slot.entry(sub_key.clone()).or_insert(0.0);
            }
        }
    }

    // Walk events in time order, merging overrides onto the running state
    // and writing the full state back as the event's override block.
    let mut curr_expenses = plan.expenses.breakdown.clone();
    let mut curr_income = plan.income.clone();
    let mut curr_portfolio = plan.portfolio.breakdown.clone();
    let mut curr_assumptions = plan.assumptions;
    let mut curr_tax_rate = plan.expenses.total_tax_rate;

    for ev in &mut plan.events {
        for (key, value) in &ev.updated_expenses.breakdown {
            curr_expenses.insert(key.clone(), *value);
        }
        ev.updated_expenses.breakdown = curr_expenses.clone();
        curr_tax_rate = ev.updated_expenses.total_tax_rate.unwrap_or(curr_tax_rate);
        ev.updated_expenses.total_tax_rate = Some(curr_tax_rate);

        for (key, value) in &ev.updated_income {
            curr_income.insert(key.clone(), *value);
        }
        ev.updated_income = curr_income.clone();

        for (category, sub) in &ev.updated_portfolio.breakdown {
            let slot = curr_portfolio.entry(category.clone()).or_default();
            for (sub_key, value) in sub {
                slot.insert(sub_key.clone(), *value);
            }
        }
        ev.updated_portfolio.breakdown = curr_portfolio.clone();

        if let Some(v) = ev.updated_assumptions.expected_return {
            curr_assumptions.expected_return = v;
        }
        if let Some(v) = ev.updated_assumptions.variance {
            curr_assumptions.variance = v;
        }
        if let Some(v) = ev.updated_assumptions.inflation {
            curr_assumptions.inflation = v;
        }
        ev.updated_assumptions = AssumptionsUpdate {
            expected_return: Some(curr_assumptions.expected_return),
            variance: Some(curr_assumptions.variance),
            inflation: Some(curr_assumptions.inflation),
        };
    }

    debug!(
        events = plan.events.len(),
        expense_keys = plan.expenses.breakdown.len(),
        income_keys = plan.income.len(),
        "normalized event snapshots"
    );
    Ok(())
}
