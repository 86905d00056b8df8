//! Deterministic stepper.
//!
//! Walks monthly or yearly steps from the start age to `stop_age`
//! inclusive, applying events, resolving the spending policy, computing
//! cashflow with tax gross-up and advancing the portfolio, once per
//! return scenario (min / expected / max). Depletion ends a scenario's
//! loop early; the missing tail of the result signals it.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::ConfigError;
use crate::model::{
    Assumptions, ExpenseClass, Granularity, LifeEvent, Plan, Scenario, ScenarioResult,
    SimulationResult, StepRecord,
};
use crate::simulation_state::SimulationState;
use crate::spending::apply_spending_policy;

/// One step's cashflow figures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cashflow {
    pub income: f64,
    pub raw_expenses: f64,
    pub taxed_income: f64,
    pub net_expense: f64,
    /// Pre-tax withdrawal required to fund the net expense. A surplus
    /// (non-positive net) needs no gross-up and flows back into the
    /// portfolio unchanged.
    pub gross_up: f64,
}

/// The income/expense/tax identity shared by the deterministic and
/// Monte Carlo paths.
#[must_use]
pub fn compute_cashflow(
    income: &BTreeMap<String, f64>,
    breakdown: &BTreeMap<String, f64>,
    tax_rate: f64,
) -> Cashflow {
    let income_total: f64 = income.values().sum();
    let raw_expenses: f64 = breakdown.values().sum();
    let taxed_income = income_total * (1.0 - tax_rate);
    let net_expense = raw_expenses - taxed_income;
    let gross_up = if net_expense > 0.0 && tax_rate < 1.0 {
        net_expense / (1.0 - tax_rate)
    } else {
        net_expense
    };
    Cashflow {
        income: income_total,
        raw_expenses,
        taxed_income,
        net_expense,
        gross_up,
    }
}

/// Per-step (return, inflation) factors for the state's current
/// annualized assumptions.
pub(crate) fn step_factors(state: &SimulationState, granularity: Granularity) -> (f64, f64) {
    (
        granularity.step_rate(state.exp_return),
        granularity.step_rate(state.inflation),
    )
}

/// What applying one step's events changed.
pub(crate) struct EventsApplied {
    /// Name of the first event matched, for result labeling.
    pub label: Option<String>,
    pub assumptions_changed: bool,
    pub reason: Option<String>,
}

/// Apply every event whose resolved date equals the state's year/month.
///
/// Override blocks merge key-wise (override values win). A reset
/// directive restores the pre-scenario baseline assumptions and counts as
/// an assumption change, so factor recomputation triggers on both the
/// explicit-override and reset paths.
pub(crate) fn apply_events_for_date(
    state: &mut SimulationState,
    events: &[LifeEvent],
    base_assumptions: Option<&Assumptions>,
) -> Result<EventsApplied, ConfigError> {
    let cursor = jiff::civil::date(state.year, state.month, 1);
    let mut label: Option<String> = None;
    let mut changed = false;
    let mut reason: Option<String> = None;

    for ev in events {
        if ev.date != Some(cursor) {
            continue;
        }

        for (key, value) in &ev.updated_income {
            state.income.insert(key.clone(), *value);
        }

        for (key, value) in &ev.updated_expenses.breakdown {
            state.expenses_breakdown.insert(key.clone(), *value);
        }
        if let Some(rate) = ev.updated_expenses.total_tax_rate {
            state.tax_rate = rate;
        }
        for (key, class) in &ev.updated_expenses.classification {
            state.expenses_classification.insert(key.clone(), *class);
        }
        if let Some(update) = &ev.updated_expenses.spending_policy {
            state.merge_spending_policy(update);
        }

        if let Some(v) = ev.updated_assumptions.expected_return {
            state.exp_return = v;
            changed = true;
            reason = Some(format!("updated_assumptions.expected_return={v}"));
        }
        if let Some(v) = ev.updated_assumptions.variance {
            state.variance = v;
            changed = true;
            reason.get_or_insert_with(|| "updated_assumptions.variance".to_owned());
        }
        if let Some(v) = ev.updated_assumptions.inflation {
            state.inflation = v;
            changed = true;
            reason.get_or_insert_with(|| "updated_assumptions.inflation".to_owned());
        }

        if ev.reset.is_some() {
            let base = base_assumptions.ok_or(ConfigError::MissingBaseAssumptions)?;
            state.exp_return = base.expected_return;
            state.variance = base.variance;
            state.inflation = base.inflation;
            changed = true;
            reason = Some("reset.assumptions=base".to_owned());
        }

        if label.is_none() {
            label = Some(ev.name.clone());
        }
    }

    Ok(EventsApplied {
        label,
        assumptions_changed: changed,
        reason,
    })
}

/// Time cursor for a step, computed directly from the step index.
///
/// Both the deterministic stepper and the Monte Carlo core derive their
/// cursor this way, so the two engines agree on the step grid and no
/// floating drift accumulates across long horizons.
pub(crate) fn cursor_from_step(
    base: &SimulationState,
    step: usize,
    granularity: Granularity,
) -> (i16, i8, f64) {
    match granularity {
        Granularity::Monthly => {
            let zero_based = i32::from(base.month) - 1 + step as i32;
            (
                base.year + (zero_based / 12) as i16,
                (zero_based % 12 + 1) as i8,
                base.age + step as f64 / 12.0,
            )
        }
        Granularity::Yearly => (base.year + step as i16, base.month, base.age + step as f64),
    }
}

/// Requested (pre-policy) expense totals, split by classification.
fn requested_totals(state: &SimulationState) -> (f64, f64, f64) {
    let total: f64 = state.expenses_breakdown.values().sum();
    let discretionary: f64 = state
        .expenses_breakdown
        .iter()
        .filter(|(key, _)| state.class_of(key) == ExpenseClass::Discretionary)
        .map(|(_, value)| value)
        .sum();
    (total, total - discretionary, discretionary)
}

/// Run the three deterministic return scenarios over a prepared plan.
///
/// The plan must have been through [`crate::prepare`] (resolved timeline,
/// normalized snapshots). Configuration problems surface here, before any
/// stepping; portfolio depletion does not, a depleted scenario simply
/// ends early.
pub fn simulate(plan: &Plan) -> Result<SimulationResult, ConfigError> {
    let base_state = SimulationState::from_plan(plan)?;
    let granularity = plan.granularity;

    let mut scenarios = Vec::with_capacity(Scenario::ALL.len());
    for scenario in Scenario::ALL {
        let mut state = base_state.clone();
        state.exp_return = scenario.annual_return(base_state.exp_return, base_state.variance);
        let (mut r, mut i) = step_factors(&state, granularity);

        let mut steps = Vec::new();
        let mut step_index = 0usize;
        loop {
            let (year, month, age) = cursor_from_step(&base_state, step_index, granularity);
            if age > state.stop_age {
                break;
            }
            state.year = year;
            state.month = month;
            state.age = age;

            let applied =
                apply_events_for_date(&mut state, &plan.events, plan.base_assumptions.as_ref())?;
            if applied.assumptions_changed {
                (r, i) = step_factors(&state, granularity);
            }

            let outcome = apply_spending_policy(&state, granularity);
            let (requested_total, requested_fixed, requested_disc) = requested_totals(&state);
            let flow = compute_cashflow(&state.income, &outcome.effective_breakdown, state.tax_rate);

            state.portfolio = (state.portfolio * (1.0 + r) - flow.gross_up).max(0.0);

            steps.push(StepRecord {
                year: state.year,
                month: state.month,
                age: state.age,
                portfolio_end: state.portfolio,
                exp_return_annual: state.exp_return,
                variance_annual: state.variance,
                inflation_annual: state.inflation,
                return_step: r,
                inflation_step: i,
                income: flow.income,
                taxed_income: flow.taxed_income,
                requested_expenses: requested_total,
                requested_fixed_expenses: requested_fixed,
                requested_discretionary_expenses: requested_disc,
                raw_expenses: flow.raw_expenses,
                discretionary_expenses: outcome.discretionary_spend,
                withdrawal_cap: outcome.withdrawal_cap,
                fixed_withdrawal_need: outcome.fixed_withdrawal_need,
                net_expenses: flow.net_expense,
                gross_up: flow.gross_up,
                event: applied.label,
                assumption_reason: applied.reason,
            });

            // Drift expenses with inflation for the next step.
            let drift = 1.0 + i;
            for value in state.expenses_breakdown.values_mut() {
                *value *= drift;
            }

            if state.portfolio <= 0.0 {
                break;
            }
            step_index += 1;
        }

        debug!(
            scenario = scenario.label(),
            steps = steps.len(),
            terminal = steps.last().map_or(0.0, |s| s.portfolio_end),
            "scenario run complete"
        );
        scenarios.push(ScenarioResult { scenario, steps });
    }

    Ok(SimulationResult { scenarios })
}
