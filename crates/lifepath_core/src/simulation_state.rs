//! Mutable state owned by exactly one simulation run.
//!
//! Every deterministic scenario and every Monte Carlo trial starts from a
//! fresh clone; nothing here is shared across runs.

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::model::{ExpenseClass, Plan, SpendingPolicy, SpendingPolicyUpdate};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub year: i16,
    pub month: i8,
    pub age: f64,
    pub stop_age: f64,
    pub tax_rate: f64,
    pub income: BTreeMap<String, f64>,
    pub expenses_breakdown: BTreeMap<String, f64>,
    pub expenses_classification: BTreeMap<String, ExpenseClass>,
    pub spending_policy: SpendingPolicy,
    /// Scalar portfolio value; the per-category breakdown only seeds it.
    pub portfolio: f64,
    pub exp_return: f64,
    pub variance: f64,
    pub inflation: f64,
}

impl SimulationState {
    /// Build the step-0 state from a validated plan.
    pub fn from_plan(plan: &Plan) -> Result<Self, ConfigError> {
        plan.validate()?;
        let anchor = plan.anchor();
        let age = plan.person.age_at(anchor)?;

        // Unclassified expense categories are fixed.
        let mut classification = plan.expenses.classification.clone();
        for key in plan.expenses.breakdown.keys() {
            classification.entry(key.clone()).or_default();
        }

        Ok(Self {
            year: anchor.year(),
            month: anchor.month(),
            age,
            stop_age: plan.person.stop_age,
            tax_rate: plan.expenses.total_tax_rate,
            income: plan.income.clone(),
            expenses_breakdown: plan.expenses.breakdown.clone(),
            expenses_classification: classification,
            spending_policy: plan.expenses.spending_policy.clone(),
            portfolio: plan.portfolio.total(),
            exp_return: plan.assumptions.expected_return,
            variance: plan.assumptions.variance,
            inflation: plan.assumptions.inflation,
        })
    }

    /// Classification for a category, defaulting to fixed.
    #[must_use]
    pub fn class_of(&self, category: &str) -> ExpenseClass {
        self.expenses_classification
            .get(category)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn merge_spending_policy(&mut self, update: &SpendingPolicyUpdate) {
        if let Some(kind) = update.kind {
            self.spending_policy.kind = kind;
        }
        if let Some(cap_rate) = update.cap_rate {
            self.spending_policy.cap_rate = Some(cap_rate);
        }
        if let Some(priority_order) = &update.priority_order {
            self.spending_policy.priority_order = priority_order.clone();
        }
    }
}
