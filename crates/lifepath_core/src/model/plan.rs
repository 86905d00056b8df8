//! The merged profile + scenario plan consumed by the simulation engine.
//!
//! A `Plan` is assembled by an external loader (JSON parsing, schema
//! validation and base/scenario merging happen out there) and handed to
//! the core fully populated. The core validates numeric sanity before
//! stepping but treats missing required fields as a loader bug.

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::events::LifeEvent;
use crate::month_math;

/// Simulation step size.
///
/// Changes the step count and how annual rates compound down to one step;
/// the stepping algorithm is otherwise identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Monthly,
    Yearly,
}

impl Granularity {
    #[must_use]
    pub fn steps_per_year(self) -> u32 {
        match self {
            Granularity::Monthly => 12,
            Granularity::Yearly => 1,
        }
    }

    /// Compound an annual rate down to one step.
    #[must_use]
    pub fn step_rate(self, annual: f64) -> f64 {
        match self {
            Granularity::Monthly => (1.0 + annual).powf(1.0 / 12.0) - 1.0,
            Granularity::Yearly => annual,
        }
    }
}

fn default_stop_age() -> f64 {
    100.0
}

/// The household being simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Preferred age source; wins over `current_age` when both are set.
    #[serde(default)]
    pub birthdate: Option<Date>,
    #[serde(default)]
    pub current_age: Option<f64>,
    /// Simulation runs to this age inclusive.
    #[serde(default = "default_stop_age")]
    pub stop_age: f64,
}

impl Person {
    /// Age at the simulation anchor, in fractional years.
    pub fn age_at(&self, start: Date) -> Result<f64, ConfigError> {
        if let Some(birthdate) = self.birthdate {
            Ok(f64::from(month_math::months_between(birthdate, start)) / 12.0)
        } else if let Some(age) = self.current_age {
            Ok(age)
        } else {
            Err(ConfigError::MissingAge)
        }
    }
}

/// Annualized market/economic assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    pub expected_return: f64,
    pub variance: f64,
    pub inflation: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            expected_return: 0.06,
            variance: 0.02,
            inflation: 0.025,
        }
    }
}

impl Assumptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("expected_return", self.expected_return),
            ("variance", self.variance),
            ("inflation", self.inflation),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteAssumption { field, value });
            }
        }
        Ok(())
    }
}

/// Whether an expense category is an obligation or can be rationed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseClass {
    /// Never reduced by the spending policy. The default for any
    /// unclassified category.
    #[default]
    Fixed,
    Discretionary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum PolicyKind {
    /// No withdrawal cap; effective spending equals requested spending.
    #[default]
    Unconstrained,
    PortfolioCap,
}

// Only "portfolio_cap" is recognized; any other kind disables capping.
impl From<String> for PolicyKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "portfolio_cap" => PolicyKind::PortfolioCap,
            _ => PolicyKind::Unconstrained,
        }
    }
}

/// Withdrawal-rate ceiling that rations discretionary spending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendingPolicy {
    #[serde(default, rename = "type")]
    pub kind: PolicyKind,
    /// Annual withdrawal rate as a fraction of the portfolio.
    #[serde(default)]
    pub cap_rate: Option<f64>,
    /// Discretionary categories funded first, in this order; anything
    /// not listed is funded afterwards in alphabetical key order.
    #[serde(default)]
    pub priority_order: Vec<String>,
}

impl SpendingPolicy {
    /// The annual cap rate, when the policy actively constrains withdrawals.
    #[must_use]
    pub fn active_cap_rate(&self) -> Option<f64> {
        match (self.kind, self.cap_rate) {
            (PolicyKind::PortfolioCap, Some(rate)) if rate.is_finite() && rate > 0.0 => Some(rate),
            _ => None,
        }
    }
}

/// Monthly expense configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expenses {
    /// Category -> monthly amount.
    #[serde(default)]
    pub breakdown: BTreeMap<String, f64>,
    /// Effective tax rate applied to income and withdrawal gross-up.
    #[serde(default)]
    pub total_tax_rate: f64,
    /// Category -> fixed/discretionary. Missing keys default to fixed.
    #[serde(default)]
    pub classification: BTreeMap<String, ExpenseClass>,
    #[serde(default)]
    pub spending_policy: SpendingPolicy,
}

/// Portfolio holdings, category -> sub-category -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(default)]
    pub breakdown: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Portfolio {
    /// Total value: the sum over all sub-categories.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.breakdown
            .values()
            .flat_map(|sub| sub.values())
            .sum()
    }
}

/// Merged profile + scenario: everything one simulation run consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub person: Person,
    #[serde(default)]
    pub assumptions: Assumptions,
    /// Assumptions captured from the base profile before any scenario
    /// overlay. `reset.assumptions = "base"` reverts to these; deriving
    /// them from the merged assumptions would incorrectly reset to
    /// scenario-modified values.
    #[serde(default)]
    pub base_assumptions: Option<Assumptions>,
    /// Category -> monthly amount.
    #[serde(default)]
    pub income: BTreeMap<String, f64>,
    #[serde(default)]
    pub expenses: Expenses,
    #[serde(default)]
    pub portfolio: Portfolio,
    /// Simulation anchor; forced to the first of its month.
    pub start_date: Date,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub events: Vec<LifeEvent>,
}

impl Plan {
    /// The first-of-month simulation anchor.
    #[must_use]
    pub fn anchor(&self) -> Date {
        month_math::first_of_month(self.start_date)
    }

    /// Age at the anchor date.
    pub fn start_age(&self) -> Result<f64, ConfigError> {
        self.person.age_at(self.anchor())
    }

    /// Check numeric sanity of everything the stepper will read.
    ///
    /// Surfaces configuration problems before any stepping begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.start_age()?;
        self.assumptions.validate()?;
        if let Some(base) = &self.base_assumptions {
            base.validate()?;
        }
        let stop_age = self.person.stop_age;
        if !stop_age.is_finite() || stop_age < 0.0 {
            return Err(ConfigError::InvalidStopAge(stop_age));
        }
        let tax_rate = self.expenses.total_tax_rate;
        if !tax_rate.is_finite() {
            return Err(ConfigError::InvalidTaxRate(tax_rate));
        }
        if self.base_assumptions.is_none() && self.events.iter().any(|ev| ev.reset.is_some()) {
            return Err(ConfigError::MissingBaseAssumptions);
        }
        Ok(())
    }
}
