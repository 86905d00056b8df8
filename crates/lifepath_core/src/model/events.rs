//! Life events - dated mutations to income, expenses, tax rate and
//! assumptions.
//!
//! Events are created once during load/merge. The timeline resolver fills
//! in `t_month` and `date`, and the snapshot normalizer rewrites the
//! override blocks into complete forward-filled snapshots. Events are
//! never deleted during simulation; every run walks the same list.

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::plan::{ExpenseClass, PolicyKind};

/// When a life event fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTime {
    /// Explicit month index; month 0 is the simulation start.
    Month(i32),
    /// 1-based month within the Nth year after start (year 0 = first year).
    YearMonth { year: u32, month: u8 },
    /// Household age when the event fires.
    Age(f64),
    /// Legacy absolute date, converted by month delta from the anchor.
    Date(Date),
    /// Relative to another named event. Chains are allowed; cycles are not.
    Offset {
        from: String,
        #[serde(default)]
        years: i32,
        #[serde(default)]
        months: i32,
    },
}

/// Partial assumption override. Unset fields leave the running value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssumptionsUpdate {
    #[serde(default)]
    pub expected_return: Option<f64>,
    #[serde(default)]
    pub variance: Option<f64>,
    #[serde(default)]
    pub inflation: Option<f64>,
}

impl AssumptionsUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expected_return.is_none() && self.variance.is_none() && self.inflation.is_none()
    }
}

/// Field-wise spending policy override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendingPolicyUpdate {
    #[serde(default, rename = "type")]
    pub kind: Option<PolicyKind>,
    #[serde(default)]
    pub cap_rate: Option<f64>,
    #[serde(default)]
    pub priority_order: Option<Vec<String>>,
}

/// Partial expense override carried by an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpensesUpdate {
    #[serde(default)]
    pub breakdown: BTreeMap<String, f64>,
    #[serde(default)]
    pub total_tax_rate: Option<f64>,
    #[serde(default)]
    pub classification: BTreeMap<String, ExpenseClass>,
    #[serde(default)]
    pub spending_policy: Option<SpendingPolicyUpdate>,
}

/// Partial portfolio override carried by an event.
///
/// Normalized and forward-filled like the other blocks so events are
/// independently inspectable; the stepper tracks the portfolio as a
/// scalar and never consumes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioUpdate {
    #[serde(default)]
    pub breakdown: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssumptionsReset {
    /// Revert assumptions to the pre-scenario baseline.
    Base,
}

/// Explicit end-of-scenario behavior, e.g. `reset.assumptions = "base"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetDirective {
    pub assumptions: AssumptionsReset,
}

/// A dated mutation to the simulated household's finances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    /// Globally unique, non-empty; offset references resolve by name.
    pub name: String,
    #[serde(default)]
    pub time: Option<EventTime>,
    /// Resolved month index; month 0 is the simulation start. Written by
    /// the timeline resolver.
    #[serde(default)]
    pub t_month: Option<i32>,
    /// Resolved first-of-month calendar date.
    #[serde(default)]
    pub date: Option<Date>,
    /// Category -> monthly amount.
    #[serde(default)]
    pub updated_income: BTreeMap<String, f64>,
    #[serde(default)]
    pub updated_expenses: ExpensesUpdate,
    #[serde(default)]
    pub updated_portfolio: PortfolioUpdate,
    #[serde(default)]
    pub updated_assumptions: AssumptionsUpdate,
    #[serde(default)]
    pub reset: Option<ResetDirective>,
}

impl LifeEvent {
    /// A bare event with a name and a time; override blocks start empty.
    #[must_use]
    pub fn new(name: impl Into<String>, time: EventTime) -> Self {
        Self {
            name: name.into(),
            time: Some(time),
            t_month: None,
            date: None,
            updated_income: BTreeMap::new(),
            updated_expenses: ExpensesUpdate::default(),
            updated_portfolio: PortfolioUpdate::default(),
            updated_assumptions: AssumptionsUpdate::default(),
            reset: None,
        }
    }

    /// Human-readable `(year, month)` relative to the start: year 0,
    /// month 1 is the first simulated month.
    #[must_use]
    pub fn relative_year_month(&self) -> Option<(i32, u8)> {
        self.t_month
            .map(|tm| (tm.div_euclid(12), (tm.rem_euclid(12) + 1) as u8))
    }

    /// Household age when this event fires.
    #[must_use]
    pub fn age_at(&self, start_age: f64) -> Option<f64> {
        self.t_month.map(|tm| start_age + f64::from(tm) / 12.0)
    }
}
