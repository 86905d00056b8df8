//! Simulation outputs.
//!
//! Step records are immutable once pushed; the reporting layer (CSV,
//! graphs) consumes these structures as-is and the core never formats
//! them.

use serde::{Deserialize, Serialize};

use super::plan::Granularity;

/// Deterministic return scenario labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// `expected_return - variance`
    Min,
    Expected,
    /// `expected_return + variance`
    Max,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Min, Scenario::Expected, Scenario::Max];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Scenario::Min => "min",
            Scenario::Expected => "expected",
            Scenario::Max => "max",
        }
    }

    /// Annual return this scenario runs with.
    #[must_use]
    pub fn annual_return(self, expected_return: f64, variance: f64) -> f64 {
        match self {
            Scenario::Min => expected_return - variance,
            Scenario::Expected => expected_return,
            Scenario::Max => expected_return + variance,
        }
    }
}

/// One time step of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub year: i16,
    pub month: i8,
    pub age: f64,
    /// Portfolio value after this step's return and withdrawal.
    pub portfolio_end: f64,

    pub exp_return_annual: f64,
    pub variance_annual: f64,
    pub inflation_annual: f64,
    /// Per-step compounded return factor in effect this step.
    pub return_step: f64,
    pub inflation_step: f64,

    pub income: f64,
    pub taxed_income: f64,
    /// Requested (pre-policy) expense totals.
    pub requested_expenses: f64,
    pub requested_fixed_expenses: f64,
    pub requested_discretionary_expenses: f64,
    /// Effective (post-policy) raw expenses.
    pub raw_expenses: f64,
    /// Discretionary spend actually funded this step.
    pub discretionary_expenses: f64,
    pub withdrawal_cap: f64,
    pub fixed_withdrawal_need: f64,
    pub net_expenses: f64,
    pub gross_up: f64,

    /// Name of the first event applied this step, if any.
    pub event: Option<String>,
    /// Why the per-step factors were recomputed, when they were.
    pub assumption_reason: Option<String>,
}

/// One scenario's full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub steps: Vec<StepRecord>,
}

impl ScenarioResult {
    /// Depletion is a normal terminal state, not an error: the run ends
    /// early and its remaining steps are simply absent.
    #[must_use]
    pub fn depleted(&self) -> bool {
        self.steps.last().is_some_and(|s| s.portfolio_end <= 0.0)
    }

    #[must_use]
    pub fn terminal_portfolio(&self) -> Option<f64> {
        self.steps.last().map(|s| s.portfolio_end)
    }
}

/// The three deterministic runs, labeled min/expected/max.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenarios: Vec<ScenarioResult>,
}

impl SimulationResult {
    #[must_use]
    pub fn scenario(&self, scenario: Scenario) -> Option<&ScenarioResult> {
        self.scenarios.iter().find(|s| s.scenario == scenario)
    }
}

/// Per-step percentile envelope across Monte Carlo trials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileBands {
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
}

/// Terminal-step percentile statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalStats {
    pub p10: f64,
    pub median: f64,
    pub p90: f64,
}

/// Aggregated Monte Carlo output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub trials: usize,
    pub granularity: Granularity,
    /// `1 - fraction of trials that depleted`.
    pub success_rate: f64,
    /// Age axis aligned with the envelope vectors.
    pub ages: Vec<f64>,
    pub envelope: PercentileBands,
    pub terminal: TerminalStats,
    /// Full path matrix (trials x steps) when retention was requested.
    #[serde(default)]
    pub paths: Option<Vec<Vec<f64>>>,
}

impl MonteCarloSummary {
    /// Trial 0's path, for plotting a representative run.
    #[must_use]
    pub fn sample_path(&self) -> Option<&[f64]> {
        self.paths.as_ref()?.first().map(Vec::as_slice)
    }
}
