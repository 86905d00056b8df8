mod events;
mod plan;
mod results;

pub use events::{
    AssumptionsReset, AssumptionsUpdate, EventTime, ExpensesUpdate, LifeEvent, PortfolioUpdate,
    ResetDirective, SpendingPolicyUpdate,
};
pub use plan::{
    Assumptions, ExpenseClass, Expenses, Granularity, Person, Plan, PolicyKind, Portfolio,
    SpendingPolicy,
};
pub use results::{
    MonteCarloSummary, PercentileBands, Scenario, ScenarioResult, SimulationResult, StepRecord,
    TerminalStats,
};
