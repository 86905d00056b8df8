//! Monte Carlo core.
//!
//! Reuses the deterministic stepper's per-step cashflow, spending-policy
//! and portfolio-update logic, but drives the per-step return from an
//! injected sampler and runs many independent trials. The time cursor is
//! computed directly from the step index rather than accumulated, so no
//! floating drift builds up across thousands of trials.
//!
//! Trials are embarrassingly parallel: each owns a deep-copied state and
//! a random stream derived from `base seed + trial index`, so results are
//! reproducible whether trials run sequentially or fanned out on rayon.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::ConfigError;
use crate::model::{Granularity, MonteCarloSummary, PercentileBands, Plan, TerminalStats};
use crate::simulation::{apply_events_for_date, compute_cashflow, cursor_from_step, step_factors};
use crate::simulation_state::SimulationState;
use crate::spending::apply_spending_policy;

/// Per-step return source for Monte Carlo trials.
///
/// `base_rate` and `base_inflation` are the per-step factors for the
/// state's current assumptions; samplers may use or ignore them.
pub trait ReturnSampler: Sync {
    fn sample(
        &self,
        state: &SimulationState,
        year: i16,
        month: i8,
        base_rate: f64,
        base_inflation: f64,
        steps_per_year: u32,
        rng: &mut SmallRng,
    ) -> f64;
}

fn step_sigma(annual_sigma: f64, steps_per_year: u32) -> f64 {
    if annual_sigma == 0.0 {
        0.0
    } else {
        annual_sigma / f64::from(steps_per_year).sqrt()
    }
}

/// Draws `Normal(base_rate, variance / sqrt(steps_per_year))` per step:
/// annual volatility deflated to a step-level standard deviation under an
/// independence assumption. Zero variance degenerates to the
/// deterministic rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianSampler;

impl ReturnSampler for GaussianSampler {
    fn sample(
        &self,
        state: &SimulationState,
        _year: i16,
        _month: i8,
        base_rate: f64,
        _base_inflation: f64,
        steps_per_year: u32,
        rng: &mut SmallRng,
    ) -> f64 {
        let sigma = step_sigma(state.variance, steps_per_year);
        if sigma <= 0.0 {
            return base_rate;
        }
        match Normal::new(base_rate, sigma) {
            Ok(normal) => normal.sample(rng),
            Err(_) => base_rate,
        }
    }
}

/// How a forced market shock expresses its return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShockKind {
    /// Literal per-step return for the shocked month.
    Return(f64),
    /// Fractional drop; 0.3 becomes a -0.30 return.
    Drop(f64),
}

impl ShockKind {
    #[must_use]
    pub fn as_return(self) -> f64 {
        match self {
            ShockKind::Return(r) => r,
            ShockKind::Drop(pct) => -pct.abs(),
        }
    }
}

/// An explicit market move pinned to one year-month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketShock {
    pub year: i16,
    pub month: i8,
    pub kind: ShockKind,
}

/// Overrides scheduled months with explicit shocks and falls back to the
/// Gaussian policy for every other step.
#[derive(Debug, Clone, Default)]
pub struct ForcedShockSampler {
    shocks: FxHashMap<(i16, i8), f64>,
}

impl ForcedShockSampler {
    #[must_use]
    pub fn new(shocks: impl IntoIterator<Item = MarketShock>) -> Self {
        Self {
            shocks: shocks
                .into_iter()
                .map(|s| ((s.year, s.month), s.kind.as_return()))
                .collect(),
        }
    }
}

impl ReturnSampler for ForcedShockSampler {
    fn sample(
        &self,
        state: &SimulationState,
        year: i16,
        month: i8,
        base_rate: f64,
        base_inflation: f64,
        steps_per_year: u32,
        rng: &mut SmallRng,
    ) -> f64 {
        if let Some(&forced) = self.shocks.get(&(year, month)) {
            return forced;
        }
        GaussianSampler.sample(
            state,
            year,
            month,
            base_rate,
            base_inflation,
            steps_per_year,
            rng,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonteCarloConfig {
    pub trials: usize,
    /// Base seed; trial `t` runs on `seed + t`.
    pub seed: u64,
    /// Retain the full trials x steps path matrix in the summary.
    pub collect_paths: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            trials: 1000,
            seed: 0,
            collect_paths: false,
        }
    }
}

struct TrialOutcome {
    path: Vec<f64>,
    terminal: f64,
    depleted: bool,
}

fn run_trial<S: ReturnSampler + ?Sized>(
    plan: &Plan,
    base_state: &SimulationState,
    sampler: &S,
    steps_total: usize,
    seed: u64,
) -> Result<TrialOutcome, ConfigError> {
    let granularity = plan.granularity;
    let steps_per_year = granularity.steps_per_year();
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut state = base_state.clone();
    let (mut base_r, mut base_i) = step_factors(&state, granularity);

    let mut path = vec![0.0; steps_total];
    let mut depleted = false;

    for step in 0..steps_total {
        let (year, month, age) = cursor_from_step(base_state, step, granularity);
        state.year = year;
        state.month = month;
        state.age = age;

        // Events keep applying after depletion; the money math stops.
        let applied =
            apply_events_for_date(&mut state, &plan.events, plan.base_assumptions.as_ref())?;
        if applied.assumptions_changed {
            (base_r, base_i) = step_factors(&state, granularity);
        }

        if !depleted {
            let step_return = sampler.sample(
                &state,
                year,
                month,
                base_r,
                base_i,
                steps_per_year,
                &mut rng,
            );

            let outcome = apply_spending_policy(&state, granularity);
            let flow = compute_cashflow(&state.income, &outcome.effective_breakdown, state.tax_rate);

            state.portfolio = (state.portfolio * (1.0 + step_return) - flow.gross_up).max(0.0);
            if state.portfolio <= 0.0 {
                depleted = true;
            }

            let drift = 1.0 + base_i;
            for value in state.expenses_breakdown.values_mut() {
                *value *= drift;
            }
        }

        path[step] = if depleted { 0.0 } else { state.portfolio };
    }

    Ok(TrialOutcome {
        terminal: state.portfolio,
        depleted,
        path,
    })
}

/// Linear-interpolation percentile over a sorted slice (the rule numpy
/// uses by default).
#[must_use]
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Run `config.trials` independent trials of a prepared plan with the
/// given return sampler and aggregate percentile statistics.
///
/// Depletion freezes a trial's remaining path at 0 and flags it as a
/// failure; no further withdrawals are attempted on a dead portfolio.
pub fn monte_carlo<S: ReturnSampler + ?Sized>(
    plan: &Plan,
    sampler: &S,
    config: &MonteCarloConfig,
) -> Result<MonteCarloSummary, ConfigError> {
    let base_state = SimulationState::from_plan(plan)?;
    let granularity = plan.granularity;
    let steps_per_year = granularity.steps_per_year();

    let horizon_years = (base_state.stop_age - base_state.age).max(0.0);
    // Terminal step at stop_age inclusive, the same grid the
    // deterministic stepper walks.
    let steps_total = (horizon_years * f64::from(steps_per_year)).round() as usize + 1;

    let ages: Vec<f64> = (0..steps_total)
        .map(|step| match granularity {
            Granularity::Monthly => base_state.age + step as f64 / 12.0,
            Granularity::Yearly => base_state.age + step as f64,
        })
        .collect();

    if config.trials == 0 {
        return Ok(MonteCarloSummary {
            trials: 0,
            granularity,
            success_rate: 1.0,
            ages,
            envelope: PercentileBands::default(),
            terminal: TerminalStats::default(),
            paths: config.collect_paths.then(Vec::new),
        });
    }

    let run = |trial: usize| {
        run_trial(
            plan,
            &base_state,
            sampler,
            steps_total,
            config.seed.wrapping_add(trial as u64),
        )
    };

    #[cfg(feature = "parallel")]
    let trials: Vec<TrialOutcome> = (0..config.trials)
        .into_par_iter()
        .map(run)
        .collect::<Result<_, _>>()?;

    #[cfg(not(feature = "parallel"))]
    let trials: Vec<TrialOutcome> = (0..config.trials)
        .map(run)
        .collect::<Result<_, _>>()?;

    let depleted = trials.iter().filter(|t| t.depleted).count();
    let success_rate = 1.0 - depleted as f64 / trials.len() as f64;

    let mut envelope = PercentileBands {
        p10: Vec::with_capacity(steps_total),
        p50: Vec::with_capacity(steps_total),
        p90: Vec::with_capacity(steps_total),
    };
    let mut column = Vec::with_capacity(trials.len());
    for step in 0..steps_total {
        column.clear();
        column.extend(trials.iter().map(|t| t.path[step]));
        column.sort_by(f64::total_cmp);
        envelope.p10.push(percentile(&column, 10.0));
        envelope.p50.push(percentile(&column, 50.0));
        envelope.p90.push(percentile(&column, 90.0));
    }

    let mut terminals: Vec<f64> = trials.iter().map(|t| t.terminal).collect();
    terminals.sort_by(f64::total_cmp);
    let terminal = TerminalStats {
        p10: percentile(&terminals, 10.0),
        median: percentile(&terminals, 50.0),
        p90: percentile(&terminals, 90.0),
    };

    debug!(
        trials = trials.len(),
        steps = steps_total,
        success_rate,
        "monte carlo run complete"
    );

    let paths = config
        .collect_paths
        .then(|| trials.into_iter().map(|t| t.path).collect());

    Ok(MonteCarloSummary {
        trials: config.trials,
        granularity,
        success_rate,
        ages,
        envelope,
        terminal,
        paths,
    })
}
