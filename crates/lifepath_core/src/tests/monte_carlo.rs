//! Tests for the Monte Carlo core
//!
//! These tests verify that:
//! - Zero variance collapses the Gaussian sampler onto the deterministic
//!   stepper's expected-scenario terminal value
//! - Forced shocks override the sampled return on their exact month
//! - Depletion freezes a trial's path at zero and drives the success rate
//! - Runs are reproducible from the base seed, trial by trial

use crate::model::{EventTime, Granularity, LifeEvent, Scenario};
use crate::monte_carlo::{
    ForcedShockSampler, GaussianSampler, MarketShock, MonteCarloConfig, ShockKind, monte_carlo,
    percentile,
};
use crate::simulation::simulate;
use crate::tests::support::{base_plan, money, portfolio_of, prepared};

fn config(trials: usize, seed: u64) -> MonteCarloConfig {
    MonteCarloConfig {
        trials,
        seed,
        collect_paths: true,
    }
}

#[test]
fn test_percentile_linear_interpolation() {
    let sorted = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(percentile(&sorted, 0.0), 1.0);
    assert_eq!(percentile(&sorted, 50.0), 2.5);
    assert_eq!(percentile(&sorted, 100.0), 4.0);

    let ten: Vec<f64> = (0..10).map(f64::from).collect();
    assert!((percentile(&ten, 10.0) - 0.9).abs() < 1e-12);
    assert!((percentile(&ten, 90.0) - 8.1).abs() < 1e-12);

    assert_eq!(percentile(&[7.0], 42.0), 7.0);
    assert!(percentile(&[], 50.0).is_nan());
}

#[test]
fn test_zero_variance_collapses_to_deterministic() {
    let mut plan = base_plan();
    plan.person.stop_age = 42.0;
    plan.assumptions.variance = 0.0;
    let plan = prepared(plan);

    let deterministic = simulate(&plan).unwrap();
    let expected_terminal = deterministic
        .scenario(Scenario::Expected)
        .unwrap()
        .terminal_portfolio()
        .unwrap();

    let summary = monte_carlo(&plan, &GaussianSampler, &config(8, 7)).unwrap();

    assert_eq!(summary.success_rate, 1.0);
    assert!((summary.terminal.p10 - expected_terminal).abs() < 1e-6);
    assert!((summary.terminal.median - expected_terminal).abs() < 1e-6);
    assert!((summary.terminal.p90 - expected_terminal).abs() < 1e-6);
    assert!((summary.envelope.p50.last().unwrap() - expected_terminal).abs() < 1e-6);
}

#[test]
fn test_forced_shock_overrides_sampled_return() {
    let mut plan = base_plan();
    plan.person.stop_age = 41.0;
    plan.assumptions.variance = 0.0;
    plan.income.clear();
    plan.expenses.breakdown.clear();
    let plan = prepared(plan);

    // 2026-06 is step index 5 from the 2026-01 anchor.
    let sampler = ForcedShockSampler::new([MarketShock {
        year: 2026,
        month: 6,
        kind: ShockKind::Drop(0.3),
    }]);
    let summary = monte_carlo(&plan, &sampler, &config(2, 11)).unwrap();

    let path = summary.sample_path().unwrap();
    let shocked = path[5] / path[4] - 1.0;
    assert!(
        (shocked + 0.3).abs() < 1e-12,
        "shocked month return was {shocked}, want -0.3"
    );

    // Every other month compounds at the deterministic step rate.
    let r = Granularity::Monthly.step_rate(0.06);
    let normal = path[7] / path[6] - 1.0;
    assert!((normal - r).abs() < 1e-12);
}

#[test]
fn test_shock_kind_conversions() {
    assert_eq!(ShockKind::Return(-0.35).as_return(), -0.35);
    assert_eq!(ShockKind::Drop(0.3).as_return(), -0.3);
    assert_eq!(ShockKind::Drop(-0.3).as_return(), -0.3);
}

#[test]
fn test_depletion_freezes_path_and_fails_trial() {
    let mut plan = base_plan();
    plan.person.stop_age = 45.0;
    plan.assumptions.variance = 0.0;
    plan.income.clear();
    plan.expenses.breakdown = money(&[("living", 5000.0)]);
    plan.expenses.total_tax_rate = 0.0;
    plan.portfolio = portfolio_of(10_000.0);
    let plan = prepared(plan);

    let summary = monte_carlo(&plan, &GaussianSampler, &config(4, 3)).unwrap();
    assert_eq!(summary.success_rate, 0.0);
    assert_eq!(summary.terminal.median, 0.0);

    for path in summary.paths.as_ref().unwrap() {
        let first_zero = path.iter().position(|&v| v == 0.0).unwrap();
        assert!(path[first_zero..].iter().all(|&v| v == 0.0));
    }
}

#[test]
fn test_healthy_plan_succeeds() {
    let mut plan = base_plan();
    plan.person.stop_age = 45.0;
    let plan = prepared(plan);
    let summary = monte_carlo(&plan, &GaussianSampler, &config(16, 9)).unwrap();
    assert_eq!(summary.success_rate, 1.0);
    for step in 0..summary.ages.len() {
        assert!(summary.envelope.p10[step] <= summary.envelope.p90[step]);
    }
}

#[test]
fn test_reproducible_from_base_seed() {
    let mut plan = base_plan();
    plan.person.stop_age = 43.0;
    let plan = prepared(plan);

    let a = monte_carlo(&plan, &GaussianSampler, &config(16, 42)).unwrap();
    let b = monte_carlo(&plan, &GaussianSampler, &config(16, 42)).unwrap();
    assert_eq!(a.envelope, b.envelope);
    assert_eq!(a.terminal, b.terminal);
    assert_eq!(a.paths, b.paths);

    let c = monte_carlo(&plan, &GaussianSampler, &config(16, 43)).unwrap();
    assert_ne!(a.terminal.median, c.terminal.median);
}

#[test]
fn test_path_matrix_shape_and_sample_path() {
    let mut plan = base_plan();
    plan.person.stop_age = 41.0;
    let plan = prepared(plan);

    let summary = monte_carlo(&plan, &GaussianSampler, &config(5, 1)).unwrap();
    let paths = summary.paths.as_ref().unwrap();
    assert_eq!(paths.len(), 5);
    assert!(paths.iter().all(|p| p.len() == 13));
    assert_eq!(summary.ages.len(), 13);
    assert_eq!(summary.sample_path().unwrap(), paths[0].as_slice());

    let no_paths = monte_carlo(
        &plan,
        &GaussianSampler,
        &MonteCarloConfig {
            trials: 5,
            seed: 1,
            collect_paths: false,
        },
    )
    .unwrap();
    assert!(no_paths.paths.is_none());
    assert_eq!(no_paths.sample_path(), None);
}

#[test]
fn test_events_apply_inside_trials() {
    let mut depleting = base_plan();
    depleting.person.stop_age = 45.0;
    depleting.assumptions.variance = 0.0;
    depleting.income.clear();
    depleting.expenses.breakdown = money(&[("living", 5000.0)]);
    depleting.expenses.total_tax_rate = 0.0;
    depleting.portfolio = portfolio_of(50_000.0);

    let mut rescued = depleting.clone();
    let mut ev = LifeEvent::new("windfall-job", EventTime::Month(3));
    ev.updated_income = money(&[("salary", 6000.0)]);
    rescued.events = vec![ev];

    let without = monte_carlo(&prepared(depleting), &GaussianSampler, &config(4, 5)).unwrap();
    let with = monte_carlo(&prepared(rescued), &GaussianSampler, &config(4, 5)).unwrap();

    assert_eq!(without.success_rate, 0.0);
    assert_eq!(with.success_rate, 1.0);
}

#[test]
fn test_yearly_granularity_matches_deterministic() {
    let mut plan = base_plan();
    plan.person.stop_age = 45.0;
    plan.granularity = Granularity::Yearly;
    plan.assumptions.variance = 0.0;
    let plan = prepared(plan);

    let deterministic = simulate(&plan).unwrap();
    let expected_terminal = deterministic
        .scenario(Scenario::Expected)
        .unwrap()
        .terminal_portfolio()
        .unwrap();

    let summary = monte_carlo(&plan, &GaussianSampler, &config(3, 2)).unwrap();
    assert_eq!(summary.ages.len(), 6);
    assert!((summary.terminal.median - expected_terminal).abs() < 1e-6);
}

#[test]
fn test_zero_trials_returns_empty_summary() {
    let plan = prepared(base_plan());
    let summary = monte_carlo(&plan, &GaussianSampler, &config(0, 0)).unwrap();
    assert_eq!(summary.trials, 0);
    assert_eq!(summary.success_rate, 1.0);
    assert!(summary.envelope.p50.is_empty());
    assert_eq!(summary.paths.as_deref(), Some(&[][..]));
}
