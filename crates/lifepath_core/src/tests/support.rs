//! Shared fixtures for the integration tests.

use std::collections::BTreeMap;

use crate::model::{Assumptions, Expenses, Granularity, Person, Plan, Portfolio};

pub(crate) fn money(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
}

pub(crate) fn portfolio_of(value: f64) -> Portfolio {
    Portfolio {
        breakdown: BTreeMap::from([(
            "cash".to_owned(),
            BTreeMap::from([("savings".to_owned(), value)]),
        )]),
    }
}

/// A 40 year old with a salary surplus, anchored at 2026-01.
pub(crate) fn base_plan() -> Plan {
    Plan {
        person: Person {
            birthdate: None,
            current_age: Some(40.0),
            stop_age: 70.0,
        },
        assumptions: Assumptions {
            expected_return: 0.06,
            variance: 0.02,
            inflation: 0.025,
        },
        base_assumptions: None,
        income: money(&[("salary", 5000.0)]),
        expenses: Expenses {
            breakdown: money(&[("rent", 2000.0)]),
            total_tax_rate: 0.2,
            ..Default::default()
        },
        portfolio: portfolio_of(100_000.0),
        start_date: jiff::civil::date(2026, 1, 1),
        granularity: Granularity::Monthly,
        events: vec![],
    }
}

pub(crate) fn prepared(mut plan: Plan) -> Plan {
    crate::prepare(&mut plan).expect("plan should prepare cleanly");
    plan
}
