//! Event timing resolution.
//!
//! Converts the heterogeneous time specifications on life events
//! (explicit month index, year/month, age, legacy absolute date, offsets
//! from other named events) into a single absolute month index per event,
//! fills in the derived calendar date, and sorts the list ascending.
//!
//! Offset references form a dependency graph resolved by topological
//! propagation: whenever an event's month is known, every event offset
//! from it resolves in turn. Whatever remains unresolved afterwards is a
//! cycle or a chain rooted on a missing base, and fails as one error
//! naming the offenders.

use jiff::civil::Date;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::TimelineError;
use crate::model::{EventTime, LifeEvent};
use crate::month_math;

/// Resolve every event's `t_month` and `date` and sort by `t_month`.
///
/// `anchor` must be the first-of-month simulation start; `start_age` is
/// the household age at the anchor. Events with equal month indexes keep
/// their insertion order.
pub fn resolve(
    events: &mut [LifeEvent],
    anchor: Date,
    start_age: f64,
) -> Result<(), TimelineError> {
    validate_names(events)?;

    // Direct forms first; offsets wait for their base.
    for ev in events.iter_mut() {
        let tm = match &ev.time {
            None => {
                return Err(TimelineError::MissingTimeSpec {
                    event: ev.name.clone(),
                });
            }
            Some(EventTime::Offset { .. }) => continue,
            Some(EventTime::Month(tm)) => *tm,
            Some(EventTime::YearMonth { year, month }) => {
                if !(1..=12).contains(month) {
                    return Err(TimelineError::InvalidMonth {
                        event: ev.name.clone(),
                        month: *month,
                    });
                }
                *year as i32 * 12 + (i32::from(*month) - 1)
            }
            Some(EventTime::Age(age)) => {
                let tm = ((age - start_age) * 12.0).round() as i32;
                if tm < 0 {
                    return Err(TimelineError::EventBeforeStart {
                        event: ev.name.clone(),
                        age: *age,
                    });
                }
                tm
            }
            // A date before the anchor yields a negative index; such an
            // event sorts first and never fires.
            Some(EventTime::Date(d)) => {
                month_math::months_between(anchor, month_math::first_of_month(*d))
            }
        };
        ev.t_month = Some(tm);
    }

    resolve_offsets(events)?;

    for ev in events.iter_mut() {
        let tm = ev.t_month.ok_or_else(|| TimelineError::MissingTimeSpec {
            event: ev.name.clone(),
        })?;
        ev.date = Some(month_math::add_months(anchor, tm));
    }

    events.sort_by_key(|ev| ev.t_month);
    debug!(events = events.len(), "resolved event timeline");
    Ok(())
}

fn validate_names(events: &[LifeEvent]) -> Result<(), TimelineError> {
    let mut seen = FxHashSet::default();
    let mut dupes: Vec<String> = Vec::new();
    for ev in events {
        let name = ev.name.trim();
        if name.is_empty() {
            return Err(TimelineError::MissingName);
        }
        if !seen.insert(name.to_owned()) && !dupes.iter().any(|d| d == name) {
            dupes.push(name.to_owned());
        }
    }
    if !dupes.is_empty() {
        dupes.sort();
        return Err(TimelineError::DuplicateNames(dupes));
    }
    Ok(())
}

/// Topological propagation over the offset dependency graph.
fn resolve_offsets(events: &mut [LifeEvent]) -> Result<(), TimelineError> {
    let index: FxHashMap<String, usize> = events
        .iter()
        .enumerate()
        .map(|(i, ev)| (ev.name.trim().to_owned(), i))
        .collect();

    // dependents[base] = offset events waiting on base's month index.
    let mut dependents: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    let mut ready: Vec<usize> = Vec::new();
    let mut pending = 0usize;

    for (i, ev) in events.iter().enumerate() {
        if ev.t_month.is_some() {
            ready.push(i);
            continue;
        }
        if let Some(EventTime::Offset { from, .. }) = &ev.time {
            let from = from.trim();
            if from.is_empty() {
                return Err(TimelineError::MissingOffsetBase {
                    event: ev.name.clone(),
                });
            }
            let Some(&base) = index.get(from) else {
                return Err(TimelineError::UnknownReference {
                    event: ev.name.clone(),
                    from: from.to_owned(),
                });
            };
            dependents.entry(base).or_default().push(i);
            pending += 1;
        }
    }

    while let Some(base) = ready.pop() {
        let Some(base_tm) = events[base].t_month else {
            continue;
        };
        let Some(deps) = dependents.remove(&base) else {
            continue;
        };
        for dep in deps {
            let (years, months) = match &events[dep].time {
                Some(EventTime::Offset { years, months, .. }) => (*years, *months),
                _ => continue,
            };
            events[dep].t_month = Some(base_tm + years * 12 + months);
            pending -= 1;
            ready.push(dep);
        }
    }

    if pending > 0 {
        let unresolved: Vec<(String, String)> = events
            .iter()
            .filter(|ev| ev.t_month.is_none())
            .filter_map(|ev| match &ev.time {
                Some(EventTime::Offset { from, .. }) => {
                    Some((ev.name.clone(), from.clone()))
                }
                _ => None,
            })
            .collect();
        return Err(TimelineError::UnresolvedOffsets(unresolved));
    }
    Ok(())
}
