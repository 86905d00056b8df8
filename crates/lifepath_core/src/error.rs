use std::fmt;

/// Errors in the person/assumption configuration.
///
/// These are fatal and must surface before any stepping begins; the
/// simulation loop itself never raises them mid-run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Neither a birthdate nor a current age is present on the person.
    MissingAge,
    /// An event carries `reset.assumptions = "base"` but the plan has no
    /// pre-scenario baseline snapshot to revert to.
    MissingBaseAssumptions,
    NonFiniteAssumption { field: &'static str, value: f64 },
    InvalidStopAge(f64),
    InvalidTaxRate(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingAge => {
                write!(f, "person needs a birthdate or a current_age")
            }
            ConfigError::MissingBaseAssumptions => {
                write!(
                    f,
                    "reset.assumptions=\"base\" requires base assumptions on the plan"
                )
            }
            ConfigError::NonFiniteAssumption { field, value } => {
                write!(f, "assumption {field} is not finite: {value}")
            }
            ConfigError::InvalidStopAge(age) => write!(f, "invalid stop_age: {age}"),
            ConfigError::InvalidTaxRate(rate) => write!(f, "invalid total_tax_rate: {rate}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors raised while resolving event timing into the ordered timeline.
///
/// Timeline order is required by every downstream stage, so any of these
/// aborts the whole profile+scenario run with no partial results.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineError {
    /// An event has an empty name. Names are required for offset chaining.
    MissingName,
    /// Duplicate event names make `offset.from` references ambiguous.
    DuplicateNames(Vec<String>),
    /// The event carries no time specification at all.
    MissingTimeSpec { event: String },
    InvalidMonth { event: String, month: u8 },
    /// An age-based event would fire before the simulation start.
    EventBeforeStart { event: String, age: f64 },
    /// An offset event with an empty `from` reference.
    MissingOffsetBase { event: String },
    /// `offset.from` names an event that does not exist.
    UnknownReference { event: String, from: String },
    /// Offset events left unresolved after propagation: a cycle, or a
    /// chain rooted on an unresolvable base. Pairs are `(event, from)`.
    UnresolvedOffsets(Vec<(String, String)>),
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineError::MissingName => {
                write!(f, "each life event must have a non-empty name")
            }
            TimelineError::DuplicateNames(names) => {
                write!(
                    f,
                    "duplicate life event names not allowed: {names:?}; \
                     names must be unique so offset.from is unambiguous"
                )
            }
            TimelineError::MissingTimeSpec { event } => {
                write!(
                    f,
                    "life event '{event}' must include one of: month index, \
                     year/month, age, date, or offset"
                )
            }
            TimelineError::InvalidMonth { event, month } => {
                write!(f, "life event '{event}' month must be in 1..=12, got {month}")
            }
            TimelineError::EventBeforeStart { event, age } => {
                write!(
                    f,
                    "life event '{event}' at age {age} occurs before simulation start"
                )
            }
            TimelineError::MissingOffsetBase { event } => {
                write!(f, "life event '{event}' has an offset but no offset.from")
            }
            TimelineError::UnknownReference { event, from } => {
                write!(
                    f,
                    "life event '{event}' offset.from '{from}' does not exist \
                     (check spelling / uniqueness)"
                )
            }
            TimelineError::UnresolvedOffsets(pairs) => {
                write!(
                    f,
                    "could not resolve offset events (cycle or missing base time); \
                     unresolved: {pairs:?}"
                )
            }
        }
    }
}

impl std::error::Error for TimelineError {}

/// Errors raised by the snapshot normalizer.
///
/// Both variants indicate an upstream contract violation: normalization
/// requires the timeline resolver's sorted, fully-resolved output.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    Unresolved { event: String },
    OutOfOrder { event: String, t_month: i32, previous: i32 },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::Unresolved { event } => {
                write!(f, "life event '{event}' has no resolved time; run the timeline resolver first")
            }
            NormalizeError::OutOfOrder {
                event,
                t_month,
                previous,
            } => {
                write!(
                    f,
                    "life events must be in ascending time order: \
                     '{event}' at month {t_month} follows month {previous}"
                )
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Any error that can abort preparing or running a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    Config(ConfigError),
    Timeline(TimelineError),
    Normalize(NormalizeError),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::Config(e) => write!(f, "{e}"),
            PlanError::Timeline(e) => write!(f, "{e}"),
            PlanError::Normalize(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PlanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlanError::Config(e) => Some(e),
            PlanError::Timeline(e) => Some(e),
            PlanError::Normalize(e) => Some(e),
        }
    }
}

impl From<ConfigError> for PlanError {
    fn from(e: ConfigError) -> Self {
        PlanError::Config(e)
    }
}

impl From<TimelineError> for PlanError {
    fn from(e: TimelineError) -> Self {
        PlanError::Timeline(e)
    }
}

impl From<NormalizeError> for PlanError {
    fn from(e: NormalizeError) -> Self {
        PlanError::Normalize(e)
    }
}
