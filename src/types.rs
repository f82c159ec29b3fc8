//! This module defines the core data structures and types used throughout the FRACTRAN
//! engine, including fractions, programs, machine states, events, configuration and errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::primes::PrimeExponentMap;
use crate::Rule;

/// The maximum allowed size for a program file in bytes.
pub const MAX_PROGRAM_SIZE: usize = 65536; // 64KB
/// Default number of states retained for scrubbing.
pub const MAX_HISTORY_DEFAULT: usize = 2000;
/// Default number of entries retained in the event log.
pub const MAX_EVENTS_DEFAULT: usize = 2000;
/// Speed above which playback skips the animated phases.
pub const INSTANT_SPEED_THRESHOLD: u32 = 90;
/// Default number of transitions simulated when forecasting a halt.
pub const FORECAST_LIMIT: u64 = 5000;
/// Default playback speed.
pub const DEFAULT_SPEED: u32 = 10;
/// Lowest accepted playback speed.
pub const MIN_SPEED: u32 = 1;
/// Highest accepted playback speed.
pub const MAX_SPEED: u32 = 100;

/// A single FRACTRAN instruction.
///
/// The fraction is kept exactly as authored: no reduction is performed, so `6/4`
/// requires two 2s and produces one 2 and one 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fraction {
    pub numerator: u64,
    pub denominator: u64,
    pub numerator_factors: PrimeExponentMap,
    pub denominator_factors: PrimeExponentMap,
    /// Identity token for keying rows in a view. Carries no semantics.
    pub id: String,
}

impl Fraction {
    /// Creates a fraction and precomputes the factorizations of both parts.
    pub fn new(numerator: u64, denominator: u64, id: impl Into<String>) -> Self {
        Self {
            numerator,
            denominator,
            numerator_factors: PrimeExponentMap::factorize(numerator),
            denominator_factors: PrimeExponentMap::factorize(denominator),
            id: id.into(),
        }
    }
}

impl PartialEq for Fraction {
    fn eq(&self, other: &Self) -> bool {
        self.numerator == other.numerator && self.denominator == other.denominator
    }
}

impl Eq for Fraction {}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// An ordered list of fractions. Rule selection always scans from index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    fractions: Vec<Fraction>,
}

impl Program {
    pub fn new(fractions: Vec<Fraction>) -> Self {
        Self { fractions }
    }

    pub fn fractions(&self) -> &[Fraction] {
        &self.fractions
    }

    pub fn get(&self, index: usize) -> Option<&Fraction> {
        self.fractions.get(index)
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fraction> {
        self.fractions.iter()
    }

    /// Returns the program in its source form, one `"N/D"` string per rule.
    pub fn sources(&self) -> Vec<String> {
        self.fractions.iter().map(ToString::to_string).collect()
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Fraction;
    type IntoIter = std::slice::Iter<'a, Fraction>;

    fn into_iter(self) -> Self::IntoIter {
        self.fractions.iter()
    }
}

/// One snapshot of the machine. Immutable once produced by the transition function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub registers: PrimeExponentMap,
    pub step: u64,
    /// Index of the rule applied to reach this state; `None` for roots and halted states.
    pub last_rule_index: Option<usize>,
    pub halted: bool,
}

impl MachineState {
    /// Creates the step-0 state for the given registers.
    pub fn root(registers: PrimeExponentMap) -> Self {
        Self {
            registers,
            step: 0,
            last_rule_index: None,
            halted: false,
        }
    }
}

/// Classification of a `SimulationEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Manually logged messages such as "Loaded." or "Reset.".
    Info,
    /// The machine reached a state where no rule applies.
    Halted,
    /// Registers reduced to a power of two greater than 2.
    PowerOfTwo,
    /// Only registers 2 and 3 are non-empty.
    FibonacciPair,
    /// A detector registered by the embedding application.
    Custom(String),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Info => write!(f, "info"),
            EventKind::Halted => write!(f, "halted"),
            EventKind::PowerOfTwo => write!(f, "power-of-two"),
            EventKind::FibonacciPair => write!(f, "fibonacci-pair"),
            EventKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    /// Unrecognised names become `Custom` kinds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "info" => EventKind::Info,
            "halt" | "halted" => EventKind::Halted,
            "power-of-two" => EventKind::PowerOfTwo,
            "fibonacci-pair" | "fibonacci" => EventKind::FibonacciPair,
            _ => EventKind::Custom(s.to_string()),
        })
    }
}

/// An entry in the event log, stamped with the step of the state that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    pub step: u64,
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Options applied when loading a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Primes whose registers may be edited at step 0.
    pub editable_primes: Vec<u64>,
    /// Event kinds evaluated on each transition, in evaluation order.
    pub enabled_events: Vec<EventKind>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            editable_primes: Vec::new(),
            enabled_events: vec![EventKind::Halted],
        }
    }
}

/// A named program together with its initial configuration, as read from a `.frac` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub description: Option<String>,
    pub program: Program,
    pub registers: PrimeExponentMap,
    pub editable: Vec<u64>,
    pub events: Vec<EventKind>,
}

impl Preset {
    /// Returns the load options described by this preset.
    pub fn options(&self) -> LoadOptions {
        LoadOptions {
            editable_primes: self.editable.clone(),
            enabled_events: self.events.clone(),
        }
    }
}

/// Tunables for a `Simulator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Maximum number of states retained for scrubbing.
    pub max_history: usize,
    /// Maximum number of events retained; the oldest are dropped first.
    pub max_events: usize,
    /// Number of transitions simulated before a forecast gives up.
    pub forecast_limit: u64,
    /// Playback speed at start, clamped to `MIN_SPEED..=MAX_SPEED`.
    pub initial_speed: u32,
    /// Speeds strictly above this value bypass the animated phases.
    pub instant_threshold: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_history: MAX_HISTORY_DEFAULT,
            max_events: MAX_EVENTS_DEFAULT,
            forecast_limit: FORECAST_LIMIT,
            initial_speed: DEFAULT_SPEED,
            instant_threshold: INSTANT_SPEED_THRESHOLD,
        }
    }
}

/// Represents various errors that can occur while loading or validating programs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FractranError {
    /// Indicates a malformed fraction or program file.
    #[error("Program parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// Indicates an error during the validation of a program's structure.
    #[error("Program validation error: {0}")]
    ValidationError(String),
    /// Indicates an error related to file system operations.
    #[error("File error: {0}")]
    FileError(String),
}

/// Why an `edit_register` call was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidEdit {
    #[error("registers can only be edited at step 0")]
    NotAtRoot,
    #[error("register {0} is not editable")]
    NotEditable(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_keeps_authored_form() {
        let fraction = Fraction::new(6, 4, "rule-0");

        assert_eq!(fraction.to_string(), "6/4");
        assert_eq!(fraction.numerator_factors.get(2), 1);
        assert_eq!(fraction.numerator_factors.get(3), 1);
        assert_eq!(fraction.denominator_factors.get(2), 2);
    }

    #[test]
    fn test_fraction_equality_ignores_id() {
        assert_eq!(Fraction::new(3, 2, "a"), Fraction::new(3, 2, "b"));
        assert_ne!(Fraction::new(3, 2, "a"), Fraction::new(6, 4, "a"));
    }

    #[test]
    fn test_program_sources() {
        let program = Program::new(vec![Fraction::new(3, 2, "a"), Fraction::new(1, 15, "b")]);
        assert_eq!(program.sources(), vec!["3/2", "1/15"]);
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_event_kind_names() {
        for kind in [
            EventKind::Info,
            EventKind::Halted,
            EventKind::PowerOfTwo,
            EventKind::FibonacciPair,
        ] {
            assert_eq!(kind.to_string().parse::<EventKind>().unwrap(), kind);
        }

        assert_eq!(
            "power_of_two".parse::<EventKind>().unwrap(),
            EventKind::PowerOfTwo
        );
        assert_eq!(
            "collatz".parse::<EventKind>().unwrap(),
            EventKind::Custom("collatz".to_string())
        );
    }

    #[test]
    fn test_event_kind_display_matches_serialized_name() {
        for kind in [
            EventKind::Info,
            EventKind::Halted,
            EventKind::PowerOfTwo,
            EventKind::FibonacciPair,
        ] {
            assert_eq!(serde_json::to_value(&kind).unwrap(), kind.to_string());
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = SimulationEvent {
            step: 19,
            kind: EventKind::PowerOfTwo,
            message: "2^2 (Prime found: 2)".to_string(),
            data: Some(serde_json::json!(2)),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "power-of-two");
        assert_eq!(json["data"], 2);

        let back: SimulationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: SimulatorConfig = serde_json::from_str(r#"{"max_history": 10}"#).unwrap();

        assert_eq!(config.max_history, 10);
        assert_eq!(config.max_events, MAX_EVENTS_DEFAULT);
        assert_eq!(config.forecast_limit, FORECAST_LIMIT);
        assert_eq!(config.initial_speed, DEFAULT_SPEED);
        assert_eq!(config.instant_threshold, INSTANT_SPEED_THRESHOLD);
    }

    #[test]
    fn test_error_display() {
        let error = FractranError::ValidationError("empty program".to_string());
        assert!(error.to_string().contains("empty program"));

        assert_eq!(
            InvalidEdit::NotEditable(7).to_string(),
            "register 7 is not editable"
        );
    }
}
