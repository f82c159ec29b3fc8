//! This crate provides the core logic for a FRACTRAN execution engine.
//! It includes modules for parsing FRACTRAN programs, stepping and forecasting their
//! execution, recording a scrubbable history, animating individual transitions,
//! detecting notable events and managing a collection of predefined programs.

pub mod analyzer;
pub mod animation;
pub mod events;
pub mod forecast;
pub mod history;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod primes;
pub mod programs;
pub mod simulator;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the `analyze` function and `AnalysisError` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisError};
/// Re-exports the animation state machine and its phases.
pub use animation::{AnimationController, AnimationPhase, AnimationSnapshot, Completion};
/// Re-exports the event detection registry and log.
pub use events::{Detection, Detector, DetectorRegistry, EventLog};
/// Re-exports the forecast engine.
pub use forecast::{forecast_halt_step, Forecast};
/// Re-exports the bounded history log.
pub use history::History;
/// Re-exports the `ProgramLoader` struct from the loader module.
pub use loader::ProgramLoader;
/// Re-exports the transition function.
pub use machine::{apply, can_apply, first_applicable, step};
/// Re-exports the parsing entry points.
pub use parser::{parse, parse_fraction, parse_program};
pub use primes::{is_prime, PrimeExponentMap, MAX_EXPONENT, PRIMES};
/// Re-exports `PresetInfo`, `PresetManager`, and `PRESETS` from the programs module.
pub use programs::{PresetInfo, PresetManager, PRESETS};
pub use simulator::Simulator;
/// Re-exports the data types shared across the engine.
pub use types::{
    EventKind, Fraction, FractranError, InvalidEdit, LoadOptions, MachineState, Preset, Program,
    SimulationEvent, SimulatorConfig, MAX_PROGRAM_SIZE,
};
