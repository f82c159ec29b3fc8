//! Bounded dry runs that predict when a program halts without touching live state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::machine::{apply, first_applicable};
use crate::primes::PrimeExponentMap;
use crate::types::Program;

/// Result of a bounded dry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Forecast {
    /// The program halts after exactly this many transitions.
    Halts(u64),
    /// The program did not halt within `limit` transitions. This is a lower bound,
    /// not a proof that it runs forever.
    Unknown { limit: u64 },
}

impl Forecast {
    /// Returns the halting step, if one was found.
    pub fn halt_step(&self) -> Option<u64> {
        match self {
            Forecast::Halts(steps) => Some(*steps),
            Forecast::Unknown { .. } => None,
        }
    }
}

impl fmt::Display for Forecast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forecast::Halts(steps) => write!(f, "halts after {steps} steps"),
            Forecast::Unknown { limit } => write!(f, "still running after {limit} steps"),
        }
    }
}

/// Applies the transition function to a scratch copy of `registers` until no fraction
/// applies or `limit` transitions have been performed.
///
/// A program that halts after exactly `limit` transitions is reported as unknown.
pub fn forecast_halt_step(registers: &PrimeExponentMap, program: &Program, limit: u64) -> Forecast {
    let mut current = registers.clone();
    let mut steps = 0;

    while steps < limit {
        match first_applicable(&current, program) {
            Some(index) => {
                current = apply(&current, &program.fractions()[index]);
                steps += 1;
            }
            None => return Forecast::Halts(steps),
        }
    }

    Forecast::Unknown { limit }
}
