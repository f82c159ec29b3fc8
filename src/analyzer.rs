//! This module provides functions for analyzing FRACTRAN presets to detect common errors
//! before execution. This includes checks for empty programs, non-prime editable registers
//! and rules that can never fire because an earlier rule always takes precedence.

use crate::types::{FractranError, Preset, Program};
use crate::primes::is_prime;

/// Represents various errors that can be found during the analysis of a preset.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// The program contains no fractions.
    EmptyProgram,
    /// Editable registers that are not prime numbers.
    NonPrimeEditable(Vec<u64>),
    /// Pairs `(shadowing, shadowed)` of rule indices. Whenever the shadowed rule's
    /// denominator divides the current value, so does the earlier one's.
    ShadowedRules(Vec<(usize, usize)>),
}

impl From<AnalysisError> for FractranError {
    /// Converts an `AnalysisError` into a `FractranError::ValidationError`.
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::EmptyProgram => {
                FractranError::ValidationError("Program has no fractions".to_string())
            }
            AnalysisError::NonPrimeEditable(registers) => FractranError::ValidationError(
                format!("Editable registers must be prime: {:?}", registers),
            ),
            AnalysisError::ShadowedRules(pairs) => {
                let described = pairs
                    .iter()
                    .map(|(by, rule)| format!("#{} by #{}", rule + 1, by + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                FractranError::ValidationError(format!("Rules can never fire: {described}"))
            }
        }
    }
}

/// Analyzes a given `Preset` for structural and logical errors.
///
/// # Returns
///
/// * `Ok(())` if no errors are found.
/// * `Err(FractranError::ValidationError)` describing the first violated check.
pub fn analyze(preset: &Preset) -> Result<(), FractranError> {
    let checks: [fn(&Preset) -> Result<(), AnalysisError>; 3] = [
        |p| check_not_empty(&p.program),
        check_editable_primes,
        |p| check_shadowed_rules(&p.program),
    ];

    checks
        .iter()
        .find_map(|check| check(preset).err())
        .map_or(Ok(()), |error| Err(error.into()))
}

/// Checks that the program contains at least one fraction.
pub fn check_not_empty(program: &Program) -> Result<(), AnalysisError> {
    if program.is_empty() {
        return Err(AnalysisError::EmptyProgram);
    }

    Ok(())
}

/// Checks that every editable register is a prime.
pub fn check_editable_primes(preset: &Preset) -> Result<(), AnalysisError> {
    let mut invalid: Vec<u64> = preset
        .editable
        .iter()
        .copied()
        .filter(|&p| !is_prime(p))
        .collect();

    if !invalid.is_empty() {
        invalid.sort_unstable();
        invalid.dedup();
        return Err(AnalysisError::NonPrimeEditable(invalid));
    }

    Ok(())
}

/// Checks for rules that can never be selected.
///
/// Rule `j` is unreachable when some earlier rule `i` has a denominator dividing `j`'s:
/// any value that satisfies `j` also satisfies `i`, and `i` is scanned first.
pub fn check_shadowed_rules(program: &Program) -> Result<(), AnalysisError> {
    let fractions = program.fractions();
    let shadowed: Vec<(usize, usize)> = fractions
        .iter()
        .enumerate()
        .filter_map(|(j, later)| {
            fractions[..j]
                .iter()
                .position(|earlier| {
                    later
                        .denominator_factors
                        .dominates(&earlier.denominator_factors)
                })
                .map(|i| (i, j))
        })
        .collect();

    if !shadowed.is_empty() {
        return Err(AnalysisError::ShadowedRules(shadowed));
    }

    Ok(())
}
