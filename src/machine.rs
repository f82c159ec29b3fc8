//! This module implements the FRACTRAN transition function: the applicability test, rule
//! application, single-step transition and value reconstruction.

use num_bigint::BigUint;

use crate::primes::PrimeExponentMap;
use crate::types::{Fraction, MachineState, Program};

/// Returns `true` if `fraction` can be applied to `registers`.
///
/// The current value must contain every prime factor of the denominator with at least
/// the required multiplicity. A denominator of 1 is always applicable.
pub fn can_apply(registers: &PrimeExponentMap, fraction: &Fraction) -> bool {
    registers.dominates(&fraction.denominator_factors)
}

/// Multiplies `registers` by `fraction`: removes the denominator's factors, then adds
/// the numerator's.
///
/// Callers must check `can_apply` first; this function does not re-validate.
pub fn apply(registers: &PrimeExponentMap, fraction: &Fraction) -> PrimeExponentMap {
    let mut next = registers.clone();
    next.subtract(&fraction.denominator_factors);
    next.add(&fraction.numerator_factors);
    next
}

/// Returns the index of the first fraction, in program order, applicable to `registers`.
pub fn first_applicable(registers: &PrimeExponentMap, program: &Program) -> Option<usize> {
    program.iter().position(|f| can_apply(registers, f))
}

/// Computes the successor of `state`.
///
/// Applies the first applicable fraction, incrementing the step counter. When no fraction
/// applies, the result keeps the registers and step count and is marked halted, so
/// stepping a halted state yields the same halted state.
pub fn step(state: &MachineState, program: &Program) -> MachineState {
    match first_applicable(&state.registers, program) {
        Some(index) => MachineState {
            registers: apply(&state.registers, &program.fractions()[index]),
            step: state.step + 1,
            last_rule_index: Some(index),
            halted: false,
        },
        None => MachineState {
            registers: state.registers.clone(),
            step: state.step,
            last_rule_index: None,
            halted: true,
        },
    }
}

/// Reconstructs the integer denoted by `registers`. For display only.
pub fn value(registers: &PrimeExponentMap) -> BigUint {
    registers.value()
}
