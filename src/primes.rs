//! This module provides `PrimeExponentMap`, the canonical representation of a positive
//! integer as its prime factorization, together with trial-division factoring and
//! arbitrary-precision reconstruction for display.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::FractranError;

/// The first 50 primes, used to lay out register columns contiguously.
pub const PRIMES: [u64; 50] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229,
];

/// Returns `true` if `n` is a prime number.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }

    let mut d = 3;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }

    true
}

/// Largest exponent an edit can raise a register to. Running programs may grow past it.
pub const MAX_EXPONENT: u32 = 10_000;

/// A mapping from prime to strictly positive exponent.
///
/// Absent primes have exponent zero. Entries never hold a zero exponent and keys are
/// always prime, so two maps are equal exactly when the integers they denote are equal.
/// Exponents saturate at `u32::MAX`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u64, u32>", into = "BTreeMap<u64, u32>")]
pub struct PrimeExponentMap {
    factors: BTreeMap<u64, u32>,
}

impl PrimeExponentMap {
    /// Creates an empty map, which denotes the integer 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factors `n` by trial division.
    ///
    /// Both 0 and 1 yield the empty map; callers are expected to pass positive integers.
    pub fn factorize(n: u64) -> Self {
        let mut factors = BTreeMap::new();
        let mut rest = n;
        let mut d = 2;

        while rest > 1 && d <= rest / d {
            while rest % d == 0 {
                *factors.entry(d).or_insert(0) += 1;
                rest /= d;
            }
            d += if d == 2 { 1 } else { 2 };
        }

        if rest > 1 {
            *factors.entry(rest).or_insert(0) += 1;
        }

        Self { factors }
    }

    /// Builds a map from `(prime, exponent)` pairs.
    ///
    /// Zero exponents are dropped and repeated primes accumulate.
    ///
    /// # Returns
    ///
    /// * `Ok(PrimeExponentMap)` if every key is prime.
    /// * `Err(FractranError::ValidationError)` if a key with a positive exponent is not
    ///   prime, or a repeated prime overflows its exponent.
    pub fn try_from_pairs<I>(pairs: I) -> Result<Self, FractranError>
    where
        I: IntoIterator<Item = (u64, u32)>,
    {
        let mut factors = BTreeMap::new();

        for (prime, exponent) in pairs {
            if exponent == 0 {
                continue;
            }
            if !is_prime(prime) {
                return Err(FractranError::ValidationError(format!(
                    "Register {prime} is not a prime number"
                )));
            }
            let entry = factors.entry(prime).or_insert(0u32);
            *entry = entry.checked_add(exponent).ok_or_else(|| {
                FractranError::ValidationError(format!("Exponent of register {prime} overflows"))
            })?;
        }

        Ok(Self { factors })
    }

    /// Returns the exponent of `prime`, zero when absent.
    pub fn get(&self, prime: u64) -> u32 {
        self.factors.get(&prime).copied().unwrap_or(0)
    }

    /// Number of primes with a positive exponent.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Returns `true` when the map denotes the integer 1.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Iterates `(prime, exponent)` pairs in ascending prime order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.factors.iter().map(|(&p, &e)| (p, e))
    }

    /// Iterates the primes present, ascending.
    pub fn primes(&self) -> impl Iterator<Item = u64> + '_ {
        self.factors.keys().copied()
    }

    /// Returns `true` if every exponent required by `other` is available in `self`,
    /// i.e. the integer denoted by `other` divides the one denoted by `self`.
    pub fn dominates(&self, other: &PrimeExponentMap) -> bool {
        other
            .factors
            .iter()
            .all(|(prime, &required)| self.get(*prime) >= required)
    }

    /// Subtracts `other` entrywise, dropping entries that reach zero.
    ///
    /// Exponents saturate at zero; callers check `dominates` first.
    pub fn subtract(&mut self, other: &PrimeExponentMap) {
        for (&prime, &count) in &other.factors {
            if let Some(current) = self.factors.get_mut(&prime) {
                *current = current.saturating_sub(count);
                if *current == 0 {
                    self.factors.remove(&prime);
                }
            }
        }
    }

    /// Adds `other` entrywise, saturating at `u32::MAX`.
    pub fn add(&mut self, other: &PrimeExponentMap) {
        for (&prime, &count) in &other.factors {
            let entry = self.factors.entry(prime).or_insert(0);
            *entry = entry.saturating_add(count);
        }
    }

    /// Shifts the exponent of `prime` by `delta`, clamping at zero and at `MAX_EXPONENT`.
    ///
    /// An exponent already above `MAX_EXPONENT` is never raised further. The caller
    /// guarantees `prime` is prime.
    pub(crate) fn adjust(&mut self, prime: u64, delta: i64) {
        let current = self.get(prime);
        let ceiling = current.max(MAX_EXPONENT);
        let next = i64::from(current)
            .saturating_add(delta)
            .clamp(0, i64::from(ceiling));
        let next = u32::try_from(next).unwrap_or(ceiling);

        if next == 0 {
            self.factors.remove(&prime);
        } else {
            self.factors.insert(prime, next);
        }
    }

    /// Reconstructs the integer as the product of `prime^exponent` over all entries.
    pub fn value(&self) -> BigUint {
        self.factors
            .iter()
            .fold(BigUint::from(1u32), |acc, (&prime, &exponent)| {
                acc * BigUint::from(prime).pow(exponent)
            })
    }
}

impl TryFrom<BTreeMap<u64, u32>> for PrimeExponentMap {
    type Error = FractranError;

    /// Unlike `try_from_pairs`, a stored zero exponent is an error.
    fn try_from(factors: BTreeMap<u64, u32>) -> Result<Self, Self::Error> {
        if let Some(prime) = factors.iter().find(|(_, e)| **e == 0).map(|(p, _)| *p) {
            return Err(FractranError::ValidationError(format!(
                "Register {prime} has a zero exponent"
            )));
        }

        Self::try_from_pairs(factors)
    }
}

impl From<PrimeExponentMap> for BTreeMap<u64, u32> {
    fn from(map: PrimeExponentMap) -> Self {
        map.factors
    }
}

const SUPERSCRIPTS: [char; 10] = [
    '⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹',
];

fn superscript(n: u32) -> String {
    if n == 1 {
        return String::new();
    }

    n.to_string()
        .chars()
        .filter_map(|d| d.to_digit(10))
        .map(|d| SUPERSCRIPTS[d as usize])
        .collect()
}

impl fmt::Display for PrimeExponentMap {
    /// Formats as a product of prime powers, e.g. `2³ × 3²`, or `1` when empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "1");
        }

        let terms = self
            .iter()
            .map(|(prime, exponent)| format!("{prime}{}", superscript(exponent)))
            .collect::<Vec<_>>()
            .join(" × ");

        write!(f, "{terms}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prime() {
        let primes: Vec<u64> = (0..60).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, PRIMES[..17].to_vec());
        assert!(is_prime(229));
        assert!(!is_prime(221)); // 13 * 17
    }

    #[test]
    fn test_factorize_round_trip() {
        for n in 1..=2000u64 {
            let factors = PrimeExponentMap::factorize(n);
            assert_eq!(factors.value(), BigUint::from(n), "round trip failed for {n}");
            assert!(factors.primes().all(is_prime));
        }
    }

    #[test]
    fn test_factorize_large_prime() {
        let factors = PrimeExponentMap::factorize(1_000_000_007);
        assert_eq!(factors.get(1_000_000_007), 1);
        assert_eq!(factors.len(), 1);
    }

    #[test]
    fn test_try_from_pairs_rejects_composites() {
        let result = PrimeExponentMap::try_from_pairs([(2, 1), (9, 2)]);
        assert!(matches!(result, Err(FractranError::ValidationError(_))));

        // A composite with a zero exponent is simply absent
        let map = PrimeExponentMap::try_from_pairs([(2, 3), (9, 0)]).unwrap();
        assert_eq!(map, PrimeExponentMap::factorize(8));
    }

    #[test]
    fn test_dominates_and_arithmetic() {
        let mut regs = PrimeExponentMap::factorize(72); // 2^3 * 3^2
        let fifteen = PrimeExponentMap::factorize(15);
        let six = PrimeExponentMap::factorize(6);

        assert!(regs.dominates(&six));
        assert!(!regs.dominates(&fifteen));
        assert!(regs.dominates(&PrimeExponentMap::new()));

        regs.subtract(&six);
        assert_eq!(regs, PrimeExponentMap::factorize(12));

        regs.add(&fifteen);
        assert_eq!(regs, PrimeExponentMap::factorize(180));
    }

    #[test]
    fn test_subtract_removes_zeroed_entries() {
        let mut regs = PrimeExponentMap::factorize(6);
        regs.subtract(&PrimeExponentMap::factorize(2));
        assert_eq!(regs.primes().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_adjust_clamps_at_zero() {
        let mut regs = PrimeExponentMap::factorize(4);
        regs.adjust(2, -5);
        assert!(regs.is_empty());

        regs.adjust(3, 2);
        assert_eq!(regs.get(3), 2);
    }

    #[test]
    fn test_adjust_saturates_extreme_deltas() {
        let mut regs = PrimeExponentMap::factorize(2);
        regs.adjust(2, i64::MAX);
        assert_eq!(regs.get(2), MAX_EXPONENT);

        regs.adjust(2, i64::MIN);
        assert!(regs.is_empty());

        // Above the edit ceiling, lowering still works and raising is a no-op
        let mut big = PrimeExponentMap::try_from_pairs([(3, MAX_EXPONENT + 5)]).unwrap();
        big.adjust(3, 1);
        assert_eq!(big.get(3), MAX_EXPONENT + 5);
        big.adjust(3, -1);
        assert_eq!(big.get(3), MAX_EXPONENT + 4);
    }

    #[test]
    fn test_add_saturates() {
        let mut regs = PrimeExponentMap::try_from_pairs([(2, u32::MAX)]).unwrap();
        regs.add(&PrimeExponentMap::factorize(6));

        assert_eq!(regs.get(2), u32::MAX);
        assert_eq!(regs.get(3), 1);
    }

    #[test]
    fn test_try_from_pairs_rejects_exponent_overflow() {
        let result = PrimeExponentMap::try_from_pairs([(2, u32::MAX), (2, 1)]);
        assert!(matches!(result, Err(FractranError::ValidationError(_))));
    }

    #[test]
    fn test_value_beyond_u64() {
        let regs = PrimeExponentMap::try_from_pairs([(2, 100)]).unwrap();
        assert_eq!(regs.value(), BigUint::from(1u32) << 100usize);
    }

    #[test]
    fn test_display() {
        assert_eq!(PrimeExponentMap::new().to_string(), "1");
        assert_eq!(PrimeExponentMap::factorize(72).to_string(), "2³ × 3²");
        assert_eq!(PrimeExponentMap::factorize(2 * 1024 * 5).to_string(), "2¹¹ × 5");
    }

    #[test]
    fn test_serialization() {
        let regs = PrimeExponentMap::factorize(225);
        let json = serde_json::to_string(&regs).unwrap();
        assert_eq!(json, r#"{"3":2,"5":2}"#);

        let back: PrimeExponentMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, regs);
    }

    #[test]
    fn test_deserialize_rejects_malformed_maps() {
        assert!(serde_json::from_str::<PrimeExponentMap>(r#"{"9":1}"#).is_err());
        assert!(serde_json::from_str::<PrimeExponentMap>(r#"{"3":0}"#).is_err());
        assert!(serde_json::from_str::<PrimeExponentMap>(r#"{}"#).unwrap().is_empty());
    }
}
