//! This module provides the parser for FRACTRAN programs, utilizing the `pest` crate.
//! It parses individual `"N/D"` fraction strings into a `Program`, and `.frac` program
//! files into a `Preset` carrying the program and its initial configuration.

use crate::{
    analyzer::analyze,
    primes::PrimeExponentMap,
    types::{EventKind, Fraction, FractranError, Preset, Program},
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::Pair,
    Parser as PestParser, Position, Span,
};
use pest_derive::Parser as PestParser;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Derives a `PestParser` for the FRACTRAN grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct FractranParser;

/// Distinguishes fraction ids across successive loads.
static LOAD_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Parses a sequence of `"N/D"` strings into a `Program`.
///
/// Numerators and denominators must be positive integers; each is factored once here.
/// A single malformed entry rejects the whole program.
///
/// # Arguments
///
/// * `sources` - The fractions in program order.
///
/// # Returns
///
/// * `Ok(Program)` if every fraction is well formed.
/// * `Err(FractranError::ParseError)` naming the first offending fraction otherwise.
pub fn parse_program<S: AsRef<str>>(sources: &[S]) -> Result<Program, FractranError> {
    let generation = LOAD_GENERATION.fetch_add(1, Ordering::Relaxed);

    sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            parse_fraction(source.as_ref(), format!("rule-{index}-{generation}")).map_err(|e| {
                match e {
                    FractranError::ParseError(inner) => FractranError::ParseError(Box::new(
                        inner.with_path(&format!("fraction {}", index + 1)),
                    )),
                    other => other,
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Program::new)
}

/// Parses a single `"N/D"` string into a `Fraction` with the given id.
pub fn parse_fraction(input: &str, id: impl Into<String>) -> Result<Fraction, FractranError> {
    let pair = FractranParser::parse(Rule::single_fraction, input.trim())
        .map_err(|e| FractranError::ParseError(e.into()))?
        .next()
        .ok_or_else(|| parse_error_message("Expected a fraction"))?;

    let (numerator, denominator) = parse_fraction_pair(pair)?;
    Ok(Fraction::new(numerator, denominator, id))
}

/// Parses a `.frac` program file into a `Preset`.
///
/// This is the main entry point for program files. The parsed preset is
/// automatically validated before being returned.
///
/// # Returns
///
/// * `Ok(Preset)` if the input is successfully parsed and validated.
/// * `Err(FractranError::ParseError)` if there are any syntax errors.
/// * `Err(FractranError::ValidationError)` if the preset fails validation.
pub fn parse(input: &str) -> Result<Preset, FractranError> {
    let root = FractranParser::parse(Rule::file, input.trim())
        .map_err(|e| FractranError::ParseError(e.into()))?
        .next()
        .ok_or_else(|| parse_error_message("Empty program file"))?;

    let preset = parse_file(root)?;

    analyze(&preset)?;

    Ok(preset)
}

/// Parses the top-level sections of a program file.
fn parse_file(pair: Pair<Rule>) -> Result<Preset, FractranError> {
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut fractions: Option<Vec<(u64, u64)>> = None;
    let mut registers: Option<PrimeExponentMap> = None;
    let mut editable: Option<Vec<u64>> = None;
    let mut events: Option<Vec<EventKind>> = None;
    let mut seen = HashSet::new();

    for p in pair.into_inner() {
        let span = p.as_span();
        let rule = p.as_rule();

        check_unique_rule(rule, span, &mut seen)?;

        match rule {
            Rule::name => name = Some(parse_text(p)),
            Rule::description => description = Some(parse_text(p)),
            Rule::fractions => fractions = Some(parse_fraction_list(p)?),
            Rule::registers | Rule::input => {
                check_exclusive_rule(&registers, &["registers", "input"], span)?;
                registers = Some(if rule == Rule::input {
                    parse_input(p)?
                } else {
                    parse_registers(p)?
                });
            }
            Rule::editable => editable = Some(parse_numbers(p)?),
            Rule::events => events = Some(parse_events(p)),
            _ => {} // EOI
        }
    }

    let name = check_required_rule(name, "name")?;
    let fractions = check_required_rule(fractions, "program")?;

    let generation = LOAD_GENERATION.fetch_add(1, Ordering::Relaxed);
    let program = Program::new(
        fractions
            .into_iter()
            .enumerate()
            .map(|(i, (n, d))| Fraction::new(n, d, format!("rule-{i}-{generation}")))
            .collect(),
    );

    Ok(Preset {
        name,
        description,
        program,
        registers: registers.unwrap_or_default(),
        editable: editable.unwrap_or_default(),
        events: events.unwrap_or_else(|| vec![EventKind::Halted]),
    })
}

/// Creates a `FractranError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> FractranError {
    FractranError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

/// Creates a span-less parse error for structurally impossible parse trees.
fn parse_error_message(msg: &str) -> FractranError {
    FractranError::ParseError(Box::new(Error::new_from_pos(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        Position::from_start(""),
    )))
}

/// Parses a positive integer from a `Pair<Rule::number>`.
fn parse_positive(pair: Pair<Rule>) -> Result<u64, FractranError> {
    let span = pair.as_span();
    let value = pair
        .as_str()
        .parse::<u64>()
        .map_err(|_| parse_error(&format!("Number too large: {}", pair.as_str()), span))?;

    if value == 0 {
        return Err(parse_error("Expected a positive integer", span));
    }

    Ok(value)
}

/// Parses numerator and denominator from a `Pair<Rule::fraction>`.
fn parse_fraction_pair(pair: Pair<Rule>) -> Result<(u64, u64), FractranError> {
    let span = pair.as_span();
    let mut numbers = pair.into_inner();

    match (numbers.next(), numbers.next()) {
        (Some(n), Some(d)) => Ok((parse_positive(n)?, parse_positive(d)?)),
        _ => Err(parse_error("Expected numerator/denominator", span)),
    }
}

/// Parses the `program:` section.
fn parse_fraction_list(pair: Pair<Rule>) -> Result<Vec<(u64, u64)>, FractranError> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::fraction)
        .map(parse_fraction_pair)
        .collect()
}

/// Parses the `registers:` section, where each entry is `p` or `p^e`.
fn parse_registers(pair: Pair<Rule>) -> Result<PrimeExponentMap, FractranError> {
    let span = pair.as_span();
    let mut entries = Vec::new();

    for power in pair.into_inner().filter(|p| p.as_rule() == Rule::power) {
        let power_span = power.as_span();
        let mut parts = power.into_inner();

        let prime = match parts.next() {
            Some(p) => parse_positive(p)?,
            None => return Err(parse_error("Expected a register", power_span)),
        };
        let exponent = match parts.next() {
            Some(e) => u32::try_from(parse_positive(e)?)
                .map_err(|_| parse_error("Exponent too large", power_span))?,
            None => 1,
        };

        entries.push((prime, exponent));
    }

    PrimeExponentMap::try_from_pairs(entries).map_err(|e| parse_error(&e.to_string(), span))
}

/// Parses the `input:` section, factoring the starting integer.
fn parse_input(pair: Pair<Rule>) -> Result<PrimeExponentMap, FractranError> {
    let span = pair.as_span();
    let number = pair
        .into_inner()
        .next()
        .ok_or_else(|| parse_error("Expected a number", span))?;

    Ok(PrimeExponentMap::factorize(parse_positive(number)?))
}

/// Parses a comma separated list of positive integers.
fn parse_numbers(pair: Pair<Rule>) -> Result<Vec<u64>, FractranError> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::number)
        .map(parse_positive)
        .collect()
}

/// Parses the `events:` section.
fn parse_events(pair: Pair<Rule>) -> Vec<EventKind> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::event_kind)
        .filter_map(|p| p.as_str().parse().ok())
        .collect()
}

/// Extracts the trimmed text of a `name:` or `description:` section.
fn parse_text(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Checks if a given section has already been declared.
fn check_unique_rule(
    rule: Rule,
    span: Span,
    seen: &mut HashSet<Rule>,
) -> Result<(), FractranError> {
    if rule == Rule::EOI {
        return Ok(());
    }

    if !seen.insert(rule) {
        return Err(parse_error(
            &format!("Duplicate \"{}:\" declaration", section_name(rule)),
            span,
        ));
    }

    Ok(())
}

/// Checks if an exclusive section (e.g., `registers` vs. `input`) has been violated.
fn check_exclusive_rule<T>(
    value: &Option<T>,
    names: &[&str],
    span: Span,
) -> Result<(), FractranError> {
    if value.is_some() {
        return Err(parse_error(
            &format!("Only one of {} is allowed", format_rules(names)),
            span,
        ));
    }

    Ok(())
}

/// Checks if a required section is present, returning an `Err` if it's missing.
fn check_required_rule<T>(value: Option<T>, name: &str) -> Result<T, FractranError> {
    value.ok_or_else(|| FractranError::ValidationError(format!("Missing '{name}' section")))
}

/// Maps a grammar rule back to its keyword in the file format.
fn section_name(rule: Rule) -> &'static str {
    match rule {
        Rule::fractions => "program",
        Rule::name => "name",
        Rule::description => "description",
        Rule::registers => "registers",
        Rule::input => "input",
        Rule::editable => "editable",
        Rule::events => "events",
        _ => "section",
    }
}

/// Formats a list of section names into a human-readable string for error messages.
fn format_rules(names: &[&str]) -> String {
    names
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(" or ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_program() {
        let program = parse_program(&["3/2", " 5/3 ", "1/1"]).unwrap();

        assert_eq!(program.sources(), vec!["3/2", "5/3", "1/1"]);
        assert_eq!(program.get(0).unwrap().denominator_factors.get(2), 1);
        assert!(program.get(2).unwrap().denominator_factors.is_empty());
    }

    #[test]
    fn test_parse_program_does_not_reduce() {
        let program = parse_program(&["6/4"]).unwrap();
        let fraction = program.get(0).unwrap();

        assert_eq!((fraction.numerator, fraction.denominator), (6, 4));
        assert_eq!(fraction.denominator_factors.get(2), 2);
    }

    #[test]
    fn test_parse_program_ids_are_unique_per_load() {
        let first = parse_program(&["3/2", "5/3"]).unwrap();
        let second = parse_program(&["3/2", "5/3"]).unwrap();

        assert_ne!(first.get(0).unwrap().id, first.get(1).unwrap().id);
        assert_ne!(first.get(0).unwrap().id, second.get(0).unwrap().id);
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_malformed_fraction() {
        for source in ["3/x", "3", "/2", "3/2/1", "-3/2", "3.5/2", ""] {
            let result = parse_program(&["5/3", source]);
            assert!(
                matches!(result, Err(FractranError::ParseError(_))),
                "expected parse error for {source:?}"
            );
        }
    }

    #[test]
    fn test_parse_error_names_fraction() {
        let error = parse_program(&["5/3", "3/x"]).unwrap_err();
        assert!(error.to_string().contains("fraction 2"));
    }

    #[test]
    fn test_parse_zero_is_rejected() {
        let error = parse_program(&["0/3"]).unwrap_err();
        assert!(error.to_string().contains("positive"));

        assert!(parse_program(&["3/0"]).is_err());
    }

    #[test]
    fn test_parse_overflow_is_rejected() {
        let error = parse_program(&["99999999999999999999999/2"]).unwrap_err();
        assert!(error.to_string().contains("too large"));
    }

    #[test]
    fn test_parse_simple_file() {
        let input = r#"
# Moves every 2 into a 3
name: Addition
description: Adds register 2 into register 3
program: 3/2
registers: 2^3, 3^2
editable: 2, 3
"#;

        let preset = parse(input).unwrap();

        assert_eq!(preset.name, "Addition");
        assert_eq!(
            preset.description.as_deref(),
            Some("Adds register 2 into register 3")
        );
        assert_eq!(preset.program.sources(), vec!["3/2"]);
        assert_eq!(preset.registers, PrimeExponentMap::factorize(72));
        assert_eq!(preset.editable, vec![2, 3]);
        assert_eq!(preset.events, vec![EventKind::Halted]);
    }

    #[test]
    fn test_parse_multiline_program_and_events() {
        let input = r#"
name: PRIMEGAME
program: 17/91, 78/85, 19/51, 23/38, 29/33,
         77/29, 95/23, 77/19, 1/17, 11/13,
         13/11, 15/2, 1/7, 55/1
registers: 2
events: halt, power-of-two
"#;

        let preset = parse(input).unwrap();

        assert_eq!(preset.program.len(), 14);
        assert_eq!(preset.program.sources()[13], "55/1");
        assert_eq!(preset.registers.get(2), 1);
        assert_eq!(
            preset.events,
            vec![EventKind::Halted, EventKind::PowerOfTwo]
        );
    }

    #[test]
    fn test_parse_input_section() {
        let input = "name: Sums\nprogram: 1/15\ninput: 225";
        let preset = parse(input).unwrap();

        assert_eq!(preset.registers, PrimeExponentMap::factorize(225));
    }

    #[test]
    fn test_parse_duplicate_section() {
        let input = r#"
name: First Name
name: Second Name
program: 3/2
"#;
        let error = parse(input).unwrap_err();
        assert!(matches!(error, FractranError::ParseError(_)));
        assert!(error
            .to_string()
            .contains("Duplicate \"name:\" declaration"));
    }

    #[test]
    fn test_parse_exclusive_registers_and_input() {
        let input = "name: Both\nprogram: 3/2\nregisters: 2\ninput: 4";
        let error = parse(input).unwrap_err();
        assert!(error.to_string().contains("Only one of"));
    }

    #[test]
    fn test_parse_missing_name() {
        let error = parse("program: 3/2").unwrap_err();
        assert_eq!(
            error,
            FractranError::ValidationError("Missing 'name' section".to_string())
        );
    }

    #[test]
    fn test_parse_missing_program() {
        let error = parse("name: Nothing").unwrap_err();
        assert!(matches!(error, FractranError::ValidationError(_)));
    }

    #[test]
    fn test_parse_composite_register() {
        let error = parse("name: Bad\nprogram: 3/2\nregisters: 4^2").unwrap_err();
        assert!(matches!(error, FractranError::ParseError(_)));
        assert!(error.to_string().contains("not a prime"));
    }

    #[test]
    fn test_parse_malformed_file() {
        let result = parse("This is not a valid program");
        assert!(result.is_err());
    }
}
