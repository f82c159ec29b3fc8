//! Built-in FRACTRAN programs, embedded at compile time and parsed on first use.

use crate::types::{FractranError, Preset};

use std::sync::RwLock;
use tracing::warn;

// Default embedded programs
const PRESET_TEXTS: [&str; 8] = [
    include_str!("../presets/primegame.frac"),
    include_str!("../presets/fibonacci.frac"),
    include_str!("../presets/multiplication.frac"),
    include_str!("../presets/addition.frac"),
    include_str!("../presets/swap.frac"),
    include_str!("../presets/doubling.frac"),
    include_str!("../presets/clearing.frac"),
    include_str!("../presets/two-rules.frac"),
];

lazy_static::lazy_static! {
    pub static ref PRESETS: RwLock<Vec<Preset>> = RwLock::new(Vec::new());
}

pub struct PresetManager;

impl PresetManager {
    /// Parses the embedded presets and stores them, replacing whatever was loaded.
    pub fn load() -> Result<(), FractranError> {
        let mut presets = Vec::new();

        for (index, text) in PRESET_TEXTS.iter().enumerate() {
            match crate::parser::parse(text) {
                Ok(preset) => presets.push(preset),
                Err(e) => warn!(index, error = %e, "failed to parse embedded preset"),
            }
        }

        let mut write_guard = PRESETS
            .write()
            .map_err(|_| FractranError::FileError("Failed to acquire write lock".to_string()))?;
        *write_guard = presets;

        Ok(())
    }

    /// Loads the embedded presets unless that already happened.
    fn ensure_loaded() {
        let loaded = PRESETS.read().map(|p| !p.is_empty()).unwrap_or(false);
        if !loaded {
            if let Err(e) = Self::load() {
                warn!(error = %e, "failed to store embedded presets");
            }
        }
    }

    /// Get the number of available presets
    pub fn count() -> usize {
        Self::ensure_loaded();

        PRESETS.read().map(|presets| presets.len()).unwrap_or(0)
    }

    pub fn get_preset_by_index(index: usize) -> Result<Preset, FractranError> {
        Self::ensure_loaded();

        PRESETS
            .read()
            .map_err(|_| FractranError::FileError("Failed to acquire read lock".to_string()))?
            .get(index)
            .cloned()
            .ok_or_else(|| {
                FractranError::ValidationError(format!("Preset index {} out of range", index))
            })
    }

    /// Looks a preset up by name, ignoring case.
    pub fn get_preset_by_name(name: &str) -> Result<Preset, FractranError> {
        Self::ensure_loaded();

        PRESETS
            .read()
            .map_err(|_| FractranError::FileError("Failed to acquire read lock".to_string()))?
            .iter()
            .find(|preset| preset.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| FractranError::ValidationError(format!("Preset '{}' not found", name)))
    }

    pub fn list_preset_names() -> Vec<String> {
        Self::ensure_loaded();

        PRESETS
            .read()
            .map(|presets| presets.iter().map(|preset| preset.name.clone()).collect())
            .unwrap_or_else(|_| Vec::new())
    }

    /// Get summary information about a preset by its index
    pub fn get_preset_info(index: usize) -> Result<PresetInfo, FractranError> {
        let preset = Self::get_preset_by_index(index)?;

        Ok(PresetInfo {
            index,
            name: preset.name.clone(),
            description: preset.description.clone().unwrap_or_default(),
            initial_registers: preset.registers.to_string(),
            rule_count: preset.program.len(),
            editable_count: preset.editable.len(),
        })
    }

    /// Returns the indices of presets whose name or description contains `query`.
    pub fn search_presets(query: &str) -> Vec<usize> {
        Self::ensure_loaded();

        let query = query.to_lowercase();

        PRESETS
            .read()
            .map(|presets| {
                presets
                    .iter()
                    .enumerate()
                    .filter(|(_, preset)| {
                        preset.name.to_lowercase().contains(&query)
                            || preset
                                .description
                                .as_deref()
                                .is_some_and(|d| d.to_lowercase().contains(&query))
                    })
                    .map(|(index, _)| index)
                    .collect()
            })
            .unwrap_or_else(|_| Vec::new())
    }

    /// Get the source text of a preset by its index
    pub fn get_preset_text_by_index(index: usize) -> Result<&'static str, FractranError> {
        PRESET_TEXTS.get(index).copied().ok_or_else(|| {
            FractranError::ValidationError(format!("Preset text index {} out of range", index))
        })
    }
}

#[derive(Debug, Clone)]
pub struct PresetInfo {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub initial_registers: String,
    pub rule_count: usize,
    pub editable_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{forecast_halt_step, Forecast};
    use crate::primes::PrimeExponentMap;
    use crate::simulator::Simulator;
    use crate::types::{EventKind, SimulatorConfig, FORECAST_LIMIT};

    #[test]
    fn test_all_embedded_presets_parse() {
        assert!(PresetManager::load().is_ok());
        assert_eq!(PresetManager::count(), PRESET_TEXTS.len());
    }

    #[test]
    fn test_preset_names() {
        let names = PresetManager::list_preset_names();

        for expected in ["PRIMEGAME", "Fibonacci", "Multiplication", "Addition", "Swap"] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_get_preset_by_index() {
        assert!(PresetManager::get_preset_by_index(0).is_ok());
        assert!(PresetManager::get_preset_by_index(999).is_err());
    }

    #[test]
    fn test_get_preset_by_name() {
        let preset = PresetManager::get_preset_by_name("primegame").unwrap();
        assert_eq!(preset.program.len(), 14);
        assert_eq!(preset.events, vec![EventKind::Halted, EventKind::PowerOfTwo]);

        assert!(PresetManager::get_preset_by_name("Nonexistent").is_err());
    }

    #[test]
    fn test_get_preset_info() {
        let info = PresetManager::get_preset_info(2).unwrap();

        assert_eq!(info.index, 2);
        assert_eq!(info.name, "Multiplication");
        assert_eq!(info.rule_count, 6);
        assert_eq!(info.editable_count, 2);
        assert_eq!(info.initial_registers, "2³ × 3⁴");

        assert!(PresetManager::get_preset_info(999).is_err());
    }

    #[test]
    fn test_search_presets() {
        assert_eq!(PresetManager::search_presets("fibo"), vec![1]);
        assert!(PresetManager::search_presets("forever").contains(&4));
        assert!(PresetManager::search_presets("nonexistent").is_empty());
    }

    #[test]
    fn test_preset_text() {
        assert!(PresetManager::get_preset_text_by_index(0)
            .unwrap()
            .contains("17/91"));
        assert!(PresetManager::get_preset_text_by_index(999).is_err());
    }

    #[test]
    fn test_multiplication_preset_computes_product() {
        let preset = PresetManager::get_preset_by_name("Multiplication").unwrap();
        let mut simulator = Simulator::with_preset(SimulatorConfig::default(), &preset).unwrap();
        let Forecast::Halts(steps) = simulator.forecast() else {
            panic!("multiplication should halt");
        };

        for _ in 0..=steps {
            simulator.step();
        }
        assert!(simulator.current_state().halted);
        assert_eq!(
            simulator.current_state().registers,
            PrimeExponentMap::factorize(5u64.pow(12))
        );
    }

    #[test]
    fn test_primegame_first_prime() {
        let preset = PresetManager::get_preset_by_name("PRIMEGAME").unwrap();
        let mut simulator = Simulator::with_preset(SimulatorConfig::default(), &preset).unwrap();

        // 2 -> 15 -> 825 -> ... reaches 2^2 after 19 steps
        for _ in 0..19 {
            simulator.step();
        }
        assert_eq!(simulator.current_state().registers, PrimeExponentMap::factorize(4));
    }

    #[test]
    fn test_swap_never_halts() {
        let preset = PresetManager::get_preset_by_name("Swap").unwrap();
        let forecast = forecast_halt_step(&preset.registers, &preset.program, FORECAST_LIMIT);

        assert_eq!(forecast, Forecast::Unknown { limit: FORECAST_LIMIT });
    }
}
