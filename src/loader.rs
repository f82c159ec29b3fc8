//! This module provides the `ProgramLoader` struct, responsible for loading FRACTRAN
//! program files from disk or from strings.

use crate::parser::parse;
use crate::types::{FractranError, Preset, MAX_PROGRAM_SIZE};
use std::fs;
use std::path::{Path, PathBuf};

/// `ProgramLoader` is a utility struct for loading `.frac` program files.
/// It provides methods to load a single file, parse string content, and discover and
/// load all `.frac` files within a directory.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Loads a single program file from the specified path.
    ///
    /// # Returns
    ///
    /// * `Ok(Preset)` if the file is successfully read, parsed and validated.
    /// * `Err(FractranError::FileError)` if the file cannot be read or is too large.
    /// * `Err(FractranError::ParseError)` if the file content is not a valid program.
    pub fn load_program(path: &Path) -> Result<Preset, FractranError> {
        let content = fs::read_to_string(path).map_err(|e| {
            FractranError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        if content.len() > MAX_PROGRAM_SIZE {
            return Err(FractranError::FileError(format!(
                "File {} exceeds {} bytes",
                path.display(),
                MAX_PROGRAM_SIZE
            )));
        }

        parse(&content)
    }

    /// Loads a single program from string content, e.g. pasted by the user.
    pub fn load_program_from_string(content: &str) -> Result<Preset, FractranError> {
        parse(content)
    }

    /// Loads every `.frac` file in `directory`. Subdirectories and other files are skipped.
    ///
    /// Each element of the result is either the path and its preset, or the error that
    /// prevented loading it.
    pub fn load_programs(directory: &Path) -> Vec<Result<(PathBuf, Preset), FractranError>> {
        if !directory.exists() {
            return vec![Err(FractranError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(FractranError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut results: Vec<_> = entries
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        return Some(Err(FractranError::FileError(format!(
                            "Failed to read directory entry: {}",
                            e
                        ))))
                    }
                };

                let path = entry.path();

                if path.is_dir() || path.extension().is_none_or(|ext| ext != "frac") {
                    return None;
                }

                match Self::load_program(&path) {
                    Ok(preset) => Some(Ok((path, preset))),
                    Err(e) => Some(Err(FractranError::FileError(format!(
                        "Failed to load program from {}: {}",
                        path.display(),
                        e
                    )))),
                }
            })
            .collect();

        // Directory order is platform dependent
        results.sort_by(|a, b| match (a, b) {
            (Ok((a, _)), Ok((b, _))) => a.cmp(b),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => std::cmp::Ordering::Equal,
        });

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_valid_program() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "test.frac",
            "name: Test Program\nprogram: 3/2, 5/3\nregisters: 2^2\neditable: 2",
        );

        let preset = ProgramLoader::load_program(&path).unwrap();
        assert_eq!(preset.name, "Test Program");
        assert_eq!(preset.program.sources(), vec!["3/2", "5/3"]);
        assert_eq!(preset.registers.get(2), 2);
        assert_eq!(preset.editable, vec![2]);
    }

    #[test]
    fn test_load_invalid_program() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "invalid.frac", "This is not a valid program");

        assert!(ProgramLoader::load_program(&path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ProgramLoader::load_program(&dir.path().join("missing.frac"));

        assert!(matches!(result, Err(FractranError::FileError(_))));
    }

    #[test]
    fn test_load_oversized_file() {
        let dir = tempdir().unwrap();
        let mut content = String::from("name: Big\nprogram: 3/2");
        while content.len() <= MAX_PROGRAM_SIZE {
            content.push_str(", 3/2");
        }
        let path = write(dir.path(), "big.frac", &content);

        assert!(matches!(
            ProgramLoader::load_program(&path),
            Err(FractranError::FileError(_))
        ));
    }

    #[test]
    fn test_load_program_from_string() {
        let preset =
            ProgramLoader::load_program_from_string("name: Sums\nprogram: 1/15\ninput: 225")
                .unwrap();

        assert_eq!(preset.registers.get(3), 2);
        assert_eq!(preset.registers.get(5), 2);
    }

    #[test]
    fn test_load_programs_from_directory() {
        let dir = tempdir().unwrap();

        write(dir.path(), "valid.frac", "name: Valid Program\nprogram: 3/2");
        write(dir.path(), "invalid.frac", "This is not a valid program");
        write(dir.path(), "ignored.txt", "This file should be ignored");
        std::fs::create_dir(dir.path().join("nested.frac")).unwrap();

        let results = ProgramLoader::load_programs(dir.path());

        // 1 success and 1 error, successes first
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_load_programs_missing_directory() {
        let dir = tempdir().unwrap();
        let results = ProgramLoader::load_programs(&dir.path().join("nowhere"));

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(FractranError::FileError(_))));
    }
}
