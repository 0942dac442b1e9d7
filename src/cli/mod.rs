//! Command-line interface module
//!
//! This module contains the implementations for the CLI subcommands.

pub mod convert;
pub mod inspect;
pub mod resolve;

/// Common CLI utilities
pub mod utils {
    use crate::error::{Error, Result};
    use std::path::{Path, PathBuf};

    /// Read a text file
    pub fn read_file(path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))
    }

    /// Write output to file or stdout
    pub fn write_output(content: &str, output_path: Option<&Path>) -> Result<()> {
        match output_path {
            Some(path) => std::fs::write(path, content)
                .map_err(|e| Error::Io(format!("Failed to write {}: {}", path.display(), e))),
            None => {
                println!("{}", content);
                Ok(())
            }
        }
    }

    /// An input file and its path relative to the input it was found under
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct InputSource {
        pub path: PathBuf,
        pub relative: PathBuf,
    }

    /// Expand directories into the `.cs` files below them, sorted
    ///
    /// A file named directly is relative to its own directory, a file found
    /// in a directory is relative to that directory.
    pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<InputSource>> {
        let mut sources = Vec::new();
        for path in paths {
            if path.is_dir() {
                let mut found = Vec::new();
                walk_dir(path, &mut found)?;
                found.sort();
                for file in found {
                    let relative = file
                        .strip_prefix(path)
                        .map_err(|e| Error::internal(format!("{} is not below {}: {}", file.display(), path.display(), e)))?
                        .to_path_buf();
                    sources.push(InputSource { path: file, relative });
                }
            } else {
                let relative = path
                    .file_name()
                    .map(PathBuf::from)
                    .ok_or_else(|| Error::internal(format!("no file name in {}", path.display())))?;
                sources.push(InputSource {
                    path: path.clone(),
                    relative,
                });
            }
        }
        Ok(sources)
    }

    fn walk_dir(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                walk_dir(&path, found)?;
            } else if path.extension().map_or(false, |ext| ext == "cs") {
                found.push(path);
            }
        }
        Ok(())
    }
}
