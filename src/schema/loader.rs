//! Form tree loading from disk
//!
//! A form file is a JSON document `{ "namespace": ..., "root": {...} }` as
//! produced by the external form parser. Loading checks the shape and every
//! identifier; it does not compile anything.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{CompileError, CompileResult};
use super::source::FormSource;

/// Loads form sources from JSON files
pub struct FormLoader {
    path: PathBuf,
}

impl FormLoader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, parse and validate the form file
    pub fn load(&self) -> CompileResult<FormSource> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            CompileError::invalid_input(
                self.path.display().to_string(),
                format!("Failed to read file: {}", e),
            )
        })?;
        Self::parse(&content).map_err(|e| match e {
            CompileError::InvalidInput { path, reason } if path == "$document" => {
                CompileError::invalid_input(self.path.display().to_string(), reason)
            }
            other => other,
        })
    }

    /// Parse and validate a form document held in memory
    pub fn parse(content: &str) -> CompileResult<FormSource> {
        let form: FormSource = serde_json::from_str(content).map_err(|e| {
            CompileError::invalid_input("$document", format!("Invalid JSON: {}", e))
        })?;
        form.validate()?;
        Ok(form)
    }
}
