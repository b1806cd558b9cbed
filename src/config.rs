//! Compiler configuration
//!
//! Loaded from a JSON file. Every field except `data_dir` has a default, so
//! `{"data_dir": "/var/lib/formtables"}` is a complete configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::naming::NameLimits;
use crate::partition::SplitPolicy;
use crate::schema::{CompileError, CompileOptions, CompileResult};

/// Shortest identifier limit that still leaves room for a checksum suffix
const MIN_NAME_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Directory holding the catalog of the file-backed store
    #[serde(default)]
    pub data_dir: String,

    /// Persistence schema tables are created in
    #[serde(default = "default_schema_name")]
    pub schema_name: String,

    #[serde(default = "default_name_length")]
    pub max_table_name_length: usize,

    #[serde(default = "default_name_length")]
    pub max_column_name_length: usize,

    /// Length of string columns without a preferred length
    #[serde(default = "default_string_length")]
    pub default_string_length: u32,

    /// Materialize attempts before giving up
    #[serde(default = "default_max_split_iterations")]
    pub max_split_iterations: usize,

    #[serde(default)]
    pub emit_long_string_tables: bool,

    /// Data columns per table accepted by the file-backed store
    #[serde(default)]
    pub column_budget: Option<usize>,

    #[serde(default)]
    pub split_policy: SplitPolicy,
}

fn default_schema_name() -> String {
    "formtables".to_string()
}
fn default_name_length() -> usize {
    64
}
fn default_string_length() -> u32 {
    255
}
fn default_max_split_iterations() -> usize {
    64
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            schema_name: default_schema_name(),
            max_table_name_length: default_name_length(),
            max_column_name_length: default_name_length(),
            default_string_length: default_string_length(),
            max_split_iterations: default_max_split_iterations(),
            emit_long_string_tables: false,
            column_budget: None,
            split_policy: SplitPolicy::default(),
        }
    }
}

impl CompilerConfig {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> CompileResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CompileError::InvalidConfig(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: CompilerConfig = serde_json::from_str(&content)
            .map_err(|e| CompileError::InvalidConfig(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> CompileResult<()> {
        if self.schema_name.trim().is_empty() {
            return Err(CompileError::InvalidConfig(
                "schema_name must not be empty".into(),
            ));
        }

        if self.max_table_name_length < MIN_NAME_LENGTH {
            return Err(CompileError::InvalidConfig(format!(
                "max_table_name_length must be >= {}",
                MIN_NAME_LENGTH
            )));
        }

        if self.max_column_name_length < MIN_NAME_LENGTH {
            return Err(CompileError::InvalidConfig(format!(
                "max_column_name_length must be >= {}",
                MIN_NAME_LENGTH
            )));
        }

        if self.default_string_length == 0 {
            return Err(CompileError::InvalidConfig(
                "default_string_length must be > 0".into(),
            ));
        }

        if self.max_split_iterations == 0 {
            return Err(CompileError::InvalidConfig(
                "max_split_iterations must be > 0".into(),
            ));
        }

        self.split_policy.validate()
    }

    /// Data directory as a path; fails when none is configured
    pub fn data_path(&self) -> CompileResult<PathBuf> {
        if self.data_dir.is_empty() {
            return Err(CompileError::InvalidConfig(
                "data_dir is required".into(),
            ));
        }
        Ok(PathBuf::from(&self.data_dir))
    }

    pub fn name_limits(&self) -> NameLimits {
        NameLimits {
            max_table: self.max_table_name_length,
            max_column: self.max_column_name_length,
        }
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            schema: self.schema_name.clone(),
            emit_long_string_tables: self.emit_long_string_tables,
        }
    }
}
