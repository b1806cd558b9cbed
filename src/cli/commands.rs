//! CLI command implementations
//!
//! Each command loads the configuration, does one thing against the
//! file-backed store and prints one JSON response.

use std::path::Path;

use serde_json::{json, Value};

use crate::config::CompilerConfig;
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::partition::{DefinedForm, FormCompiler};
use crate::schema::FormLoader;
use crate::store::{FileStore, Persistence, StoreError};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let severity = Severity::parse(&cli.log_level)
        .ok_or_else(|| CliError::config_error(format!("Unknown log level '{}'", cli.log_level)))?;
    Logger::set_min_severity(severity);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Init { config } => init(&config)?,
        Command::Compile { config, form } => compile(&config, &form)?,
        Command::Inspect { config, namespace } => inspect(&config, &namespace)?,
    };
    write_response(data)
}

fn load_config(path: &Path) -> CliResult<CompilerConfig> {
    let config = CompilerConfig::load(path)?;
    log_event_with_fields(Event::ConfigLoaded, &[("path", &path.display().to_string())]);
    Ok(config)
}

fn open_store(config: &CompilerConfig) -> CliResult<FileStore> {
    let data_dir = config.data_path()?;
    FileStore::open(&data_dir, config.column_budget).map_err(|e| match e {
        StoreError::NotFound(message) => CliError::not_initialized(message),
        other => other.into(),
    })
}

/// Create an empty catalog in the configured data directory
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = load_config(config_path)?;
    let data_dir = config.data_path()?;

    FileStore::init(&data_dir).map_err(|e| match e {
        StoreError::AlreadyExists(path) => {
            CliError::already_initialized(format!("Catalog already exists at {}", path))
        }
        other => other.into(),
    })?;

    let dir = data_dir.display().to_string();
    log_event_with_fields(Event::CatalogInitialized, &[("data_dir", &dir)]);
    Ok(json!({"initialized": true, "data_dir": dir}))
}

/// Compile a form file into tables of the file-backed store
pub fn compile(config_path: &Path, form_path: &Path) -> CliResult<Value> {
    let config = load_config(config_path)?;

    let source = FormLoader::new(form_path).load()?;
    log_event_with_fields(
        Event::FormLoaded,
        &[
            ("namespace", &source.namespace),
            ("path", &form_path.display().to_string()),
        ],
    );

    let mut store = open_store(&config)?;
    let compiler = FormCompiler::new(config);
    let defined = compiler.define_form(&mut store, &source)?;

    Ok(summary(&defined, &compiler))
}

/// Print the stored definition of `namespace`
pub fn inspect(config_path: &Path, namespace: &str) -> CliResult<Value> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let form = store.load_form(namespace)?;
    let definition = store
        .load_definition(namespace)?
        .ok_or_else(|| CliError::form_not_found(namespace))?;

    Ok(json!({
        "form": form,
        "definition": definition,
    }))
}

fn summary(defined: &DefinedForm, compiler: &FormCompiler) -> Value {
    let tables: Vec<Value> = defined
        .schema
        .tables
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "kind": t.kind,
                "owner": t.owner,
                "columns": t.column_names(),
            })
        })
        .collect();

    json!({
        "namespace": defined.schema.namespace,
        "schema": defined.schema.schema,
        "reused": defined.reused,
        "iterations": defined.iterations,
        "tables": tables,
        "metrics": compiler.metrics().snapshot(),
        "definition": defined.schema,
    })
}
