//! Command implementations for the Refine CLI

pub mod check;
pub mod run;
pub mod stage;

pub use check::check_command;
pub use run::run_command;
pub use stage::stage_command;

use crate::config::CliConfig;
use crate::{CliError, Result};
use rf_core::ast::Expr;
use rf_core::diagnostics::Diagnostic;
use rf_interpret::{BuiltinRegistry, ImportTable, StagingOrchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// What a command prints: `output` on stdout, diagnostics on stderr.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn validate_paths_exist(inputs: &[PathBuf]) -> Result<()> {
    for input in inputs {
        if !input.exists() {
            return Err(CliError::InvalidInput(format!(
                "Input path does not exist: {}",
                input.display()
            )));
        }
        if !input.is_file() {
            return Err(CliError::InvalidInput(format!(
                "Input path is not a file: {}",
                input.display()
            )));
        }
    }
    Ok(())
}

/// A core program serialized as JSON.
pub fn read_program(path: &Path) -> Result<Expr> {
    validate_paths_exist(&[path.to_path_buf()])?;
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        CliError::InvalidInput(format!("{} is not a core AST: {}", path.display(), e))
    })
}

pub fn read_imports(path: Option<&Path>) -> Result<ImportTable> {
    let Some(path) = path else {
        return Ok(ImportTable::new());
    };
    validate_paths_exist(&[path.to_path_buf()])?;
    let text = std::fs::read_to_string(path)?;
    let imports = ImportTable::from_json(&text).map_err(|e| {
        CliError::InvalidInput(format!("{} is not an import table: {}", path.display(), e))
    })?;
    debug!("loaded import table from {}", path.display());
    Ok(imports)
}

pub fn orchestrator(config: &CliConfig, imports: ImportTable) -> StagingOrchestrator {
    StagingOrchestrator::new(Arc::new(BuiltinRegistry::standard()))
        .with_imports(imports)
        .with_options(config.staging.clone())
}
