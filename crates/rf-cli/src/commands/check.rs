//! Check command implementation.

use super::{orchestrator, read_imports, read_program, CommandOutput};
use crate::config::CliConfig;
use crate::{CliError, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments for the check command
#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Core AST files as JSON
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Import table as JSON
    #[arg(short, long)]
    pub imports: Option<PathBuf>,

    /// Treat warnings as errors
    #[arg(long)]
    pub deny_warnings: bool,
}

/// Stage every input and report what it found, without printing residuals.
pub fn check_command(args: CheckArgs, config: &CliConfig) -> Result<CommandOutput> {
    let imports = read_imports(args.imports.as_deref())?;
    let orchestrator = orchestrator(config, imports);

    let mut output = String::new();
    let mut diagnostics = Vec::new();
    let mut warnings = 0;
    for input in &args.inputs {
        info!("Checking '{}'", input.display());
        let program = read_program(input)?;
        let outcome = orchestrator.stage(&program)?;
        let count = outcome.warnings().count();
        warnings += count;
        output.push_str(&format!(
            "{}: ok, {} warning(s), {} specialization(s)\n",
            input.display(),
            count,
            outcome.specializations
        ));
        diagnostics.extend(outcome.diagnostics);
    }

    if args.deny_warnings && warnings > 0 {
        warn!("{} warning(s) denied", warnings);
        return Err(CliError::InvalidInput(format!(
            "{} warning(s) with --deny-warnings",
            warnings
        )));
    }
    Ok(CommandOutput {
        output,
        diagnostics,
    })
}
