//! Run command implementation.

use super::{orchestrator, read_imports, read_program, CommandOutput};
use crate::config::CliConfig;
use crate::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the run command
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Core AST as JSON
    pub input: PathBuf,

    /// Import table as JSON
    #[arg(short, long)]
    pub imports: Option<PathBuf>,
}

/// Evaluate the program directly, without staging.
pub fn run_command(args: RunArgs, config: &CliConfig) -> Result<CommandOutput> {
    info!("Running '{}'", args.input.display());

    let program = read_program(&args.input)?;
    let imports = read_imports(args.imports.as_deref())?;
    let value = orchestrator(config, imports).run(&program)?;
    Ok(CommandOutput {
        output: format!("{}\n", value.repr()),
        diagnostics: Vec::new(),
    })
}
