//! Stage command implementation.

use super::{orchestrator, read_imports, read_program, CommandOutput};
use crate::config::{CliConfig, OutputFormat};
use crate::{CliError, Result};
use clap::Args;
use rf_core::ast::Expr;
use rf_core::diagnostics::Diagnostic;
use rf_core::Value;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the stage command
#[derive(Debug, Clone, Args)]
pub struct StageArgs {
    /// Core AST as JSON
    pub input: PathBuf,

    /// Import table as JSON
    #[arg(short, long)]
    pub imports: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (defaults to the configured one)
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// JSON form of a staging outcome.
#[derive(Debug, Serialize)]
struct StageReport<'a> {
    residual: &'a Expr,
    source: String,
    constraint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    specializations: usize,
    diagnostics: &'a [Diagnostic],
}

pub fn stage_command(args: StageArgs, config: &CliConfig) -> Result<CommandOutput> {
    info!("Staging '{}'", args.input.display());

    let program = read_program(&args.input)?;
    let imports = read_imports(args.imports.as_deref())?;
    let outcome = orchestrator(config, imports).stage(&program)?;
    info!(
        "staged with {} specialization(s), {} warning(s)",
        outcome.specializations,
        outcome.warnings().count()
    );

    let format = args.format.map(OutputFormat::from).unwrap_or(config.output.format);
    let output = match format {
        OutputFormat::Text if config.output.show_constraint => {
            format!("{}\n// : {}\n", outcome.residual, outcome.constraint())
        }
        OutputFormat::Text => format!("{}\n", outcome.residual),
        OutputFormat::Json => {
            let report = StageReport {
                residual: &outcome.residual,
                source: outcome.residual.to_string(),
                constraint: outcome.constraint().to_string(),
                value: outcome.value().map(Value::repr),
                specializations: outcome.specializations,
                diagnostics: &outcome.diagnostics,
            };
            let mut text = serde_json::to_string_pretty(&report)
                .map_err(|e| CliError::InvalidInput(format!("cannot encode the result: {}", e)))?;
            text.push('\n');
            text
        }
    };

    if let Some(path) = &args.output {
        std::fs::write(path, &output)?;
        info!("wrote residual program to {}", path.display());
        return Ok(CommandOutput {
            output: String::new(),
            diagnostics: outcome.diagnostics,
        });
    }
    Ok(CommandOutput {
        output,
        diagnostics: outcome.diagnostics,
    })
}
