//! Diagnostic and error reporting utilities

use crate::config::OutputConfig;
use crate::{CliError, Result};
use rf_core::diagnostics::Diagnostic;
use tracing::error;

/// Set up enhanced error reporting with miette
pub fn setup_error_reporting() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .map_err(|e| CliError::Config(format!("Failed to setup error reporting: {}", e)))
}

/// Lines for the warnings of a pass, in the configured template.
pub fn render_diagnostics(
    diagnostics: &[Diagnostic],
    context: &str,
    output: &OutputConfig,
    verbose: bool,
) -> Vec<String> {
    diagnostics
        .iter()
        .flat_map(|d| output.diagnostics.render(d, context, verbose))
        .collect()
}

/// Print a failed command; evaluator errors go through miette with their code.
pub fn report_cli_error(err: CliError) {
    match err {
        CliError::Refine(err) => eprintln!("{:?}", miette::Report::new(err)),
        other => error!("{}", other),
    }
}
