//! Refine CLI Binary
//!
//! # Usage
//!
//! ```bash
//! # Stage a program, printing the residual and its constraint
//! rf stage program.json --imports imports.json
//!
//! # Evaluate a program directly
//! rf run program.json
//!
//! # Stage several programs and report diagnostics only
//! rf check a.json b.json --deny-warnings
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use rf_cli::{
    commands::{self, check::CheckArgs, run::RunArgs, stage::StageArgs, CommandOutput},
    config::CliConfig,
    diagnostics::{render_diagnostics, report_cli_error, setup_error_reporting},
    Result,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "rf",
    version = env!("CARGO_PKG_VERSION"),
    about = "Refine: staged evaluation of core programs with constraints as types"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level (overrides --verbose/--quiet)
    #[arg(long, global = true, value_enum)]
    log: Option<LogLevel>,

    /// Set log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a program into its compile-time result and residual code
    Stage(StageArgs),

    /// Evaluate a program directly
    Run(RunArgs),

    /// Stage programs and report diagnostics
    Check(CheckArgs),
}

impl Commands {
    fn context(&self) -> &'static str {
        match self {
            Commands::Stage(_) => "stage",
            Commands::Run(_) => "run",
            Commands::Check(_) => "check",
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = setup_error_reporting() {
        eprintln!("{}", e);
    }
    if let Err(e) = setup_logging(cli.verbose, cli.quiet, cli.log, cli.log_format) {
        eprintln!("{}", e);
    }

    let result = CliConfig::load(cli.config.as_deref()).and_then(|config| {
        let context = cli.command.context();
        let output = match cli.command {
            Commands::Stage(args) => commands::stage_command(args, &config),
            Commands::Run(args) => commands::run_command(args, &config),
            Commands::Check(args) => commands::check_command(args, &config),
        }?;
        emit(&output, context, &config, cli.verbose > 0);
        Ok(())
    });

    match result {
        Ok(()) => {
            if cli.verbose > 0 {
                info!("Command completed successfully");
            }
        }
        Err(e) => {
            report_cli_error(e);
            std::process::exit(1);
        }
    }
}

fn emit(output: &CommandOutput, context: &str, config: &CliConfig, verbose: bool) {
    for line in render_diagnostics(&output.diagnostics, context, &config.output, verbose) {
        eprintln!("{}", line);
    }
    print!("{}", output.output);
}

fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_level: Option<LogLevel>,
    log_format: LogFormat,
) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if let Some(level) = log_level {
        EnvFilter::new(match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match log_format {
        LogFormat::Pretty => registry.with(formatter).try_init(),
        LogFormat::Json => registry.with(formatter.json()).try_init(),
    };
    installed.map_err(|e| rf_cli::CliError::Config(format!("Failed to setup logging: {}", e)))
}
