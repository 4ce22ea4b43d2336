mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use commands::checks::cmd_checks;
use commands::expand::cmd_expand;
use commands::verify::cmd_verify;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Which manifest `expand` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ManifestChoice {
    Device,
    Framework,
}

/// VINTF HAL verification against a captured device snapshot.
#[derive(Parser)]
#[command(
    name = "vintf-verify",
    version,
    about = "Reconcile declared HALs with the live service registry"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log at debug level to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run verification checks against a device snapshot
    Verify {
        /// Path to the device snapshot JSON
        snapshot: PathBuf,
        /// Comma-separated list of checks to run. Default: all.
        #[arg(long)]
        checks: Option<String>,
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Scale every registry lookup timeout (overrides config and device property)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        timeout_multiplier: Option<u32>,
    },

    /// Print the serving obligations a manifest expands to
    Expand {
        /// Path to the device snapshot JSON
        snapshot: PathBuf,
        /// Manifest to expand
        #[arg(long, default_value = "device", value_enum)]
        manifest: ManifestChoice,
    },

    /// List the available checks in run order
    Checks,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Verify {
            snapshot,
            checks,
            config,
            timeout_multiplier,
        } => {
            cmd_verify(
                &snapshot,
                checks.as_deref(),
                config.as_deref(),
                timeout_multiplier,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Expand { snapshot, manifest } => {
            cmd_expand(&snapshot, manifest, cli.output, cli.quiet);
        }
        Commands::Checks => {
            cmd_checks(cli.output, cli.quiet);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
