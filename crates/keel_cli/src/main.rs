//! Keel CLI: inspect the program a `keel.toml` project builds.
//!
//! Provides `keel files` to list the units of the program in order, `keel
//! explain` to show why a unit is included, and `keel check` to report the
//! program's file-processing and option diagnostics.

#![warn(missing_docs)]

mod check;
mod explain;
mod files;
mod pipeline;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keel: program construction for typed module graphs.
#[derive(Parser, Debug)]
#[command(name = "keel", version, about = "Keel program inspector")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `keel.toml` file or the directory holding one.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Directory holding the library declaration files (default: `<project>/lib`).
    #[arg(long, global = true)]
    pub lib_dir: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the units of the program in order.
    Files(FilesArgs),
    /// Explain why a file is part of the program.
    Explain(ExplainArgs),
    /// Report program diagnostics.
    Check(CheckArgs),
}

/// Arguments for the `keel files` subcommand.
#[derive(Parser, Debug)]
pub struct FilesArgs {
    /// Print the inclusion reasons under each unit.
    #[arg(long)]
    pub explain: bool,
}

/// Arguments for the `keel explain` subcommand.
#[derive(Parser, Debug)]
pub struct ExplainArgs {
    /// The file to explain, relative to the current directory.
    pub file: String,
}

/// Arguments for the `keel check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// One JSON object per line.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a config file or project directory.
    pub config: Option<String>,
    /// Optional library directory override.
    pub lib_dir: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var_os("TERM").is_some() && std::env::var_os("NO_COLOR").is_none(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };
    init_logging(cli.verbose, cli.quiet, color);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
        lib_dir: cli.lib_dir,
    };

    let result = match cli.command {
        Command::Files(ref args) => files::run(args, &global),
        Command::Explain(ref args) => explain::run(args, &global),
        Command::Check(ref args) => check::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr subscriber. `KEEL_LOG` overrides the level chosen by
/// the flags.
fn init_logging(verbose: bool, quiet: bool, color: bool) {
    let default = if verbose {
        "keel=debug,keel_program=debug,keel_resolve=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("KEEL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(color)
                .with_target(verbose),
        )
        .init();
}
