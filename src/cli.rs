// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::watch::DEFAULT_INCLUDE;

const WATCH_EXAMPLES: &str = "\
Examples:
  $ recmd watch go run main.go
  $ recmd watch -p './src/**/*.rs' cargo run
  $ recmd watch --exclude target --exclude node_modules -- make test
";

/// Command-line arguments for `recmd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "recmd",
    about = "recmd is a live reloading tool for any application.",
    long_about = None
)]
pub struct CliArgs {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// Takes precedence over `--verbose`. If neither is given, `RECMD_LOG`
    /// or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Watch a path and (re)run a command on every change.
    #[command(visible_alias = "w", after_help = WATCH_EXAMPLES)]
    Watch(WatchArgs),

    /// Show version information.
    Version(VersionArgs),
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Glob of paths to watch. `*` matches within a path segment, `**` any
    /// number of segments; a plain directory name watches everything below it.
    #[arg(short, long, value_name = "PATTERN", default_value = DEFAULT_INCLUDE)]
    pub path: String,

    /// Pattern to exclude; can be given multiple times.
    #[arg(short, long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// The command to run, with its arguments. Everything from the command
    /// name on is passed through untouched.
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true
    )]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct VersionArgs {
    /// Print only the version number.
    #[arg(short, long)]
    pub short: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
