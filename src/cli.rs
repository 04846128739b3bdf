// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::tail::seed::DEFAULT_LINE_GUESS;

/// Command-line arguments for `logspool`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "logspool",
    version,
    about = "Watch log files and spool appended lines to a file or an HTTP collector.",
    long_about = None
)]
pub struct CliArgs {
    /// Comma-separated list of files to watch.
    #[arg(short = 'f', long, value_name = "LIST")]
    pub files: String,

    /// Append collected lines to this local file.
    #[arg(short = 't', long, value_name = "PATH", conflicts_with = "write_to")]
    pub target: Option<String>,

    /// POST collected lines to this HTTP collector endpoint instead.
    ///
    /// Exactly one of `--target` / `--write-to` must be given.
    #[arg(short = 's', long, value_name = "URL")]
    pub write_to: Option<String>,

    /// How many trailing lines to replay from each file at startup.
    #[arg(short = 'n', long, value_name = "N", default_value_t = DEFAULT_LINE_GUESS)]
    pub lines: usize,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LOGSPOOL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
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
