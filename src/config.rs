// src/config.rs

//! Runtime configuration derived from CLI arguments.
//!
//! Responsibilities:
//! - Split the comma-separated watch list into paths.
//! - Decide the delivery destination (exactly one of file / HTTP endpoint).
//! - Normalize the endpoint URL (a scheme-less `host:port/path` is accepted,
//!   the port defaults to 80).
//!
//! All failures here are configuration errors: the caller reports them and
//! exits before any watch is armed.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use reqwest::Url;

use crate::cli::CliArgs;

/// Where collected lines go.
#[derive(Debug, Clone)]
pub enum Destination {
    /// Append raw line bytes to this local file.
    File(PathBuf),
    /// POST each line to this HTTP collector endpoint.
    Http(Url),
}

/// Validated daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Files to watch, in CLI order.
    pub watch_files: Vec<PathBuf>,
    pub destination: Destination,
    /// How many trailing lines to replay per file at attach time.
    pub replay_lines: usize,
}

impl Config {
    /// Build and validate a config from parsed CLI arguments.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let watch_files = split_file_list(&args.files);
        if watch_files.is_empty() {
            return Err(anyhow!("no files..no watch! (--files is empty)"));
        }

        let destination = match (&args.target, &args.write_to) {
            (Some(target), None) => Destination::File(PathBuf::from(target)),
            (None, Some(endpoint)) => Destination::Http(parse_endpoint(endpoint)?),
            (None, None) => {
                return Err(anyhow!(
                    "no destination: one of --target / --write-to is required"
                ));
            }
            // clap's conflicts_with already rejects this; keep the guard for
            // programmatic construction of CliArgs.
            (Some(_), Some(_)) => {
                return Err(anyhow!("--target and --write-to are mutually exclusive"));
            }
        };

        Ok(Self {
            watch_files,
            destination,
            replay_lines: args.lines,
        })
    }
}

/// Split the `--files` value on commas, dropping empty segments.
fn split_file_list(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Parse the collector endpoint, tolerating a missing scheme.
fn parse_endpoint(raw: &str) -> Result<Url> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&candidate)
        .with_context(|| format!("invalid collector endpoint: {raw}"))?;

    if url.host_str().is_none() {
        return Err(anyhow!("collector endpoint has no host: {raw}"));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(files: &str, target: Option<&str>, write_to: Option<&str>) -> CliArgs {
        CliArgs {
            files: files.to_string(),
            target: target.map(String::from),
            write_to: write_to.map(String::from),
            lines: 20,
            log_level: None,
        }
    }

    #[test]
    fn splits_comma_separated_watch_list() {
        let cfg = Config::from_args(&args("a.log,b.log, c.log", Some("out"), None)).unwrap();
        assert_eq!(
            cfg.watch_files,
            vec![
                PathBuf::from("a.log"),
                PathBuf::from("b.log"),
                PathBuf::from("c.log")
            ]
        );
    }

    #[test]
    fn empty_watch_list_is_an_error() {
        assert!(Config::from_args(&args("", Some("out"), None)).is_err());
        assert!(Config::from_args(&args(" , ,", Some("out"), None)).is_err());
    }

    #[test]
    fn requires_exactly_one_destination() {
        assert!(Config::from_args(&args("a.log", None, None)).is_err());
        assert!(Config::from_args(&args("a.log", Some("out"), Some("h:80/x"))).is_err());
    }

    #[test]
    fn endpoint_without_scheme_defaults_to_http_port_80() {
        let cfg = Config::from_args(&args("a.log", None, Some("collector.example/ingest"))).unwrap();
        match cfg.destination {
            Destination::Http(url) => {
                assert_eq!(url.scheme(), "http");
                assert_eq!(url.host_str(), Some("collector.example"));
                assert_eq!(url.port_or_known_default(), Some(80));
                assert_eq!(url.path(), "/ingest");
            }
            other => panic!("expected http destination, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_keeps_explicit_port() {
        let cfg = Config::from_args(&args("a.log", None, Some("collector:8080/logs"))).unwrap();
        match cfg.destination {
            Destination::Http(url) => assert_eq!(url.port(), Some(8080)),
            other => panic!("expected http destination, got {other:?}"),
        }
    }
}
