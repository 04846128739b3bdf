// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod sink;
pub mod tail;
pub mod watch;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::CliArgs;
use crate::config::Config;
use crate::engine::{Engine, EngineEvent};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config validation
/// - the delivery sink
/// - per-file attach (seed + trailing-line replay)
/// - watch arming and the post-arm sweep
/// - Ctrl-C handling
/// - the engine event loop
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = Config::from_args(&args)?;

    // Opening the sink first means a bad destination fails before any file
    // is read or watched.
    let sink = sink::build(&cfg)?;

    let (mut engine, engine_tx) = Engine::new(cfg.replay_lines, sink)?;

    for path in &cfg.watch_files {
        engine
            .attach(path)
            .await
            .with_context(|| format!("attaching {}", path.display()))?;
    }

    engine.arm_all()?;

    // Files may have grown between the seed and the watches going live.
    engine.sweep().await?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = engine_tx;
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(EngineEvent::Shutdown).await;
        });
    }

    info!(files = cfg.watch_files.len(), "watching");
    engine.run().await
}
