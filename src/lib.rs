//! Relays Telegram channel posts to a Nostr relay as signed text notes.

use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt::Layer, prelude::*, registry::Registry};

pub mod bridge;
mod error;
pub mod media_manager;
pub mod nostr_manager;
pub mod telegram;
pub mod types;

pub use crate::bridge::{Bridge, BridgeConfig, Dispatch, TaskHandle};
pub use crate::error::{BridgeError, Result};
pub use crate::nostr_manager::{KeyError, KeyRole, SignedEvent, keys::normalize_key};
pub use crate::types::{Post, Update};

static TRACING_GUARDS: OnceCell<Mutex<Vec<WorkerGuard>>> = OnceCell::new();
static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global subscriber: stdout always, plus daily files in
/// `logs_dir` when given. Later calls do nothing.
pub fn init_tracing(logs_dir: Option<&Path>) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let mut guards = Vec::new();

        let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(stdout_guard);
        let stdout_layer = Layer::new()
            .with_writer(non_blocking_stdout)
            .with_ansi(true)
            .with_target(true);

        let file_layer = match logs_dir {
            Some(logs_dir) => {
                std::fs::create_dir_all(logs_dir)?;
                let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
                    .rotation(tracing_appender::rolling::Rotation::DAILY)
                    .filename_prefix("tg2nostr")
                    .filename_suffix("log")
                    .build(logs_dir)
                    .map_err(|e| BridgeError::LoggingSetup(e.to_string()))?;
                let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
                guards.push(file_guard);
                Some(
                    Layer::new()
                        .with_writer(non_blocking_file)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            None => None,
        };

        Registry::default()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| BridgeError::LoggingSetup(e.to_string()))?;

        TRACING_GUARDS.set(Mutex::new(guards)).ok();
        Ok(())
    })?;

    if let Some(logs_dir) = logs_dir {
        tracing::debug!(
            target: "tg2nostr::init_tracing",
            "Logging initialized in directory: {:?}",
            logs_dir
        );
    }
    Ok(())
}
