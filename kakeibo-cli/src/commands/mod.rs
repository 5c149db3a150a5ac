//! CLI command implementations

pub mod insight;
pub mod logs;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use kakeibo_core::config::Config;
use kakeibo_core::services::LogEvent;
use kakeibo_core::{KakeiboContext, LoggingService};

pub const ENTRY_POINT: &str = "cli";

/// Data directory: `KAKEIBO_DIR`, else `~/.kakeibo`, else `./.kakeibo`
pub fn get_data_dir(config: Option<&Config>) -> PathBuf {
    if let Some(dir) = config.and_then(|c| c.data_dir.clone()) {
        return dir;
    }
    if let Ok(dir) = std::env::var("KAKEIBO_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kakeibo")
}

/// Load and validate configuration; nothing touches the network before this
pub fn load_config() -> Result<Config> {
    Config::from_env().context("Configuration is incomplete")
}

/// Build the context for a command and record that it ran
pub fn get_context(command: &str) -> Result<KakeiboContext> {
    let config = load_config()?;
    let data_dir = get_data_dir(Some(&config));
    let ctx = KakeiboContext::new(config, &data_dir, ENTRY_POINT)
        .context("Failed to initialize kakeibo context")?;
    log_event(ctx.logger.as_deref(), LogEvent::new("command_executed").with_command(command));
    Ok(ctx)
}

/// Event log for commands that run without a full configuration
///
/// Returns None if the log cannot be opened (that never blocks a command)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir(None);
    LoggingService::new(&data_dir, ENTRY_POINT, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: Option<&LoggingService>, event: LogEvent) {
    kakeibo_core::services::logging::record(logger, event);
}
