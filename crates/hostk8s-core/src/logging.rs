//! Timestamped console logging
//!
//! Output format matches the shell-era HostK8s scripts: a dim `[HH:MM:SS]`
//! prefix colored by level, message on the same line. Two environment
//! variables change behavior:
//! - `LOG_LEVEL=info` suppresses debug messages
//! - `QUIET=true` replaces the `!`/`❌` markers with `WARNING:`/`ERROR:`

use std::sync::OnceLock;

use chrono::Local;
use console::style;

#[derive(Debug, Clone, Copy)]
struct LogSettings {
    debug_enabled: bool,
    quiet: bool,
}

fn settings() -> &'static LogSettings {
    static SETTINGS: OnceLock<LogSettings> = OnceLock::new();
    SETTINGS.get_or_init(|| LogSettings {
        debug_enabled: std::env::var("LOG_LEVEL")
            .map(|v| v.to_lowercase() != "info")
            .unwrap_or(true),
        quiet: std::env::var("QUIET")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false),
    })
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Log a debug message (hidden when `LOG_LEVEL=info`)
pub fn debug(message: impl AsRef<str>) {
    if settings().debug_enabled {
        println!(
            "{} {}",
            style(format!("[{}]", timestamp())).green(),
            message.as_ref()
        );
    }
}

/// Log an informational message
pub fn info(message: impl AsRef<str>) {
    println!(
        "{} {}",
        style(format!("[{}]", timestamp())).blue(),
        message.as_ref()
    );
}

/// Log a success message (same styling as info, semantically distinct)
pub fn success(message: impl AsRef<str>) {
    info(message);
}

/// Log a warning message
pub fn warn(message: impl AsRef<str>) {
    let marker = if settings().quiet { "WARNING:" } else { "!" };
    println!(
        "{} {}",
        style(format!("[{}] {}", timestamp(), marker)).yellow(),
        message.as_ref()
    );
}

/// Log an error message to stderr
pub fn error(message: impl AsRef<str>) {
    let marker = if settings().quiet { "ERROR:" } else { "❌" };
    eprintln!(
        "{} {}",
        style(format!("[{}] {}", timestamp(), marker)).red(),
        message.as_ref()
    );
}

