//! Card Assistant
//!
//! Recognition and automation engine for a card game client. Captures the
//! game window, recognises cards, level badges, bind badges, item icons and
//! recipes with 64-bit average hashes, and drives the client with synthetic
//! mouse input.

pub mod automation;
pub mod capture;
pub mod error;
pub mod paths;
pub mod recognition;

#[cfg(test)]
pub(crate) mod testutil;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

pub use error::{AutomationError, Result};

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("card_assistant.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}
