use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, Local, Timelike};
use std::fs;

/// Line the bot prints right before it shuts itself down
pub const CLOSING_SENTINEL: &str = "Closing Python process";

/// Prefix of the line appended when the bot process exits
pub const FINISHED_SENTINEL: &str = "Child process finished with code";

/// Message log shown to the user.
///
/// Two logs are kept: the synchronous log written directly by the launcher, and
/// the asynchronous log fed by the bot process's output. Every append to the
/// asynchronous log is merged into the synchronous one; the asynchronous log
/// itself is never cleared by a merge.
///
/// Entries carry their own leading line breaks (the bot's output arrives without
/// them), so the log is rendered by plain concatenation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<String>,
    async_messages: Vec<String>,

    /// Number of async entries already copied into `messages`
    merged: usize,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the synchronous log.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Append to the asynchronous log and merge it into the synchronous log.
    pub fn push_async(&mut self, message: impl Into<String>) {
        self.async_messages.push(message.into());
        self.merge();
    }

    /// Copy async entries not yet merged onto the end of the synchronous log.
    ///
    /// # Returns
    /// The number of entries copied
    pub fn merge(&mut self) -> usize {
        let pending = &self.async_messages[self.merged..];
        let count = pending.len();
        self.messages.extend_from_slice(pending);
        self.merged = self.async_messages.len();
        count
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn async_messages(&self) -> &[String] {
        &self.async_messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True when the newest bot output announces that the bot is shutting down.
    pub fn closing_requested(&self) -> bool {
        self.async_messages
            .last()
            .is_some_and(|message| message.contains(CLOSING_SENTINEL))
    }

    /// True once the process-exit line has reached the synchronous log.
    pub fn has_finished(&self) -> bool {
        self.has_finished_since(0)
    }

    /// Like [`has_finished`](Self::has_finished), ignoring entries before `start`.
    pub fn has_finished_since(&self, start: usize) -> bool {
        self.messages
            .get(start..)
            .unwrap_or_default()
            .iter()
            .any(|message| message.contains(FINISHED_SENTINEL))
    }

    /// The full synchronous log as written to a session log file.
    pub fn contents(&self) -> String {
        self.messages.concat()
    }
}

/// Format a date and time as `YYYY{sep}MM{sep}DD HH{sep}MM{sep}SS`.
///
/// All fields are zero-padded and no locale data is consulted.
pub fn format_timestamp<T: Datelike + Timelike>(time: &T, separator: &str) -> String {
    format!(
        "{:04}{sep}{:02}{sep}{:02} {:02}{sep}{:02}{sep}{:02}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second(),
        sep = separator
    )
}

/// Current local time formatted with [`format_timestamp`]
pub fn timestamp(separator: &str) -> String {
    format_timestamp(&Local::now(), separator)
}

/// Session log file name (without extension) for the current local time
pub fn session_log_name() -> String {
    format!("log {}", timestamp("-"))
}

/// Write `contents` to `<log_dir>/<name>.txt`.
///
/// # Returns
/// The path of the written file
pub fn write_session_log(log_dir: &Utf8Path, name: &str, contents: &str) -> Result<Utf8PathBuf> {
    let path = log_dir.join(format!("{}.txt", name));

    fs::write(&path, contents)
        .with_context(|| format!("Failed to write session log: {}", path))?;

    tracing::info!("Saved message log to {}", path);
    Ok(path)
}
