//! Terminal and log-file output.
//!
//! `OutputSink` owns the optional log file for a run. Every message goes to
//! the terminal with ANSI color intact; the log copy is stripped of escape
//! codes. The sink is opened once per invocation and flushed per line, so
//! an interrupted run still leaves a usable log behind.
//!
//! Log retention: runs accumulate timestamped logs in the working
//! directory, so before a new log is opened all but the most recent files
//! matching the run's prefix are deleted (capped at [`KEEP_LOGS`] total,
//! the new file included).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::{strip_ansi_codes, style};
use time::OffsetDateTime;

/// Maximum number of historical log files kept per prefix.
pub const KEEP_LOGS: usize = 3;

/// Where orchestrator output goes: terminal, plus an optional log file.
pub struct OutputSink {
    log: Option<BufWriter<File>>,
    log_path: Option<PathBuf>,
    log_prefix: Option<String>,
}

impl OutputSink {
    /// A sink that only writes to the terminal.
    pub fn terminal_only() -> Self {
        Self {
            log: None,
            log_path: None,
            log_prefix: None,
        }
    }

    /// Open a timestamped log file under `dir`, pruning old logs first.
    ///
    /// Pruning keeps `KEEP_LOGS - 1` existing files so that after the new
    /// log is created at most [`KEEP_LOGS`] exist. Files that cannot be
    /// deleted are warned about, never fatal.
    pub fn open(dir: &Path, prefix: &str) -> Result<Self> {
        prune_old_logs(dir, prefix, KEEP_LOGS - 1);

        let path = dir.join(format!("{}-{}.log", prefix, timestamp_compact()));
        let file = File::create(&path)
            .with_context(|| format!("creating log file '{}'", path.display()))?;

        let mut sink = Self {
            log: Some(BufWriter::new(file)),
            log_path: Some(path.clone()),
            log_prefix: Some(prefix.to_string()),
        };
        sink.print(&format!("Logging to: {}", path.display()));
        Ok(sink)
    }

    /// Path of the open log file, if logging is enabled.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Prefix the log file was opened with, if logging is enabled.
    pub fn log_prefix(&self) -> Option<&str> {
        self.log_prefix.as_deref()
    }

    /// Append one line to the log file (ANSI-stripped), if open.
    pub fn log_line(&mut self, text: &str) {
        if let Some(log) = &mut self.log {
            let _ = writeln!(log, "{}", strip_ansi_codes(text));
            let _ = log.flush();
        }
    }

    /// Forward a raw line of child-process output: terminal as-is, log
    /// stripped.
    pub fn raw_line(&mut self, line: &str) {
        println!("{line}");
        self.log_line(line);
    }

    /// Print to the terminal and mirror into the log.
    pub fn print(&mut self, msg: &str) {
        println!("{msg}");
        self.log_line(msg);
    }

    /// Green `==>` step header.
    pub fn step(&mut self, name: &str) {
        println!("{}", style(format!("==> {name}")).green());
        self.log_line(&format!("==> {name}"));
    }

    pub fn info(&mut self, msg: &str) {
        println!("{}", style(format!("    {msg}")).cyan());
        self.log_line(&format!("    {msg}"));
    }

    pub fn warn(&mut self, msg: &str) {
        println!("{}", style(format!("    Warning: {msg}")).yellow());
        self.log_line(&format!("    Warning: {msg}"));
    }

    pub fn error(&mut self, msg: &str) {
        println!("{}", style(format!("    Error: {msg}")).red());
        self.log_line(&format!("    Error: {msg}"));
    }

    pub fn success(&mut self, msg: &str) {
        println!("{}", style(format!("    ✓ {msg}")).green());
        self.log_line(&format!("    ✓ {msg}"));
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        if let Some(log) = &mut self.log {
            let _ = log.flush();
        }
    }
}

/// Delete all but the `keep` most recently modified `<prefix>-*.log` files
/// in `dir`. Deletion failures are warned on the terminal only; the log
/// file does not exist yet at this point.
pub fn prune_old_logs(dir: &Path, prefix: &str, keep: usize) {
    let mut logs = match collect_logs(dir, prefix) {
        Ok(logs) => logs,
        Err(_) => return,
    };
    logs.sort_by_key(|(_, mtime)| std::cmp::Reverse(*mtime));

    for (path, _) in logs.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => println!("Removed old log: {}", path.display()),
            Err(err) => println!(
                "{}",
                style(format!(
                    "    Warning: could not remove {}: {err}",
                    path.display()
                ))
                .yellow()
            ),
        }
    }
}

fn collect_logs(dir: &Path, prefix: &str) -> Result<Vec<(PathBuf, std::time::SystemTime)>> {
    let mut logs = Vec::new();
    let wanted_prefix = format!("{prefix}-");
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(&wanted_prefix) || !name.ends_with(".log") {
            continue;
        }
        let mtime = entry.metadata()?.modified()?;
        logs.push((path, mtime));
    }
    Ok(logs)
}

/// `YYYYMMDD-HHMMSS` in UTC, used in log file names.
fn timestamp_compact() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}-{:02}{:02}{:02}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
