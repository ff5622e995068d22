//! Per-job logger.
//!
//! Every assembly job writes its own log file under the logs folder. Lines
//! are also mirrored to `tracing` (with the job id attached) and to an
//! optional callback, so a service embedding the pipeline can stream them.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

/// Logger shared by every step of one job.
///
/// All interior state sits behind `parking_lot` mutexes so the process
/// runner can feed tool output from its reader threads.
pub struct JobLogger {
    job_id: String,
    log_path: PathBuf,
    file_writer: Mutex<Option<BufWriter<File>>>,
    callback: Option<LogCallback>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_progress: Mutex<u32>,
}

impl JobLogger {
    /// Create `<log_dir>/<job_id>.log` and a logger writing to it.
    pub fn new(
        job_id: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let job_id = job_id.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_id)));
        let file = File::create(&log_path)?;

        Ok(Self {
            job_id,
            log_path,
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            callback,
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
            last_progress: Mutex::new(0),
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        match level {
            LogLevel::Trace => tracing::trace!(job = %self.job_id, "{}", message),
            LogLevel::Debug => tracing::debug!(job = %self.job_id, "{}", message),
            LogLevel::Info => tracing::info!(job = %self.job_id, "{}", message),
            LogLevel::Warn => tracing::warn!(job = %self.job_id, "{}", message),
            LogLevel::Error => tracing::error!(job = %self.job_id, "{}", message),
        }

        self.output(&self.format_message(message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log an external command line.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Log the start of a pipeline stage.
    pub fn stage(&self, name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Stage.format(name));
    }

    pub fn section(&self, name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Section.format(name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log an optional track being dropped.
    pub fn degraded(&self, track: &str, detail: &str) {
        let msg = MessagePrefix::Degraded.format(&format!("{} dropped: {}", track, detail));
        self.log(LogLevel::Warn, &msg);
    }

    /// Log a progress percentage. In compact mode only step boundaries
    /// (and 100%) get through; returns whether the line was written.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);

            let current_step = (percent / step) * step;
            let last_step = (*last / step) * step;
            if current_step <= last_step && percent < 100 {
                return false;
            }
            *last = percent;
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Record one line of tool output.
    ///
    /// The line always lands in the tail buffer; compact mode keeps it out
    /// of the log itself.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        if self.config.error_tail > 0 {
            let mut buffer = self.tail_buffer.lock();
            while buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            buffer.push_back(line.to_string());
        }

        if self.config.compact {
            return;
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        self.output(&self.format_message(&format!("{}{}", prefix, line)));
    }

    /// Dump the tail buffer, typically after a tool failed.
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Log tool arguments in whichever extra formats are enabled.
    pub fn log_args(&self, tool: &str, args: &[String]) {
        if self.config.show_commands_pretty {
            self.log_args_pretty(tool, args);
        }
        if self.config.show_commands_json {
            self.log_args_json(tool, args);
        }
    }

    /// One argument per line, shell continuation style.
    fn log_args_pretty(&self, tool: &str, args: &[String]) {
        self.info(&format!("--- {} arguments (pretty) ---", tool));
        self.info(&args.join(" \\\n  "));
    }

    /// Arguments as a JSON array.
    fn log_args_json(&self, tool: &str, args: &[String]) {
        self.info(&format!("--- {} arguments (json) ---", tool));
        if let Ok(json) = serde_json::to_string_pretty(args) {
            self.info(&json);
        }
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Flush and release the log file. Later messages only reach tracing
    /// and the callback.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S%.3f"), message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = self.callback {
            callback(formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
