//! Running ffmpeg / ffprobe.
//!
//! Steps never spawn processes themselves; they hand an [`Invocation`] to a
//! [`MediaRunner`]. Production uses [`SystemRunner`]; tests script the tool
//! results.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::logging::JobLogger;
use crate::orchestrator::CancelHandle;

use super::invocation::{Invocation, ProcessError, ProcessOutput};

/// How often a running child is checked for exit, deadline and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stderr lines kept for the failure message.
const STDERR_TAIL_LINES: usize = 12;

/// Lines of the tail quoted in `ProcessError::Failed`.
const MESSAGE_LINES: usize = 4;

/// Executes external media tools.
pub trait MediaRunner: Send + Sync {
    /// Run to completion.
    ///
    /// Non-zero exit is `ProcessError::Failed`; the deadline in
    /// `invocation.timeout` and `cancel` both kill the child.
    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancelHandle,
        logger: &JobLogger,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl MediaRunner for SystemRunner {
    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancelHandle,
        logger: &JobLogger,
    ) -> Result<ProcessOutput, ProcessError> {
        let tool = invocation.tool_name().to_string();
        logger.command(&invocation.display());
        logger.log_args(&tool, &invocation.args);
        logger.clear_tail();

        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled { program: tool });
        }

        let started = Instant::now();
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: tool.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, stdout, stderr_tail) = thread::scope(|scope| {
            let out_reader = scope.spawn(move || read_all(stdout));
            let err_reader = scope.spawn(move || drain_stderr(stderr, logger));

            let status = wait_with_deadline(&mut child, &tool, invocation.timeout, cancel, started);

            // Readers finish once the child is gone and the pipes close.
            let stdout = out_reader.join().unwrap_or_default();
            let stderr_tail = err_reader.join().unwrap_or_default();
            (status, stdout, stderr_tail)
        });

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                logger.warn(&e.to_string());
                logger.show_tail(&tool);
                return Err(e);
            }
        };

        let elapsed = started.elapsed();
        if !status.success() {
            logger.show_tail(&tool);
            let message = failure_message(&stderr_tail);
            return Err(ProcessError::failed(tool, status.code(), message));
        }

        logger.debug(&format!("{} finished in {:.1}s", tool, elapsed.as_secs_f64()));
        Ok(ProcessOutput {
            stdout,
            stderr_tail: stderr_tail.into_iter().collect(),
            elapsed,
        })
    }
}

fn wait_with_deadline(
    child: &mut Child,
    tool: &str,
    timeout: Option<Duration>,
    cancel: &CancelHandle,
    started: Instant,
) -> Result<ExitStatus, ProcessError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(source) => {
                kill(child);
                return Err(ProcessError::Spawn {
                    program: tool.to_string(),
                    source,
                });
            }
        }

        if cancel.is_cancelled() {
            kill(child);
            return Err(ProcessError::Cancelled {
                program: tool.to_string(),
            });
        }

        if let Some(after) = timeout {
            if started.elapsed() >= after {
                kill(child);
                return Err(ProcessError::TimedOut {
                    program: tool.to_string(),
                    after,
                });
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn read_all<R: Read>(pipe: Option<R>) -> String {
    let mut out = String::new();
    if let Some(mut pipe) = pipe {
        let mut bytes = Vec::new();
        if pipe.read_to_end(&mut bytes).is_ok() {
            out = String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    out
}

/// Forward stderr to the job log line by line and keep the last few lines.
fn drain_stderr<R: Read>(pipe: Option<R>, logger: &JobLogger) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let Some(pipe) = pipe else {
        return tail;
    };

    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        logger.output_line(line, true);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }
    tail
}

fn failure_message(tail: &VecDeque<String>) -> String {
    if tail.is_empty() {
        return "no diagnostic output".to_string();
    }
    let skip = tail.len().saturating_sub(MESSAGE_LINES);
    tail.iter().skip(skip).cloned().collect::<Vec<_>>().join(" | ")
}
