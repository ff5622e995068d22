//! External tool invocations and their results.

use std::io;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// One external command with structured arguments.
///
/// Arguments are never joined into a shell string for execution; `display()`
/// only exists for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Deadline for the whole run. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Short tool name for messages ("ffmpeg" for "/usr/bin/ffmpeg").
    pub fn tool_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    /// Copy-pasteable command line for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value following `flag`, e.g. the filter graph after `-filter_complex`.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// The last argument, which is the output path for every ffmpeg call
    /// built in this crate.
    pub fn output_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:+,@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// What a finished tool run produced.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Full stdout (ffprobe JSON, for instance).
    pub stdout: String,
    /// Last stderr lines.
    pub stderr_tail: Vec<String>,
    pub elapsed: Duration,
}

/// Why a tool run did not succeed.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {}: {message}", describe_exit(.exit_code))]
    Failed {
        program: String,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("{program} timed out after {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("{program} was cancelled")]
    Cancelled { program: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

impl ProcessError {
    pub fn failed(
        program: impl Into<String>,
        exit_code: Option<i32>,
        message: impl Into<String>,
    ) -> Self {
        Self::Failed {
            program: program.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::TimedOut { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessError::Cancelled { .. })
    }

    /// Timeouts and cancellation end the job; everything else may be
    /// worked around by the caller.
    pub fn is_fatal(&self) -> bool {
        self.is_timeout() || self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_only_when_needed() {
        let inv = Invocation::new(
            "ffmpeg",
            ["-i", "/w/voice.src", "-af", "volume=0.8", "-filter_complex", "[0:a]anull[a0]"],
        );
        assert_eq!(
            inv.display(),
            "ffmpeg -i /w/voice.src -af volume=0.8 -filter_complex '[0:a]anull[a0]'"
        );
    }

    #[test]
    fn display_escapes_single_quotes() {
        let inv = Invocation::new("ffmpeg", ["it's.wav"]);
        assert_eq!(inv.display(), "ffmpeg 'it'\\''s.wav'");
    }

    #[test]
    fn lookups() {
        let inv = Invocation::new("/usr/bin/ffmpeg", ["-filter_complex", "graph", "out.wav"])
            .with_timeout(Duration::from_secs(5));
        assert_eq!(inv.tool_name(), "ffmpeg");
        assert_eq!(inv.arg_after("-filter_complex"), Some("graph"));
        assert_eq!(inv.arg_after("-af"), None);
        assert_eq!(inv.output_arg(), Some("out.wav"));
        assert_eq!(inv.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn error_messages() {
        let err = ProcessError::failed("ffmpeg", Some(1), "Invalid data found");
        assert_eq!(err.to_string(), "ffmpeg exited with code 1: Invalid data found");
        assert!(!err.is_fatal());

        let err = ProcessError::TimedOut {
            program: "ffmpeg".into(),
            after: Duration::from_secs(300),
        };
        assert_eq!(err.to_string(), "ffmpeg timed out after 300s");
        assert!(err.is_fatal());
    }
}
