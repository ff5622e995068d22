//! External process execution (ffmpeg, ffprobe).

mod invocation;
mod runner;

pub use invocation::{Invocation, ProcessError, ProcessOutput};
pub use runner::{MediaRunner, SystemRunner};
