//! Final encode: ffmpeg packaging, ffprobe verification, persistence.

mod command;
mod encoder;
mod verify;

pub use command::EncodeCommandBuilder;
pub use encoder::{persist, EncodeError, EncodedVideo, Encoder};
pub use verify::{verify_media, VerifiedMedia};
