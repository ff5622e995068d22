//! Audio processing: per-track normalization and timed mixing.

mod mix;
mod normalize;

pub use mix::{ExcludedTrack, MixError, MixOutcome, MixPlan, Mixer};
pub use normalize::{
    gain_only_filter, loudness_filter, normalize_invocation, NormalizeError, Normalized,
    Normalizer,
};
