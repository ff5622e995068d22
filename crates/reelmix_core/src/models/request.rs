//! Job request delivered by the upstream generators.

use super::volume::VolumeConfig;

/// Narration audio as produced by the text-to-speech collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationInput {
    /// Encoded audio (any format ffmpeg can decode).
    pub audio_bytes: Vec<u8>,
    /// Measured narration length in seconds.
    pub duration_secs: f64,
    /// File extension hint for the encoded audio (e.g. "mp3").
    pub format_hint: Option<String>,
}

impl NarrationInput {
    pub fn new(audio_bytes: Vec<u8>, duration_secs: f64) -> Self {
        Self {
            audio_bytes,
            duration_secs,
            format_hint: None,
        }
    }

    /// Set the file extension hint.
    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }
}

/// Images for the job, either timed or evenly spaced.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualInput {
    /// `(timestamp_secs, image_bytes)` pairs in any order.
    Timed(Vec<(f64, Vec<u8>)>),
    /// Images in display order, spread evenly across `total_duration_secs`.
    Untimed {
        images: Vec<Vec<u8>>,
        total_duration_secs: f64,
    },
}

impl VisualInput {
    /// Number of images supplied.
    pub fn len(&self) -> usize {
        match self {
            VisualInput::Timed(pairs) => pairs.len(),
            VisualInput::Untimed { images, .. } => images.len(),
        }
    }

    /// Whether no image was supplied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A sound effect to place on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectCue {
    /// Narration time at which the effect starts.
    pub timestamp_secs: f64,
    /// Remote (or local) reference to the effect audio.
    pub url: String,
}

impl EffectCue {
    pub fn new(timestamp_secs: f64, url: impl Into<String>) -> Self {
        Self {
            timestamp_secs,
            url: url.into(),
        }
    }
}

/// Everything the pipeline needs to assemble one video.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyRequest {
    /// Narration audio (mandatory).
    pub narration: NarrationInput,
    /// Images (at least one).
    pub visuals: VisualInput,
    /// Optional background music reference.
    pub music_url: Option<String>,
    /// Optional sound effects.
    pub effects: Vec<EffectCue>,
    /// Gains applied after normalization.
    pub volume: VolumeConfig,
}

impl AssemblyRequest {
    /// Create a request with narration and visuals only.
    pub fn new(narration: NarrationInput, visuals: VisualInput) -> Self {
        Self {
            narration,
            visuals,
            music_url: None,
            effects: Vec::new(),
            volume: VolumeConfig::default(),
        }
    }

    /// Set the background music reference.
    pub fn with_music(mut self, url: impl Into<String>) -> Self {
        self.music_url = Some(url.into());
        self
    }

    /// Add a sound effect cue.
    pub fn with_effect(mut self, cue: EffectCue) -> Self {
        self.effects.push(cue);
        self
    }

    /// Set the volume configuration.
    pub fn with_volume(mut self, volume: VolumeConfig) -> Self {
        self.volume = volume;
        self
    }

    /// Number of optional overlays requested.
    pub fn optional_track_count(&self) -> usize {
        usize::from(self.music_url.is_some()) + self.effects.len()
    }

    /// Check mandatory inputs before any processing starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.narration.audio_bytes.is_empty() {
            return Err("narration audio is empty".to_string());
        }
        let duration = self.narration.duration_secs;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(format!(
                "narration duration must be a positive number of seconds, got {}",
                duration
            ));
        }
        if self.visuals.is_empty() {
            return Err("at least one image is required".to_string());
        }
        if let VisualInput::Untimed {
            total_duration_secs,
            ..
        } = &self.visuals
        {
            if !total_duration_secs.is_finite() || *total_duration_secs <= 0.0 {
                return Err(format!(
                    "untimed visuals need a positive total duration, got {}",
                    total_duration_secs
                ));
            }
        }
        if let Some(url) = &self.music_url {
            if url.trim().is_empty() {
                return Err("music reference is empty".to_string());
            }
        }
        for (i, cue) in self.effects.iter().enumerate() {
            if !cue.timestamp_secs.is_finite() || cue.timestamp_secs < 0.0 {
                return Err(format!(
                    "effect #{} has an invalid timestamp {}",
                    i + 1,
                    cue.timestamp_secs
                ));
            }
            if cue.url.trim().is_empty() {
                return Err(format!("effect #{} has an empty reference", i + 1));
            }
        }
        self.volume.validate()
    }
}
