//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{TrackKind, VolumeConfig};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Loudness normalization.
    #[serde(default)]
    pub audio: AudioSettings,

    /// Placement and mixing.
    #[serde(default)]
    pub mix: MixSettings,

    /// Video encoding and verification.
    #[serde(default)]
    pub encode: EncodeSettings,

    /// Optional asset downloads.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Default gains when a request does not carry its own.
    #[serde(default)]
    pub volume: VolumeConfig,
}

impl Settings {
    /// Check values that serde cannot constrain.
    pub fn validate(&self) -> Result<(), String> {
        self.volume.validate()?;

        let non_negative = [
            ("mix.effect_fade_in_secs", self.mix.effect_fade_in_secs),
            ("mix.effect_fade_out_secs", self.mix.effect_fade_out_secs),
            ("mix.music_fade_in_secs", self.mix.music_fade_in_secs),
            ("mix.music_fade_out_window_secs", self.mix.music_fade_out_window_secs),
            ("encode.terminal_hold_secs", self.encode.terminal_hold_secs),
            ("encode.zoom_rate", self.encode.zoom_rate),
            ("encode.duration_tolerance_secs", self.encode.duration_tolerance_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }

        for (name, value) in [
            ("audio.voice_target_lufs", self.audio.voice_target_lufs),
            ("audio.music_target_lufs", self.audio.music_target_lufs),
            ("audio.effect_target_lufs", self.audio.effect_target_lufs),
        ] {
            if !value.is_finite() || !(-70.0..=-5.0).contains(&value) {
                return Err(format!("{} must be between -70 and -5 LUFS, got {}", name, value));
            }
        }
        if self.audio.music_target_lufs > self.audio.voice_target_lufs
            || self.audio.effect_target_lufs > self.audio.voice_target_lufs
        {
            return Err("music and effect loudness targets must sit below the voice target".into());
        }

        if self.encode.width == 0 || self.encode.height == 0 {
            return Err("encode.width and encode.height must be positive".to_string());
        }
        if self.encode.width % 2 != 0 || self.encode.height % 2 != 0 {
            return Err("encode.width and encode.height must be even for yuv420p".to_string());
        }
        if self.encode.fps == 0 {
            return Err("encode.fps must be positive".to_string());
        }
        if self.encode.zoom_max < 1.0 || !self.encode.zoom_max.is_finite() {
            return Err("encode.zoom_max must be at least 1.0".to_string());
        }
        if self.fetch.max_concurrency == 0 {
            return Err("fetch.max_concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Path configuration for output, temp, and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder receiving finished videos (`<job_id>.mp4`).
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-job workspaces.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for per-job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Keep job workspaces after completion (debugging aid).
    #[serde(default)]
    pub keep_workspace: bool,

    /// ffmpeg executable.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// ffprobe executable.
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_output_folder() -> String {
    "reelmix_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
            keep_workspace: false,
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format (tool output only kept in the tail buffer).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines to show after a failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Log ffmpeg arguments one per line.
    #[serde(default)]
    pub show_commands_pretty: bool,

    /// Log ffmpeg arguments as a JSON array.
    #[serde(default)]
    pub show_commands_json: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_commands_pretty: false,
            show_commands_json: false,
        }
    }
}

/// Loudness normalization targets and dynamics.
///
/// Voice is the reference level. Music and effects sit a fixed distance
/// below it, which is what keeps narration intelligible under overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Integrated loudness target for narration.
    #[serde(default = "default_voice_target")]
    pub voice_target_lufs: f64,

    /// Integrated loudness target for background music.
    #[serde(default = "default_music_target")]
    pub music_target_lufs: f64,

    /// Integrated loudness target for sound effects.
    #[serde(default = "default_effect_target")]
    pub effect_target_lufs: f64,

    /// Maximum true peak in dBTP.
    #[serde(default = "default_true_peak")]
    pub true_peak_db: f64,

    /// Target loudness range in LU.
    #[serde(default = "default_loudness_range")]
    pub loudness_range: f64,

    /// Compressor threshold in dB.
    #[serde(default = "default_compressor_threshold")]
    pub compressor_threshold_db: f64,

    /// Compressor ratio.
    #[serde(default = "default_compressor_ratio")]
    pub compressor_ratio: f64,

    /// Compressor attack in milliseconds.
    #[serde(default = "default_compressor_attack")]
    pub compressor_attack_ms: f64,

    /// Compressor release in milliseconds.
    #[serde(default = "default_compressor_release")]
    pub compressor_release_ms: f64,

    /// Sample rate of every intermediate file.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Time allowed for one normalization pass.
    #[serde(default = "default_normalize_timeout")]
    pub normalize_timeout_secs: u64,
}

fn default_voice_target() -> f64 {
    -16.0
}

fn default_music_target() -> f64 {
    -28.0
}

fn default_effect_target() -> f64 {
    -22.0
}

fn default_true_peak() -> f64 {
    -1.5
}

fn default_loudness_range() -> f64 {
    11.0
}

fn default_compressor_threshold() -> f64 {
    -18.0
}

fn default_compressor_ratio() -> f64 {
    2.0
}

fn default_compressor_attack() -> f64 {
    20.0
}

fn default_compressor_release() -> f64 {
    250.0
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_normalize_timeout() -> u64 {
    120
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            voice_target_lufs: default_voice_target(),
            music_target_lufs: default_music_target(),
            effect_target_lufs: default_effect_target(),
            true_peak_db: default_true_peak(),
            loudness_range: default_loudness_range(),
            compressor_threshold_db: default_compressor_threshold(),
            compressor_ratio: default_compressor_ratio(),
            compressor_attack_ms: default_compressor_attack(),
            compressor_release_ms: default_compressor_release(),
            sample_rate: default_sample_rate(),
            normalize_timeout_secs: default_normalize_timeout(),
        }
    }
}

impl AudioSettings {
    /// Loudness target for a track kind.
    pub fn target_for(&self, kind: TrackKind) -> f64 {
        match kind {
            TrackKind::Voice | TrackKind::Mixed => self.voice_target_lufs,
            TrackKind::Music => self.music_target_lufs,
            TrackKind::Effect => self.effect_target_lufs,
        }
    }

    /// Normalization timeout as a `Duration`.
    pub fn normalize_timeout(&self) -> Duration {
        Duration::from_secs(self.normalize_timeout_secs)
    }
}

/// Fade and mixing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixSettings {
    /// Fade-in at the start of each effect.
    #[serde(default = "default_effect_fade_in")]
    pub effect_fade_in_secs: f64,

    /// Fade-out at the end of each effect.
    #[serde(default = "default_effect_fade_out")]
    pub effect_fade_out_secs: f64,

    /// Fade-in at the start of the music.
    #[serde(default = "default_music_fade_in")]
    pub music_fade_in_secs: f64,

    /// Music fade-out window, anchored to the end of the narration.
    #[serde(default = "default_music_fade_out_window")]
    pub music_fade_out_window_secs: f64,

    /// Time allowed for one mix attempt.
    #[serde(default = "default_mix_timeout")]
    pub mix_timeout_secs: u64,
}

fn default_effect_fade_in() -> f64 {
    0.5
}

fn default_effect_fade_out() -> f64 {
    0.7
}

fn default_music_fade_in() -> f64 {
    1.0
}

fn default_music_fade_out_window() -> f64 {
    3.0
}

fn default_mix_timeout() -> u64 {
    300
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            effect_fade_in_secs: default_effect_fade_in(),
            effect_fade_out_secs: default_effect_fade_out(),
            music_fade_in_secs: default_music_fade_in(),
            music_fade_out_window_secs: default_music_fade_out_window(),
            mix_timeout_secs: default_mix_timeout(),
        }
    }
}

impl MixSettings {
    /// Mix timeout as a `Duration`.
    pub fn mix_timeout(&self) -> Duration {
        Duration::from_secs(self.mix_timeout_secs)
    }
}

/// Video rendering, packaging and verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// Output width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Zoom increment per output frame.
    #[serde(default = "default_zoom_rate")]
    pub zoom_rate: f64,

    /// Maximum zoom factor.
    #[serde(default = "default_zoom_max")]
    pub zoom_max: f64,

    /// x264 preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// x264 constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// AAC bitrate.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Extra hold added to the last image so video never ends before the audio.
    #[serde(default = "default_terminal_hold")]
    pub terminal_hold_secs: f64,

    /// Time allowed for the encoder.
    #[serde(default = "default_encode_timeout")]
    pub timeout_secs: u64,

    /// Time allowed for one ffprobe call.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Allowed difference between artifact and narration duration before warning.
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance_secs: f64,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_fps() -> u32 {
    30
}

fn default_zoom_rate() -> f64 {
    0.0005
}

fn default_zoom_max() -> f64 {
    1.15
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u32 {
    20
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_terminal_hold() -> f64 {
    1.0
}

fn default_encode_timeout() -> u64 {
    900
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_duration_tolerance() -> f64 {
    1.0
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            zoom_rate: default_zoom_rate(),
            zoom_max: default_zoom_max(),
            preset: default_preset(),
            crf: default_crf(),
            audio_bitrate: default_audio_bitrate(),
            terminal_hold_secs: default_terminal_hold(),
            timeout_secs: default_encode_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            duration_tolerance_secs: default_duration_tolerance(),
        }
    }
}

impl EncodeSettings {
    /// Encoder timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Probe timeout as a `Duration`.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Optional asset downloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Maximum simultaneous downloads.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Time allowed for one download.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_fetch_timeout() -> u64 {
    60
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

impl FetchSettings {
    /// Download timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Audio,
    Mix,
    Encode,
    Fetch,
    Volume,
}

impl ConfigSection {
    /// Every section, in file order.
    pub const ALL: [ConfigSection; 7] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Audio,
        ConfigSection::Mix,
        ConfigSection::Encode,
        ConfigSection::Fetch,
        ConfigSection::Volume,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Audio => "audio",
            ConfigSection::Mix => "mix",
            ConfigSection::Encode => "encode",
            ConfigSection::Fetch => "fetch",
            ConfigSection::Volume => "volume",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output, workspace and tool locations",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Audio => "Loudness normalization (LUFS targets, dynamics)",
            ConfigSection::Mix => "Fades and mixing",
            ConfigSection::Encode => "Video encoding and verification",
            ConfigSection::Fetch => "Music / sound effect downloads",
            ConfigSection::Volume => "Default gains (voice-focused, balanced, cinematic presets)",
        }
    }
}

impl std::str::FromStr for ConfigSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ConfigSection::ALL
            .into_iter()
            .find(|section| section.table_name() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = ConfigSection::ALL.iter().map(|c| c.table_name()).collect();
                format!("unknown config section '{}' (expected one of {})", s, names.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[audio]"));
        assert!(toml.contains("voice_target_lufs"));
    }

    #[test]
    fn default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[paths]\noutput_folder = \"custom_output\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        // Custom value preserved
        assert_eq!(parsed.paths.output_folder, "custom_output");
        // Defaults applied for missing
        assert!(parsed.logging.compact);
        assert_eq!(parsed.encode.fps, 30);
        assert_eq!(parsed.fetch.max_concurrency, 4);
    }

    #[test]
    fn overlays_must_sit_below_voice() {
        let mut settings = Settings::default();
        settings.audio.music_target_lufs = -10.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn odd_dimensions_are_rejected() {
        let mut settings = Settings::default();
        settings.encode.width = 1281;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn targets_by_kind() {
        let audio = AudioSettings::default();
        assert_eq!(audio.target_for(TrackKind::Voice), -16.0);
        assert_eq!(audio.target_for(TrackKind::Music), -28.0);
        assert_eq!(audio.target_for(TrackKind::Effect), -22.0);
    }

    #[test]
    fn sections_parse_by_table_name() {
        assert_eq!("encode".parse::<ConfigSection>(), Ok(ConfigSection::Encode));
        assert_eq!(" Volume ".parse::<ConfigSection>(), Ok(ConfigSection::Volume));
        assert!("video".parse::<ConfigSection>().is_err());
    }

    #[test]
    fn settings_compare_by_value() {
        let defaults = Settings::default();
        let reparsed: Settings = toml::from_str(&toml::to_string_pretty(&defaults).unwrap()).unwrap();
        assert_eq!(reparsed, defaults);

        let mut changed = defaults.clone();
        changed.mix.music_fade_in_secs += 1.0;
        assert_ne!(changed, defaults);
        assert_ne!(changed.mix, defaults.mix);
    }

    #[test]
    fn every_section_is_serialized() {
        let toml = toml::to_string_pretty(&Settings::default()).unwrap();
        for section in ConfigSection::ALL {
            assert!(
                toml.contains(&format!("[{}]", section.table_name())),
                "missing [{}]",
                section.table_name()
            );
        }
    }
}
