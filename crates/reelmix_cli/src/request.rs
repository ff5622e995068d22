//! Job request files.
//!
//! A request file names local files for the narration and images; music and
//! effects stay as URLs for the pipeline to download. Relative paths resolve
//! against the request file's folder.
//!
//! ```json
//! {
//!   "narration": { "path": "voice.mp3", "duration_secs": 10.0 },
//!   "images": [ { "path": "a.png", "at": 0.0 }, { "path": "b.png", "at": 3.0 } ],
//!   "music": "https://cdn.example/music.mp3",
//!   "effects": [ { "at": 5.0, "url": "https://cdn.example/boom.wav" } ],
//!   "volume": { "voice_gain": 1.0, "effect_gain": 0.8, "music_gain": 0.5 }
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use serde::Deserialize;

use reelmix_core::models::{AssemblyRequest, EffectCue, NarrationInput, VisualInput, VolumeConfig};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestFile {
    pub narration: NarrationFile,
    #[serde(default)]
    pub images: Vec<ImageFile>,
    /// Spread `images` evenly over this many seconds instead of using `at`.
    #[serde(default)]
    pub untimed_duration_secs: Option<f64>,
    #[serde(default)]
    pub music: Option<String>,
    #[serde(default)]
    pub effects: Vec<EffectFile>,
    #[serde(default)]
    pub volume: Option<VolumeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NarrationFile {
    pub path: PathBuf,
    pub duration_secs: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageFile {
    pub path: PathBuf,
    #[serde(default)]
    pub at: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectFile {
    pub at: f64,
    pub url: String,
}

impl RequestFile {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read request '{}'", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse request '{}'", path.display()))
    }

    /// Load every referenced file and build the pipeline request.
    ///
    /// `default_volume` applies when the file has no `volume` block.
    pub fn into_request(
        self,
        base_dir: &Path,
        default_volume: VolumeConfig,
    ) -> anyhow::Result<AssemblyRequest> {
        let narration_path = base_dir.join(&self.narration.path);
        let audio = read(&narration_path)?;
        let mut narration = NarrationInput::new(audio, self.narration.duration_secs);
        if let Some(ext) = narration_path.extension() {
            narration = narration.with_format_hint(ext.to_string_lossy());
        }

        let visuals = match self.untimed_duration_secs {
            Some(total_duration_secs) => VisualInput::Untimed {
                images: self
                    .images
                    .iter()
                    .map(|image| read(&base_dir.join(&image.path)))
                    .collect::<anyhow::Result<_>>()?,
                total_duration_secs,
            },
            None => {
                let mut pairs = Vec::with_capacity(self.images.len());
                for image in &self.images {
                    let Some(at) = image.at else {
                        bail!(
                            "image '{}' has no \"at\" timestamp (set untimed_duration_secs to space images evenly)",
                            image.path.display()
                        );
                    };
                    pairs.push((at, read(&base_dir.join(&image.path))?));
                }
                VisualInput::Timed(pairs)
            }
        };

        let mut request = AssemblyRequest::new(narration, visuals)
            .with_volume(self.volume.unwrap_or(default_volume));
        if let Some(music) = self.music {
            request = request.with_music(music);
        }
        for effect in self.effects {
            request = request.with_effect(EffectCue::new(effect.at, effect.url));
        }
        Ok(request)
    }
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_assets(dir: &Path) {
        fs::write(dir.join("voice.mp3"), b"ID3").unwrap();
        fs::write(dir.join("a.png"), b"\x89PNG\r\n\x1a\n1").unwrap();
        fs::write(dir.join("b.png"), b"\x89PNG\r\n\x1a\n2").unwrap();
    }

    fn parse(json: &str) -> RequestFile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn timed_request_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        write_assets(dir.path());
        let file = parse(
            r#"{
                "narration": { "path": "voice.mp3", "duration_secs": 10.0 },
                "images": [ { "path": "b.png", "at": 3.0 }, { "path": "a.png", "at": 0.0 } ],
                "music": "https://cdn.test/music.mp3",
                "effects": [ { "at": 5.0, "url": "https://cdn.test/boom.wav" } ]
            }"#,
        );

        let request = file
            .into_request(dir.path(), VolumeConfig::new(1.0, 0.5, 0.3))
            .unwrap();

        assert_eq!(request.narration.format_hint.as_deref(), Some("mp3"));
        assert_eq!(request.narration.duration_secs, 10.0);
        match &request.visuals {
            VisualInput::Timed(pairs) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0].0, 3.0);
            }
            other => panic!("expected timed visuals, got {:?}", other),
        }
        assert_eq!(request.music_url.as_deref(), Some("https://cdn.test/music.mp3"));
        assert_eq!(request.effects[0].timestamp_secs, 5.0);
        assert_eq!(request.volume, VolumeConfig::new(1.0, 0.5, 0.3));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn untimed_request_ignores_timestamps() {
        let dir = tempdir().unwrap();
        write_assets(dir.path());
        let file = parse(
            r#"{
                "narration": { "path": "voice.mp3", "duration_secs": 6.0 },
                "images": [ { "path": "a.png" }, { "path": "b.png" } ],
                "untimed_duration_secs": 6.0,
                "volume": { "voice_gain": 0.9, "effect_gain": 1.0, "music_gain": 0.8 }
            }"#,
        );

        let request = file
            .into_request(dir.path(), VolumeConfig::new(1.0, 0.8, 0.5))
            .unwrap();

        assert!(matches!(
            request.visuals,
            VisualInput::Untimed { ref images, total_duration_secs } if images.len() == 2 && total_duration_secs == 6.0
        ));
        assert_eq!(request.volume, VolumeConfig::new(0.9, 1.0, 0.8));
    }

    #[test]
    fn missing_timestamp_is_an_error() {
        let dir = tempdir().unwrap();
        write_assets(dir.path());
        let file = parse(
            r#"{
                "narration": { "path": "voice.mp3", "duration_secs": 6.0 },
                "images": [ { "path": "a.png" } ]
            }"#,
        );

        let err = file
            .into_request(dir.path(), VolumeConfig::new(1.0, 0.8, 0.5))
            .unwrap_err();
        assert!(err.to_string().contains("untimed_duration_secs"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempdir().unwrap();
        let file = parse(r#"{ "narration": { "path": "nope.mp3", "duration_secs": 1.0 } }"#);

        let err = file
            .into_request(dir.path(), VolumeConfig::new(1.0, 0.8, 0.5))
            .unwrap_err();
        assert!(err.to_string().contains("nope.mp3"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<RequestFile, _> = serde_json::from_str(
            r#"{ "narration": { "path": "v.mp3", "duration_secs": 1.0 }, "colour": "red" }"#,
        );
        assert!(result.is_err());
    }
}
