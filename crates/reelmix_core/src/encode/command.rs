//! ffmpeg arguments for the final encode.
//!
//! Visuals come from the concat manifest, audio from the mixed WAV. The
//! video chain is `fps` → cover scale → center crop → `zoompan` (slow
//! continuous zoom at the output size) → `setsar=1,format=yuv420p`.

use std::path::Path;

use crate::config::EncodeSettings;
use crate::process::Invocation;

/// Builds the encoder command line.
pub struct EncodeCommandBuilder<'a> {
    manifest: &'a Path,
    audio: &'a Path,
    output: &'a Path,
    settings: &'a EncodeSettings,
    sample_rate: u32,
}

impl<'a> EncodeCommandBuilder<'a> {
    pub fn new(
        manifest: &'a Path,
        audio: &'a Path,
        output: &'a Path,
        settings: &'a EncodeSettings,
    ) -> Self {
        Self {
            manifest,
            audio,
            output,
            settings,
            sample_rate: 48000,
        }
    }

    /// Audio sample rate of the packaged stream.
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// The `-vf` chain.
    pub fn video_filter(&self) -> String {
        let s = self.settings;
        let (w, h, fps) = (s.width, s.height, s.fps);
        format!(
            "fps={fps},\
             scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},\
             zoompan=z='min(zoom+{rate},{max})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps},\
             setsar=1,format=yuv420p",
            rate = s.zoom_rate,
            max = s.zoom_max,
        )
    }

    /// Complete argument list.
    pub fn build(&self) -> Vec<String> {
        let mut tokens: Vec<String> = ["-y", "-hide_banner", "-nostats", "-loglevel", "error"]
            .into_iter()
            .map(String::from)
            .collect();

        // Visual input: the concat manifest
        tokens.extend(["-f", "concat", "-safe", "0", "-i"].map(String::from));
        tokens.push(self.manifest.to_string_lossy().into_owned());

        // Audio input: the mix
        tokens.push("-i".to_string());
        tokens.push(self.audio.to_string_lossy().into_owned());

        tokens.extend(["-map", "0:v:0", "-map", "1:a:0"].map(String::from));
        tokens.push("-vf".to_string());
        tokens.push(self.video_filter());

        self.add_codec_options(&mut tokens);

        // The narration decides where the output ends
        tokens.push("-shortest".to_string());
        tokens.extend(["-movflags", "+faststart"].map(String::from));
        tokens.push(self.output.to_string_lossy().into_owned());
        tokens
    }

    fn add_codec_options(&self, tokens: &mut Vec<String>) {
        let s = self.settings;
        tokens.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            s.preset.clone(),
            "-crf".to_string(),
            s.crf.to_string(),
            "-r".to_string(),
            s.fps.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            s.audio_bitrate.clone(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
        ]);
    }

    pub fn invocation(&self, ffmpeg: &str) -> Invocation {
        Invocation::new(ffmpeg, self.build()).with_timeout(self.settings.timeout())
    }
}
