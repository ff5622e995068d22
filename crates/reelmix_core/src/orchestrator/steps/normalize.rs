//! Normalize step - loudness-normalizes every audio source independently.

use std::path::PathBuf;

use crate::audio::Normalizer;
use crate::models::{AudioTrack, DropReason, TrackKind};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, NormalizeOutput, StepOutcome};
use crate::probe::probe_media;

/// Normalizes the voice (fatal on failure) and each overlay (dropped on
/// failure), then probes overlay durations for the effect fades.
pub struct NormalizeStep;

impl NormalizeStep {
    pub fn new() -> Self {
        Self
    }

    fn output_path(ctx: &Context, track: &AudioTrack) -> PathBuf {
        match track.kind {
            TrackKind::Voice => ctx.work_path("audio/voice.wav"),
            _ => {
                let stem = track
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| track.label.replace([' ', '#'], ""));
                ctx.work_path(format!("audio/{}.wav", stem))
            }
        }
    }

    /// Content duration of a normalized overlay. Unknown on probe failure.
    fn probe_duration(ctx: &Context, track: &AudioTrack) -> StepResult<Option<f64>> {
        match probe_media(
            ctx.runner.as_ref(),
            &ctx.settings.paths.ffprobe,
            &track.path,
            ctx.settings.encode.probe_timeout(),
            &ctx.cancel,
            &ctx.logger,
        ) {
            Ok(probe) => Ok(probe.duration_secs),
            Err(e) if e.is_fatal() => Err(StepError::Probe(e)),
            Err(e) => {
                ctx.logger.warn(&format!(
                    "Could not read the duration of {} ({}); its fade-out is skipped",
                    track.label, e
                ));
                Ok(None)
            }
        }
    }
}

impl Default for NormalizeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for NormalizeStep {
    fn name(&self) -> &str {
        "Normalize"
    }

    fn description(&self) -> &str {
        "Loudness-normalize each audio source"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let sources = state
            .sources
            .clone()
            .ok_or_else(|| StepError::precondition_failed("no audio sources staged"))?;

        let normalizer = Normalizer::new(
            ctx.runner.as_ref(),
            &ctx.settings.paths.ffmpeg,
            &ctx.settings.audio,
        );
        let mut gain_only = Vec::new();

        let voice_out = Self::output_path(ctx, &sources.voice);
        let voice = normalizer.normalize(&sources.voice, &voice_out, &ctx.cancel, &ctx.logger)?;
        if voice.gain_only {
            gain_only.push(voice.track.label.clone());
        }

        let total = sources.overlays.len();
        let mut overlays = Vec::with_capacity(total);
        for (i, raw) in sources.overlays.iter().enumerate() {
            let output = Self::output_path(ctx, raw);
            match normalizer.normalize(raw, &output, &ctx.cancel, &ctx.logger) {
                Ok(normalized) => {
                    if normalized.gain_only {
                        gain_only.push(normalized.track.label.clone());
                    }
                    let duration = Self::probe_duration(ctx, &normalized.track)?;
                    overlays.push(normalized.track.with_duration(duration));
                }
                Err(e) if e.is_fatal() => return Err(StepError::Normalize(e)),
                Err(e) => {
                    ctx.logger.degraded(&raw.label, &e.to_string());
                    state.degradations.record(
                        raw.label.clone(),
                        raw.kind,
                        DropReason::Normalization,
                        e.to_string(),
                    );
                }
            }
            ctx.logger.progress((((i + 1) * 100) / total) as u32);
        }

        state.normalized = Some(NormalizeOutput {
            voice: voice.track,
            overlays,
            gain_only,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let normalized = state
            .normalized
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Normalized tracks not recorded"))?;
        if normalized.voice.kind != TrackKind::Voice {
            return Err(StepError::invalid_output("normalized voice lost its kind"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{AssemblyRequest, NarrationInput, VisualInput};
    use crate::orchestrator::test_support::{png, test_context_with, FakeRunner};
    use crate::orchestrator::types::SourcesOutput;
    use crate::orchestrator::ErrorCategory;

    fn staged(ctx: &Context) -> SourcesOutput {
        SourcesOutput {
            voice: AudioTrack::voice(ctx.work_path("audio/voice_source.mp3"), -16.0, 1.0)
                .with_duration(Some(10.0)),
            overlays: vec![
                AudioTrack::music(ctx.work_path("audio/music.src"), -28.0, 0.5),
                AudioTrack::effect(0, ctx.work_path("audio/effect_01.src"), 5.0, -22.0, 0.8),
            ],
        }
    }

    fn context(runner: FakeRunner) -> (tempfile::TempDir, Context) {
        let request = AssemblyRequest::new(
            NarrationInput::new(vec![1], 10.0),
            VisualInput::Timed(vec![(0.0, png(1))]),
        );
        let (dir, ctx) = test_context_with(request);
        (dir, ctx.with_runner(Arc::new(runner)))
    }

    #[test]
    fn normalizes_all_tracks_and_probes_overlays() {
        let (_dir, ctx) = context(FakeRunner::new().with_probe_duration(2.0));
        let mut state = JobState::new(ctx.job_id);
        state.sources = Some(staged(&ctx));

        NormalizeStep::new().execute(&ctx, &mut state).unwrap();

        let normalized = state.normalized.unwrap();
        assert!(normalized.voice.path.ends_with("audio/voice.wav"));
        assert_eq!(normalized.voice.duration_secs, Some(10.0));
        assert_eq!(normalized.overlays.len(), 2);
        assert!(normalized.overlays[1].path.ends_with("audio/effect_01.wav"));
        assert_eq!(normalized.overlays[1].duration_secs, Some(2.0));
        assert_eq!(normalized.overlays[1].start_offset_secs, 5.0);
        assert!(normalized.gain_only.is_empty());
        assert!(state.degradations.is_empty());
    }

    #[test]
    fn failing_overlay_is_dropped() {
        let (_dir, ctx) = context(FakeRunner::new().fail_when("music.src"));
        let mut state = JobState::new(ctx.job_id);
        state.sources = Some(staged(&ctx));

        NormalizeStep::new().execute(&ctx, &mut state).unwrap();

        let normalized = state.normalized.unwrap();
        assert_eq!(normalized.overlays.len(), 1);
        assert_eq!(normalized.overlays[0].label, "effect #1");
        assert_eq!(state.degradations.dropped[0].reason, DropReason::Normalization);
    }

    #[test]
    fn failing_voice_is_fatal() {
        let (_dir, ctx) = context(FakeRunner::new().fail_when("voice_source"));
        let mut state = JobState::new(ctx.job_id);
        state.sources = Some(staged(&ctx));

        let err = NormalizeStep::new().execute(&ctx, &mut state).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Normalization);
        assert!(state.normalized.is_none());
    }

    #[test]
    fn probe_failure_only_loses_duration() {
        let (_dir, ctx) = context(FakeRunner::new().fail_when("-show_streams"));
        let mut state = JobState::new(ctx.job_id);
        state.sources = Some(staged(&ctx));

        NormalizeStep::new().execute(&ctx, &mut state).unwrap();

        let normalized = state.normalized.unwrap();
        assert_eq!(normalized.overlays.len(), 2);
        assert!(normalized.overlays.iter().all(|t| t.duration_secs.is_none()));
    }
}
