//! Mix step - places the normalized tracks on the narration timeline.

use crate::audio::{MixPlan, Mixer};
use crate::models::DropReason;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, MixOutput, StepOutcome};

/// Mixes voice, music and effects into one track, excluding overlays that
/// break the filter graph.
pub struct MixStep;

impl MixStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MixStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for MixStep {
    fn name(&self) -> &str {
        "Mix"
    }

    fn description(&self) -> &str {
        "Mix voice and overlays into one track"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let normalized = state
            .normalized
            .clone()
            .ok_or_else(|| StepError::precondition_failed("no normalized tracks"))?;

        let plan = MixPlan::new(
            normalized.voice,
            normalized.overlays,
            ctx.narration_secs(),
            &ctx.settings.mix,
            ctx.settings.audio.sample_rate,
        );
        if !plan.is_voice_only() {
            let (start, duration) = plan.music_fade_out_window();
            ctx.logger.debug(&format!(
                "Music fade-out {:.2}s..{:.2}s",
                start,
                start + duration
            ));
        }
        let included_at_start: Vec<String> =
            plan.overlays().iter().map(|t| t.label.clone()).collect();

        let mixer = Mixer::new(
            ctx.runner.as_ref(),
            &ctx.settings.paths.ffmpeg,
            ctx.settings.mix.mix_timeout(),
        );
        let outcome = mixer.mix(plan, &ctx.work_path("audio/mix.wav"), &ctx.cancel, &ctx.logger)?;

        for excluded in &outcome.excluded {
            state.degradations.record(
                excluded.track.label.clone(),
                excluded.track.kind,
                DropReason::MixExclusion,
                excluded.reason.clone(),
            );
        }
        let included: Vec<String> = included_at_start
            .into_iter()
            .filter(|label| !outcome.excluded.iter().any(|e| &e.track.label == label))
            .collect();

        ctx.logger.info(&format!(
            "Mix ready after {} attempt(s) with {} overlay(s)",
            outcome.attempts,
            included.len()
        ));

        state.mix = Some(MixOutput {
            track: outcome.track,
            included,
            attempts: outcome.attempts,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if !state.has_mix() {
            return Err(StepError::invalid_output("Mix not recorded"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{AudioTrack, TrackKind};
    use crate::orchestrator::test_support::{test_context, FakeRunner};
    use crate::orchestrator::types::NormalizeOutput;

    fn normalized(ctx: &Context, overlays: Vec<AudioTrack>) -> NormalizeOutput {
        NormalizeOutput {
            voice: AudioTrack::voice(ctx.work_path("audio/voice.wav"), -16.0, 1.0)
                .with_duration(Some(8.0)),
            overlays,
            gain_only: Vec::new(),
        }
    }

    #[test]
    fn voice_only_mix_is_the_voice_file() {
        let (_dir, ctx) = test_context();
        let runner = Arc::new(FakeRunner::new());
        let ctx = ctx.with_runner(runner.clone());
        let mut state = JobState::new(ctx.job_id);
        state.normalized = Some(normalized(&ctx, Vec::new()));

        MixStep::new().execute(&ctx, &mut state).unwrap();

        let mix = state.mix.unwrap();
        assert_eq!(mix.track.kind, TrackKind::Mixed);
        assert_eq!(mix.track.path, ctx.work_path("audio/voice.wav"));
        assert_eq!(mix.attempts, 0);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn excluded_overlay_is_reported() {
        let (_dir, ctx) = test_context();
        let ctx = ctx.with_runner(Arc::new(FakeRunner::new().fail_when("effect_01.wav")));
        let mut state = JobState::new(ctx.job_id);
        state.normalized = Some(normalized(
            &ctx,
            vec![
                AudioTrack::music(ctx.work_path("audio/music.wav"), -28.0, 0.5),
                AudioTrack::effect(0, ctx.work_path("audio/effect_01.wav"), 2.0, -22.0, 0.8),
            ],
        ));

        MixStep::new().execute(&ctx, &mut state).unwrap();

        let mix = state.mix.unwrap();
        assert_eq!(mix.track.path, ctx.work_path("audio/mix.wav"));
        assert_eq!(mix.included, vec!["music"]);
        assert!(state.degradations.contains("effect #1"));
        assert_eq!(state.degradations.dropped[0].reason, DropReason::MixExclusion);
    }
}
