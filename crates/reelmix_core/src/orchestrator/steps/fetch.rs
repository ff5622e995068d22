//! Fetch step - stages the narration and retrieves optional assets.

use std::fs;

use crate::fetch::{AssetFetcher, AssetRequest, HttpFetcher};
use crate::models::{AudioTrack, DropReason, TrackKind};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, SourcesOutput, StepOutcome};

/// Writes the narration into the workspace and downloads music and effects.
///
/// A failed download only drops its track. Timeouts and cancellation end
/// the job.
pub struct FetchStep;

impl FetchStep {
    pub fn new() -> Self {
        Self
    }

    /// Raw overlay tracks with their download requests, in request order.
    fn plan(ctx: &Context) -> Vec<(AudioTrack, AssetRequest)> {
        let audio = &ctx.settings.audio;
        let volume = &ctx.request.volume;
        let mut planned = Vec::new();

        if let Some(url) = &ctx.request.music_url {
            let dest = ctx.work_path("audio/music.src");
            let track = AudioTrack::music(
                &dest,
                audio.target_for(TrackKind::Music),
                volume.gain_for(TrackKind::Music),
            );
            planned.push((track, AssetRequest::new("music", url, dest)));
        }

        for (i, cue) in ctx.request.effects.iter().enumerate() {
            let dest = ctx.work_path(format!("audio/effect_{:02}.src", i + 1));
            let track = AudioTrack::effect(
                i,
                &dest,
                cue.timestamp_secs,
                audio.target_for(TrackKind::Effect),
                volume.gain_for(TrackKind::Effect),
            );
            let request = AssetRequest::new(track.label.clone(), &cue.url, dest);
            planned.push((track, request));
        }

        planned
    }

    fn stage_voice(ctx: &Context) -> StepResult<AudioTrack> {
        let narration = &ctx.request.narration;
        let ext = narration
            .format_hint
            .as_deref()
            .filter(|h| !h.is_empty() && h.bytes().all(|b| b.is_ascii_alphanumeric()))
            .unwrap_or("src");
        let path = ctx.work_path(format!("audio/voice_source.{}", ext));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StepError::io_error("creating audio directory", e))?;
        }
        fs::write(&path, &narration.audio_bytes)
            .map_err(|e| StepError::io_error("writing narration", e))?;

        Ok(AudioTrack::voice(
            path,
            ctx.settings.audio.target_for(TrackKind::Voice),
            ctx.request.volume.gain_for(TrackKind::Voice),
        )
        .with_duration(Some(narration.duration_secs)))
    }
}

impl Default for FetchStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for FetchStep {
    fn name(&self) -> &str {
        "Fetch"
    }

    fn description(&self) -> &str {
        "Stage narration and retrieve optional assets"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if ctx.request.narration.audio_bytes.is_empty() {
            return Err(StepError::invalid_input("narration audio is empty"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let voice = Self::stage_voice(ctx)?;
        ctx.logger.info(&format!(
            "Narration: {} bytes, {:.2}s",
            ctx.request.narration.audio_bytes.len(),
            ctx.narration_secs()
        ));

        let planned = Self::plan(ctx);
        if planned.is_empty() {
            ctx.logger.info("No optional assets requested");
            state.sources = Some(SourcesOutput {
                voice,
                overlays: Vec::new(),
            });
            return Ok(StepOutcome::Success);
        }

        let requests: Vec<AssetRequest> = planned.iter().map(|(_, r)| r.clone()).collect();
        ctx.logger.info(&format!(
            "Retrieving {} asset(s), at most {} at a time",
            requests.len(),
            ctx.settings.fetch.max_concurrency
        ));

        let results = match &ctx.fetcher {
            Some(fetcher) => fetcher.fetch_all(&requests, &ctx.cancel),
            None => HttpFetcher::new(&ctx.settings.fetch)?.fetch_all(&requests, &ctx.cancel),
        };

        let mut overlays = Vec::new();
        for ((track, request), result) in planned.into_iter().zip(results) {
            match result {
                Ok(path) => {
                    ctx.logger.debug(&format!("{} -> {}", request.label, path.display()));
                    overlays.push(track.with_path(path));
                }
                Err(e) if e.is_fatal() => return Err(StepError::Fetch(e)),
                Err(e) => {
                    ctx.logger.degraded(&track.label, &e.to_string());
                    state.degradations.record(
                        track.label.clone(),
                        track.kind,
                        DropReason::AssetRetrieval,
                        e.to_string(),
                    );
                }
            }
        }

        ctx.logger.info(&format!(
            "{} of {} asset(s) retrieved",
            overlays.len(),
            requests.len()
        ));
        state.sources = Some(SourcesOutput { voice, overlays });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let sources = state
            .sources
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Sources not recorded"))?;
        if !sources.voice.path.is_file() {
            return Err(StepError::invalid_output("narration was not written"));
        }
        Ok(())
    }
}
