//! Temporal placement and mixing.
//!
//! A [`MixPlan`] holds the normalized tracks in input order (voice, music,
//! effects in cue order) and renders them into one `filter_complex` graph:
//!
//! ```text
//! [0:a] voice ────────────────────────────────────────┐
//! [1:a] music: fade in at 0, fade out ending at voice ├─ amix(duration=longest, normalize=0)
//! [2:a] effect: fade in/out at its edges, adelay ─────┘
//! ```
//!
//! `amix` runs with `duration=longest` so a late effect is never cut; the
//! final mux uses `-shortest` and trims everything to the narration.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::MixSettings;
use crate::logging::JobLogger;
use crate::models::{AudioTrack, TrackKind};
use crate::orchestrator::CancelHandle;
use crate::process::{Invocation, MediaRunner, ProcessError};

/// Ordered set of normalized tracks plus fade parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MixPlan {
    voice: AudioTrack,
    music: Option<AudioTrack>,
    effects: Vec<AudioTrack>,
    voice_duration_secs: f64,
    fades: MixSettings,
    sample_rate: u32,
}

impl MixPlan {
    /// Build a plan. `overlays` may hold music and effects in any mix; effects
    /// keep their relative order. Only the first music track is used.
    pub fn new(
        voice: AudioTrack,
        overlays: Vec<AudioTrack>,
        voice_duration_secs: f64,
        fades: &MixSettings,
        sample_rate: u32,
    ) -> Self {
        let mut music = None;
        let mut effects = Vec::new();
        for track in overlays {
            match track.kind {
                TrackKind::Music if music.is_none() => music = Some(track),
                TrackKind::Effect => effects.push(track),
                _ => {}
            }
        }

        Self {
            voice,
            music,
            effects,
            voice_duration_secs,
            fades: fades.clone(),
            sample_rate,
        }
    }

    pub fn voice(&self) -> &AudioTrack {
        &self.voice
    }

    /// Every input in ffmpeg input order.
    pub fn inputs(&self) -> Vec<&AudioTrack> {
        std::iter::once(&self.voice)
            .chain(self.music.iter())
            .chain(self.effects.iter())
            .collect()
    }

    /// Music and effects, in input order.
    pub fn overlays(&self) -> Vec<&AudioTrack> {
        self.music.iter().chain(self.effects.iter()).collect()
    }

    pub fn is_voice_only(&self) -> bool {
        self.music.is_none() && self.effects.is_empty()
    }

    /// Music fade-out as `(start, duration)`, ending with the narration.
    /// The start is clamped at 0 for narrations shorter than the window.
    pub fn music_fade_out_window(&self) -> (f64, f64) {
        let end = self.voice_duration_secs.max(0.0);
        let start = (end - self.fades.music_fade_out_window_secs).max(0.0);
        (start, end - start)
    }

    /// Labels of the overlays in the order they are tried for exclusion:
    /// latest effect first, music last.
    pub fn exclusion_order(&self) -> Vec<String> {
        self.effects
            .iter()
            .rev()
            .chain(self.music.iter())
            .map(|t| t.label.clone())
            .collect()
    }

    /// The same plan without the overlay labelled `label`.
    pub fn without(&self, label: &str) -> MixPlan {
        let mut reduced = self.clone();
        if reduced.music.as_ref().is_some_and(|m| m.label == label) {
            reduced.music = None;
        }
        reduced.effects.retain(|e| e.label != label);
        reduced
    }

    /// Voice plus the single overlay named `label`.
    pub fn only(&self, label: &str) -> MixPlan {
        let mut single = self.clone();
        single.music = single.music.filter(|m| m.label == label);
        single.effects.retain(|e| e.label == label);
        single
    }

    /// Render the `filter_complex` graph. Output pad is `[mix]`.
    pub fn filter_graph(&self) -> String {
        let format = format!(
            "aformat=sample_rates={}:channel_layouts=stereo",
            self.sample_rate
        );
        let mut chains = Vec::new();
        let mut pads = String::new();

        for (i, track) in self.inputs().into_iter().enumerate() {
            let mut filters = vec![format.clone()];
            match track.kind {
                TrackKind::Music => filters.extend(self.music_filters()),
                TrackKind::Effect => filters.extend(self.effect_filters(track)),
                _ => {}
            }
            chains.push(format!("[{i}:a]{}[a{i}]", filters.join(",")));
            pads.push_str(&format!("[a{i}]"));
        }

        let count = chains.len();
        chains.push(format!(
            "{pads}amix=inputs={count}:duration=longest:dropout_transition=0:normalize=0[mix]"
        ));
        chains.join(";")
    }

    fn music_filters(&self) -> Vec<String> {
        let mut filters = Vec::new();
        if self.fades.music_fade_in_secs > 0.0 {
            filters.push(format!("afade=t=in:st=0:d={:.3}", self.fades.music_fade_in_secs));
        }
        let (start, duration) = self.music_fade_out_window();
        if duration > 0.0 {
            filters.push(format!("afade=t=out:st={:.3}:d={:.3}", start, duration));
        }
        filters
    }

    fn effect_filters(&self, track: &AudioTrack) -> Vec<String> {
        let mut filters = Vec::new();
        let known = track.duration_secs.filter(|d| *d > 0.0);

        let fade_in = match known {
            Some(d) => self.fades.effect_fade_in_secs.min(d),
            None => self.fades.effect_fade_in_secs,
        };
        if fade_in > 0.0 {
            filters.push(format!("afade=t=in:st=0:d={:.3}", fade_in));
        }

        // Fading out needs the content end; skip it when the probe failed.
        if let Some(d) = known {
            let fade_out = self.fades.effect_fade_out_secs.min(d);
            if fade_out > 0.0 {
                filters.push(format!("afade=t=out:st={:.3}:d={:.3}", d - fade_out, fade_out));
            }
        }

        let delay_ms = (track.start_offset_secs.max(0.0) * 1000.0).round() as u64;
        if delay_ms > 0 {
            filters.push(format!("adelay={delay_ms}|{delay_ms}"));
        }
        filters
    }

    /// Full ffmpeg call writing the mix to `output` as PCM WAV.
    pub fn invocation(&self, ffmpeg: &str, output: &Path, timeout: Duration) -> Invocation {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-nostats", "-loglevel", "error"]
            .into_iter()
            .map(String::from)
            .collect();
        for track in self.inputs() {
            args.push("-i".to_string());
            args.push(track.path.to_string_lossy().into_owned());
        }
        args.extend([
            "-filter_complex".to_string(),
            self.filter_graph(),
            "-map".to_string(),
            "[mix]".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            output.to_string_lossy().into_owned(),
        ]);
        Invocation::new(ffmpeg, args).with_timeout(timeout)
    }

    fn key(&self) -> Vec<String> {
        self.overlays().iter().map(|t| t.label.clone()).collect()
    }
}

#[derive(Error, Debug)]
pub enum MixError {
    /// Timed out or cancelled; the exclusion search stops.
    #[error("mix interrupted: {0}")]
    Interrupted(#[source] ProcessError),
}

impl MixError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, MixError::Interrupted(e) if e.is_timeout())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MixError::Interrupted(e) if e.is_cancelled())
    }
}

/// An overlay removed by the exclusion search.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedTrack {
    pub track: AudioTrack,
    /// Last mix error seen while the track was included.
    pub reason: String,
}

/// Successful mix.
#[derive(Debug, Clone, PartialEq)]
pub struct MixOutcome {
    /// The `Mixed` track; the normalized voice file when nothing was mixed.
    pub track: AudioTrack,
    pub excluded: Vec<ExcludedTrack>,
    /// ffmpeg runs performed.
    pub attempts: usize,
}

pub struct Mixer<'a> {
    runner: &'a dyn MediaRunner,
    ffmpeg: &'a str,
    timeout: Duration,
}

impl<'a> Mixer<'a> {
    pub fn new(runner: &'a dyn MediaRunner, ffmpeg: &'a str, timeout: Duration) -> Self {
        Self {
            runner,
            ffmpeg,
            timeout,
        }
    }

    /// Mix `plan` into `output`, excluding overlays until ffmpeg succeeds.
    ///
    /// Search order: the full set; then each single exclusion in
    /// `exclusion_order`. If none works, every overlay is tried alone with
    /// the voice and the ones that fail even then are dropped for good
    /// before the search repeats. When each overlay mixes alone but no
    /// subset found so far does, the first of `exclusion_order` goes.
    /// Voice alone always succeeds since it needs no mixing.
    pub fn mix(
        &self,
        plan: MixPlan,
        output: &Path,
        cancel: &CancelHandle,
        logger: &JobLogger,
    ) -> Result<MixOutcome, MixError> {
        let mut search = Search {
            mixer: self,
            output,
            cancel,
            logger,
            failed: HashSet::new(),
            attempts: 0,
            last_error: String::new(),
        };
        let mut current = plan;
        let mut excluded: Vec<ExcludedTrack> = Vec::new();

        loop {
            if current.is_voice_only() || search.attempt(&current)? {
                return Ok(finish(current, output, excluded, search.attempts, logger));
            }

            let order = current.exclusion_order();
            for label in &order {
                let reduced = current.without(label);
                if reduced.is_voice_only() || search.attempt(&reduced)? {
                    logger.degraded(label, &format!("excluded from mix ({})", search.last_error));
                    excluded.extend(exclude(&current, label, &search.last_error));
                    return Ok(finish(reduced, output, excluded, search.attempts, logger));
                }
            }

            // More than one overlay is at fault. Find the ones that fail
            // even alone with the voice.
            let mut offenders: Vec<(String, String)> = Vec::new();
            for label in &order {
                if !search.attempt(&current.only(label))? {
                    offenders.push((label.clone(), search.last_error.clone()));
                }
            }
            if offenders.is_empty() {
                let Some(victim) = order.first() else {
                    return Ok(finish(current, output, excluded, search.attempts, logger));
                };
                offenders.push((victim.clone(), search.last_error.clone()));
            }

            for (label, reason) in &offenders {
                logger.degraded(label, &format!("dropped after failed mixes ({})", reason));
                excluded.extend(exclude(&current, label, reason));
                current = current.without(label);
            }
        }
    }
}

fn finish(
    plan: MixPlan,
    output: &Path,
    excluded: Vec<ExcludedTrack>,
    attempts: usize,
    logger: &JobLogger,
) -> MixOutcome {
    let duration = Some(plan.voice_duration_secs);
    let track = if plan.is_voice_only() {
        logger.info("No overlays to mix; the normalized voice is the mix");
        let voice_path = plan.voice.path.clone();
        plan.voice.into_mixed(voice_path)
    } else {
        plan.voice.into_mixed(output)
    };
    MixOutcome {
        track: track.with_duration(duration),
        excluded,
        attempts,
    }
}

fn exclude(plan: &MixPlan, label: &str, reason: &str) -> Option<ExcludedTrack> {
    plan.overlays()
        .into_iter()
        .find(|t| t.label == label)
        .map(|t| ExcludedTrack {
            track: t.clone(),
            reason: reason.to_string(),
        })
}

/// State of one exclusion search.
struct Search<'m, 'a> {
    mixer: &'m Mixer<'a>,
    output: &'m Path,
    cancel: &'m CancelHandle,
    logger: &'m JobLogger,
    /// Overlay sets already known to fail.
    failed: HashSet<Vec<String>>,
    attempts: usize,
    last_error: String,
}

impl Search<'_, '_> {
    /// Run one mix. `Ok(false)` means ffmpeg failed in a recoverable way.
    fn attempt(&mut self, plan: &MixPlan) -> Result<bool, MixError> {
        let key = plan.key();
        if self.failed.contains(&key) {
            return Ok(false);
        }

        self.attempts += 1;
        self.logger.info(&format!(
            "Mix attempt {} with {} input(s): voice{}",
            self.attempts,
            key.len() + 1,
            key.iter().map(|l| format!(", {}", l)).collect::<String>()
        ));

        let invocation = plan.invocation(self.mixer.ffmpeg, self.output, self.mixer.timeout);
        match self.mixer.runner.run(&invocation, self.cancel, self.logger) {
            Ok(_) => Ok(true),
            Err(e) if e.is_fatal() => Err(MixError::Interrupted(e)),
            Err(e) => {
                self.logger.warn(&format!("Mix attempt {} failed: {}", self.attempts, e));
                self.last_error = e.to_string();
                self.failed.insert(key);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogConfig;
    use crate::process::ProcessOutput;
    use parking_lot::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Fails any mix whose inputs include a path containing "bad".
    #[derive(Default)]
    struct PickyRunner {
        timeout: bool,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl MediaRunner for PickyRunner {
        fn run(
            &self,
            invocation: &Invocation,
            _cancel: &CancelHandle,
            _logger: &JobLogger,
        ) -> Result<ProcessOutput, ProcessError> {
            let inputs: Vec<String> = invocation
                .args
                .iter()
                .zip(invocation.args.iter().skip(1))
                .filter(|(flag, _)| *flag == "-i")
                .map(|(_, path)| path.clone())
                .collect();
            let bad = inputs.iter().any(|p| p.contains("bad"));
            self.calls.lock().push(inputs);

            if self.timeout {
                return Err(ProcessError::TimedOut {
                    program: "ffmpeg".into(),
                    after: Duration::from_secs(300),
                });
            }
            if bad {
                Err(ProcessError::failed("ffmpeg", Some(1), "Error initializing filter"))
            } else {
                Ok(ProcessOutput::default())
            }
        }
    }

    fn voice() -> AudioTrack {
        AudioTrack::voice("/w/voice.wav", -16.0, 1.0)
    }

    fn music(path: &str) -> AudioTrack {
        AudioTrack::music(path, -28.0, 0.5).with_duration(Some(12.0))
    }

    fn effect(i: usize, path: &str, at: f64) -> AudioTrack {
        AudioTrack::effect(i, path, at, -22.0, 0.8).with_duration(Some(2.0))
    }

    fn plan(overlays: Vec<AudioTrack>, voice_secs: f64) -> MixPlan {
        MixPlan::new(voice(), overlays, voice_secs, &MixSettings::default(), 48000)
    }

    fn run_mix(runner: &PickyRunner, plan: MixPlan) -> (Result<MixOutcome, MixError>, TempDir) {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("mix", dir.path(), LogConfig::default(), None).unwrap();
        let mixer = Mixer::new(runner, "ffmpeg", Duration::from_secs(300));
        let result = mixer.mix(plan, Path::new("/w/mix.wav"), &CancelHandle::new(), &logger);
        (result, dir)
    }

    #[test]
    fn graph_places_music_and_effect() {
        let plan = plan(
            vec![music("/w/music.wav"), effect(0, "/w/effect_00.wav", 5.0)],
            10.0,
        );
        let fmt = "aformat=sample_rates=48000:channel_layouts=stereo";
        let expected = format!(
            "[0:a]{fmt}[a0];\
             [1:a]{fmt},afade=t=in:st=0:d=1.000,afade=t=out:st=7.000:d=3.000[a1];\
             [2:a]{fmt},afade=t=in:st=0:d=0.500,afade=t=out:st=1.300:d=0.700,adelay=5000|5000[a2];\
             [a0][a1][a2]amix=inputs=3:duration=longest:dropout_transition=0:normalize=0[mix]"
        );
        assert_eq!(plan.filter_graph(), expected);
        assert_eq!(plan.music_fade_out_window(), (7.0, 3.0));
    }

    #[test]
    fn music_fade_never_starts_before_zero() {
        let plan = plan(vec![music("/w/music.wav")], 2.0);
        assert_eq!(plan.music_fade_out_window(), (0.0, 2.0));
        assert!(plan.filter_graph().contains("afade=t=out:st=0.000:d=2.000"));
    }

    #[test]
    fn effect_without_duration_skips_fade_out() {
        let track = AudioTrack::effect(0, "/w/effect_00.wav", 1.25, -22.0, 0.8);
        let graph = plan(vec![track], 10.0).filter_graph();
        assert!(graph.contains("afade=t=in:st=0:d=0.500,adelay=1250|1250"));
        assert!(!graph.contains("afade=t=out"));
    }

    #[test]
    fn effect_at_zero_is_not_delayed() {
        let graph = plan(vec![effect(0, "/w/e.wav", 0.0)], 10.0).filter_graph();
        assert!(!graph.contains("adelay"));
    }

    #[test]
    fn invocation_maps_mix_output() {
        let inv = plan(vec![music("/w/music.wav")], 10.0).invocation(
            "ffmpeg",
            Path::new("/w/mix.wav"),
            Duration::from_secs(300),
        );
        assert_eq!(inv.arg_after("-map"), Some("[mix]"));
        assert_eq!(inv.output_arg(), Some("/w/mix.wav"));
        assert_eq!(inv.args.iter().filter(|a| *a == "-i").count(), 2);
    }

    #[test]
    fn exclusion_order_is_latest_effect_first_music_last() {
        let plan = plan(
            vec![
                effect(0, "/w/e0.wav", 1.0),
                music("/w/music.wav"),
                effect(1, "/w/e1.wav", 2.0),
                effect(2, "/w/e2.wav", 3.0),
            ],
            10.0,
        );
        assert_eq!(
            plan.exclusion_order(),
            vec!["effect #3", "effect #2", "effect #1", "music"]
        );
        assert_eq!(plan.without("effect #2").overlays().len(), 3);
        assert!(plan.without("music").overlays().iter().all(|t| t.kind == TrackKind::Effect));
    }

    #[test]
    fn voice_only_needs_no_mix() {
        let runner = PickyRunner::default();
        let (result, _dir) = run_mix(&runner, plan(Vec::new(), 8.0));
        let outcome = result.unwrap();

        assert_eq!(outcome.track.kind, TrackKind::Mixed);
        assert_eq!(outcome.track.path, Path::new("/w/voice.wav"));
        assert_eq!(outcome.track.duration_secs, Some(8.0));
        assert_eq!(outcome.attempts, 0);
        assert!(runner.calls.lock().is_empty());
    }

    #[test]
    fn full_set_mixes_first_try() {
        let runner = PickyRunner::default();
        let (result, _dir) = run_mix(
            &runner,
            plan(vec![music("/w/music.wav"), effect(0, "/w/e0.wav", 5.0)], 10.0),
        );
        let outcome = result.unwrap();
        assert_eq!(outcome.track.path, Path::new("/w/mix.wav"));
        assert!(outcome.excluded.is_empty());
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn single_bad_effect_is_excluded() {
        let runner = PickyRunner::default();
        let (result, _dir) = run_mix(
            &runner,
            plan(
                vec![
                    music("/w/music.wav"),
                    effect(0, "/w/e0.wav", 1.0),
                    effect(1, "/w/bad_e1.wav", 2.0),
                    effect(2, "/w/e2.wav", 3.0),
                ],
                10.0,
            ),
        );
        let outcome = result.unwrap();

        let labels: Vec<&str> = outcome.excluded.iter().map(|e| e.track.label.as_str()).collect();
        assert_eq!(labels, vec!["effect #2"]);
        assert!(outcome.excluded[0].reason.contains("Error initializing filter"));
        // full set, without effect #3, without effect #2
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.track.path, Path::new("/w/mix.wav"));
    }

    #[test]
    fn only_overlay_failing_falls_back_to_voice() {
        let runner = PickyRunner::default();
        let (result, _dir) = run_mix(&runner, plan(vec![music("/w/bad_music.wav")], 10.0));
        let outcome = result.unwrap();

        assert_eq!(outcome.track.path, Path::new("/w/voice.wav"));
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn healthy_track_survives_two_bad_ones() {
        let runner = PickyRunner::default();
        let (result, _dir) = run_mix(
            &runner,
            plan(
                vec![
                    music("/w/bad_music.wav"),
                    effect(0, "/w/bad_e0.wav", 1.0),
                    effect(1, "/w/e1.wav", 2.0),
                ],
                10.0,
            ),
        );
        let outcome = result.unwrap();

        let labels: Vec<&str> = outcome.excluded.iter().map(|e| e.track.label.as_str()).collect();
        assert_eq!(labels, vec!["effect #1", "music"]);
        assert!(outcome.excluded.iter().all(|e| e.reason.contains("Error initializing filter")));
        assert_eq!(outcome.track.path, Path::new("/w/mix.wav"));

        // full set, three single exclusions, three overlays alone, final mix
        let calls = runner.calls.lock();
        assert_eq!(outcome.attempts, 8);
        assert_eq!(calls.len(), outcome.attempts);
        assert_eq!(
            calls.last().unwrap(),
            &vec!["/w/voice.wav".to_string(), "/w/e1.wav".to_string()]
        );
        let failing: Vec<_> = calls.iter().filter(|c| c.iter().any(|p| p.contains("bad"))).collect();
        for (i, a) in failing.iter().enumerate() {
            assert!(failing.iter().skip(i + 1).all(|b| a != b));
        }
    }

    #[test]
    fn tracks_that_only_fail_together_lose_the_latest() {
        // Every overlay mixes alone; only the pair is rejected.
        struct PairRunner;
        impl MediaRunner for PairRunner {
            fn run(
                &self,
                invocation: &Invocation,
                _cancel: &CancelHandle,
                _logger: &JobLogger,
            ) -> Result<ProcessOutput, ProcessError> {
                if invocation.args.iter().filter(|a| *a == "-i").count() > 2 {
                    Err(ProcessError::failed("ffmpeg", Some(1), "Cannot allocate memory"))
                } else {
                    Ok(ProcessOutput::default())
                }
            }
        }

        let dir = tempdir().unwrap();
        let logger = JobLogger::new("mix", dir.path(), LogConfig::default(), None).unwrap();
        let mixer = Mixer::new(&PairRunner, "ffmpeg", Duration::from_secs(300));
        let outcome = mixer
            .mix(
                plan(
                    vec![
                        music("/w/music.wav"),
                        effect(0, "/w/e0.wav", 1.0),
                        effect(1, "/w/e1.wav", 2.0),
                    ],
                    10.0,
                ),
                Path::new("/w/mix.wav"),
                &CancelHandle::new(),
                &logger,
            )
            .unwrap();

        let labels: Vec<&str> = outcome.excluded.iter().map(|e| e.track.label.as_str()).collect();
        assert_eq!(labels, vec!["effect #2", "effect #1"]);
        assert_eq!(outcome.track.path, Path::new("/w/mix.wav"));
    }

    #[test]
    fn plans_compare_by_their_tracks() {
        let full = plan(vec![music("/w/music.wav"), effect(0, "/w/e0.wav", 1.0)], 10.0);

        assert_eq!(full.clone(), full);
        assert_eq!(full.without("effect #9"), full);
        assert_ne!(full.without("music"), full);
        assert_eq!(full.only("music"), full.without("effect #1"));
    }

    #[test]
    fn timeout_stops_the_search() {
        let runner = PickyRunner {
            timeout: true,
            ..PickyRunner::default()
        };
        let (result, _dir) = run_mix(
            &runner,
            plan(vec![music("/w/music.wav"), effect(0, "/w/e0.wav", 5.0)], 10.0),
        );
        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(runner.calls.lock().len(), 1);
    }
}
