//! Checking an encoded file against what was asked for.

use crate::probe::MediaProbe;

/// Verified properties of an encoded file.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedMedia {
    pub width_px: u32,
    pub height_px: u32,
    pub duration_secs: f64,
    /// Set when the duration differs from the narration by more than the
    /// tolerance. Reported, not fatal.
    pub drift_secs: Option<f64>,
}

/// Check the probe of an encode.
///
/// A video stream with exactly `width`x`height` and an audio stream are
/// required. Duration drift against `narration_secs` is only reported.
pub fn verify_media(
    probe: &MediaProbe,
    width: u32,
    height: u32,
    narration_secs: f64,
    tolerance_secs: f64,
) -> Result<VerifiedMedia, String> {
    let video = probe
        .video_stream()
        .ok_or_else(|| "output has no video stream".to_string())?;

    match (video.width, video.height) {
        (Some(w), Some(h)) if w == width && h == height => {}
        (w, h) => {
            return Err(format!(
                "video is {}x{}, expected {}x{}",
                dim(w),
                dim(h),
                width,
                height
            ))
        }
    }

    if !probe.has_audio() {
        return Err("output has no audio stream".to_string());
    }

    let duration_secs = probe
        .duration_secs
        .ok_or_else(|| "output duration is unknown".to_string())?;

    let drift = duration_secs - narration_secs;
    let drift_secs = (drift.abs() > tolerance_secs).then_some(drift);

    Ok(VerifiedMedia {
        width_px: width,
        height_px: height,
        duration_secs,
        drift_secs,
    })
}

fn dim(value: Option<u32>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeStream;

    fn probe(width: u32, height: u32, audio: bool, duration: f64) -> MediaProbe {
        let mut streams = vec![ProbeStream {
            index: 0,
            codec_type: "video".into(),
            codec_name: "h264".into(),
            width: Some(width),
            height: Some(height),
            duration_secs: Some(duration),
        }];
        if audio {
            streams.push(ProbeStream {
                index: 1,
                codec_type: "audio".into(),
                codec_name: "aac".into(),
                ..ProbeStream::default()
            });
        }
        MediaProbe {
            streams,
            duration_secs: Some(duration),
        }
    }

    #[test]
    fn matching_output_passes() {
        let verified = verify_media(&probe(1920, 1080, true, 10.02), 1920, 1080, 10.0, 1.0).unwrap();
        assert_eq!(verified.width_px, 1920);
        assert_eq!(verified.drift_secs, None);
    }

    #[test]
    fn drift_is_reported_not_fatal() {
        let verified = verify_media(&probe(1920, 1080, true, 12.5), 1920, 1080, 10.0, 1.0).unwrap();
        assert_eq!(verified.drift_secs, Some(2.5));
    }

    #[test]
    fn wrong_size_fails() {
        let err = verify_media(&probe(1280, 720, true, 10.0), 1920, 1080, 10.0, 1.0).unwrap_err();
        assert_eq!(err, "video is 1280x720, expected 1920x1080");
    }

    #[test]
    fn missing_audio_fails() {
        let err = verify_media(&probe(1920, 1080, false, 10.0), 1920, 1080, 10.0, 1.0).unwrap_err();
        assert!(err.contains("no audio"));
    }

    #[test]
    fn missing_video_fails() {
        let err = verify_media(&MediaProbe::default(), 1920, 1080, 10.0, 1.0).unwrap_err();
        assert!(err.contains("no video"));
    }
}
