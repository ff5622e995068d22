//! Timestamped images to display durations.

use crate::models::{ScheduleEntry, TimedVisual, MIN_DISPLAY_SECS};

use super::ScheduleError;

/// Build the display schedule.
///
/// `pairs` may arrive in any order. `total_secs` is the narration length; it
/// only decides the terminal entry's estimate, the final mux trims the
/// real output to the audio.
///
/// Equal timestamps are ordered by image bytes so the result does not
/// depend on input order.
pub fn build_schedule(
    pairs: Vec<(f64, Vec<u8>)>,
    total_secs: f64,
) -> Result<Vec<ScheduleEntry>, ScheduleError> {
    if pairs.is_empty() {
        return Err(ScheduleError::NoVisuals);
    }
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return Err(ScheduleError::InvalidDuration(total_secs));
    }
    if let Some((index, (value, _))) = pairs
        .iter()
        .enumerate()
        .find(|(_, (t, _))| !t.is_finite() || *t < 0.0)
    {
        return Err(ScheduleError::InvalidTimestamp {
            index,
            value: *value,
        });
    }

    let mut pairs = pairs;
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let times: Vec<f64> = pairs.iter().map(|(t, _)| *t).collect();
    let last = pairs.len() - 1;

    let entries = pairs
        .into_iter()
        .enumerate()
        .map(|(i, (timestamp_secs, image_bytes))| {
            let is_terminal = i == last;
            let span = if is_terminal {
                total_secs - timestamp_secs
            } else {
                times[i + 1] - timestamp_secs
            };
            ScheduleEntry {
                visual: TimedVisual {
                    sequence_index: i,
                    timestamp_secs,
                    image_bytes,
                },
                display_secs: span.max(MIN_DISPLAY_SECS),
                is_terminal,
            }
        })
        .collect();

    Ok(entries)
}

/// Evenly spaced timestamps for images without timing: `i * total / n`.
pub fn synthesize_timestamps(
    images: Vec<Vec<u8>>,
    total_secs: f64,
) -> Result<Vec<(f64, Vec<u8>)>, ScheduleError> {
    if images.is_empty() {
        return Err(ScheduleError::NoVisuals);
    }
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return Err(ScheduleError::InvalidDuration(total_secs));
    }

    let n = images.len() as f64;
    Ok(images
        .into_iter()
        .enumerate()
        .map(|(i, bytes)| (i as f64 * total_secs / n, bytes))
        .collect())
}

/// Sum of display durations. An estimate only; see `build_schedule`.
pub fn estimated_duration(entries: &[ScheduleEntry]) -> f64 {
    entries.iter().map(|e| e.display_secs).sum()
}
