use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use crate::engine::{EngineSignals, EngineState};
use crate::errors::OutputError;
use crate::ring::{RingConsumer, CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::status::StatusHub;

/// Length of the linear fade cpal applies around a pause/resume transition.
const STATE_FADE_SECS: f64 = 2.0;

fn state_fade_frames() -> u64 {
    (OUTPUT_SAMPLE_RATE as f64 * STATE_FADE_SECS) as u64
}

/// Tracks how far into a pause or resume ramp the callback currently is.
/// A plain atomic counter: only the output callback ever writes it, the
/// status endpoint only reads it.
#[derive(Default)]
pub struct FadeProgress(AtomicU64);

impl FadeProgress {
    fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    fn advance(&self, frames: u64) -> u64 {
        self.0.fetch_add(frames, Ordering::Relaxed) + frames
    }
}

/// Opens the default output device at a fixed stereo/48kHz/f32 contract and
/// starts the stream. The callback never blocks or allocates: it copies
/// whatever is available from `consumer`, fills any shortfall with silence,
/// and applies the pause/resume state-fade ramp in place.
pub fn start_output_stream(
    mut consumer: RingConsumer,
    signals: Arc<EngineSignals>,
    status: Arc<StatusHub>,
) -> Result<cpal::Stream, OutputError> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or(OutputError::NoDevice)?;

    let config = StreamConfig {
        channels: CHANNELS as u16,
        sample_rate: cpal::SampleRate(OUTPUT_SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| OutputError::NoSupportedConfig(e.to_string()))?
        .any(|c| {
            c.channels() == CHANNELS as u16
                && c.min_sample_rate().0 <= OUTPUT_SAMPLE_RATE
                && c.max_sample_rate().0 >= OUTPUT_SAMPLE_RATE
                && c.sample_format() == SampleFormat::F32
        });
    if !supported {
        return Err(OutputError::NoSupportedConfig(
            "no stereo/48kHz/f32 output configuration".to_string(),
        ));
    }

    let fade_progress = FadeProgress::default();
    let (err_tx, err_rx) = mpsc::channel();
    std::thread::spawn(move || {
        for err in err_rx {
            log::error!("cpal output stream error: {err}");
        }
    });

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            fill_callback(data, &mut consumer, &signals, &fade_progress, &status);
        },
        move |err| {
            let _ = err_tx.send(err);
        },
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

fn fill_callback(
    data: &mut [f32],
    consumer: &mut RingConsumer,
    signals: &EngineSignals,
    fade_progress: &FadeProgress,
    status: &StatusHub,
) {
    let state = signals.state.load();
    if matches!(state, EngineState::Stopped | EngineState::Stopping | EngineState::Paused) {
        data.fill(0.0);
        return;
    }

    let bytes_needed = data.len() * std::mem::size_of::<f32>();
    let mut raw = vec![0u8; bytes_needed];
    let read = consumer.read(&mut raw);
    signals.space_available.post();

    let frames_read = read / std::mem::size_of::<f32>();
    for (i, chunk) in raw[..read].chunks_exact(4).enumerate() {
        data[i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    if frames_read < data.len() {
        if state == EngineState::Playing {
            log::warn!("ring underrun: needed {} samples, had {frames_read}", data.len());
        }
        data[frames_read..].fill(0.0);
    }
    status.advance_elapsed((frames_read / CHANNELS) as u64);

    match state {
        EngineState::Pausing => {
            let ramp_frames = state_fade_frames() * CHANNELS as u64;
            let progressed = fade_progress.advance(data.len() as u64);
            apply_ramp(data, progressed.saturating_sub(data.len() as u64), ramp_frames, true);
            if progressed >= ramp_frames {
                signals.state.store(EngineState::Paused);
                fade_progress.reset();
            }
        }
        EngineState::Resuming => {
            let ramp_frames = state_fade_frames() * CHANNELS as u64;
            let progressed = fade_progress.advance(data.len() as u64);
            apply_ramp(data, progressed.saturating_sub(data.len() as u64), ramp_frames, false);
            if progressed >= ramp_frames {
                signals.state.store(EngineState::Playing);
                fade_progress.reset();
            }
        }
        _ => {}
    }
}

/// Scales `data` along a linear ramp from 1.0 to 0.0 (`fading_out`) or 0.0 to
/// 1.0, where `start` is how many samples into the whole-ramp window this
/// buffer begins.
fn apply_ramp(data: &mut [f32], start: u64, ramp_len: u64, fading_out: bool) {
    if ramp_len == 0 {
        return;
    }
    for (i, sample) in data.iter_mut().enumerate() {
        let position = (start + i as u64).min(ramp_len);
        let t = position as f64 / ramp_len as f64;
        let gain = if fading_out { 1.0 - t } else { t };
        *sample = (*sample as f64 * gain) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_reaches_zero_at_end_when_fading_out() {
        let mut data = vec![1.0f32; 4];
        apply_ramp(&mut data, 96, 100, true);
        assert!(data[3].abs() < 0.05);
    }

    #[test]
    fn ramp_starts_at_zero_when_fading_in() {
        let mut data = vec![1.0f32; 4];
        apply_ramp(&mut data, 0, 100, false);
        assert!(data[0].abs() < 0.02);
    }

    #[test]
    fn zero_length_ramp_is_a_no_op() {
        let mut data = vec![0.5f32; 4];
        apply_ramp(&mut data, 0, 0, true);
        assert_eq!(data, vec![0.5f32; 4]);
    }
}
