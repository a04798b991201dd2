use std::collections::VecDeque;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::Signal;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::formats::FormatReader;

use crate::errors::MediaLoadError;
use crate::media::{self, AudioFile};
use crate::ring::{CHANNELS, OUTPUT_SAMPLE_RATE, PERIOD_FRAMES};

/// Derived fade-in/out slopes for one track, and the per-sample gain
/// arithmetic from the decode worker's period-extraction algorithm. Split out
/// from `AudioFileContext` so the arithmetic is testable without a real
/// decoder or demuxer.
#[derive(Clone, Copy, Debug)]
struct FadeState {
    total_samples: u64,
    fadein_secs: f64,
    fadeout_secs: f64,
    fadein_slope: f64,
    fadeout_slope: f64,
}

impl FadeState {
    fn new(info: &AudioFile) -> Self {
        let total_samples = info.duration_seconds * OUTPUT_SAMPLE_RATE as u64;
        let fade = info.fade.unwrap_or_default();
        let duration_secs = info.duration_seconds as f64;
        let fadein_secs = if fade.fadein_secs > 0.0 && fade.fadein_secs < duration_secs {
            fade.fadein_secs
        } else {
            0.0
        };
        let fadeout_secs = if fade.fadeout_secs > 0.0 && fade.fadeout_secs < duration_secs {
            fade.fadeout_secs
        } else {
            0.0
        };
        let fadein_slope = if fadein_secs > 0.0 {
            1.0 / (OUTPUT_SAMPLE_RATE as f64 * fadein_secs)
        } else {
            0.0
        };
        let fadeout_slope = if fadeout_secs > 0.0 {
            1.0 / (OUTPUT_SAMPLE_RATE as f64 * fadeout_secs)
        } else {
            0.0
        };
        Self {
            total_samples,
            fadein_secs,
            fadeout_secs,
            fadein_slope,
            fadeout_slope,
        }
    }

    /// `fadein_slope * samples_played` while inside the fade-in window;
    /// `fadeout_slope * remaining` while inside the fade-out window; `1.0`
    /// otherwise.
    fn gain_at(&self, samples_played: u64) -> f64 {
        let fadein_budget = (OUTPUT_SAMPLE_RATE as f64 * self.fadein_secs) as u64;
        if self.fadein_slope > 0.0 && samples_played < fadein_budget {
            return self.fadein_slope * samples_played as f64;
        }
        let fadeout_budget = (OUTPUT_SAMPLE_RATE as f64 * self.fadeout_secs) as u64;
        if self.fadeout_slope > 0.0 && fadeout_budget > 0 {
            let remaining = self.total_samples.saturating_sub(samples_played);
            if remaining < fadeout_budget {
                return (self.fadeout_slope * remaining as f64).clamp(0.0, 1.0);
            }
        }
        1.0
    }
}

/// One open decode pipeline for a single track: demuxer + decoder +
/// resampler, plus the counters and derived fade/gain constants the decode
/// worker needs to fill one period at a time.
pub struct AudioFileContext {
    pub info: AudioFile,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    resampler: FftFixedIn<f64>,
    input_rate: usize,
    /// Decoded samples awaiting resampling, staged here rather than fed to
    /// the resampler as they arrive: `FftFixedIn` requires exactly
    /// `input_frames_next()` frames per call, but decoded packets rarely
    /// divide evenly into that size, so leftovers carry over between calls.
    pending: [VecDeque<f64>; 2],
    /// Resampled stereo frames awaiting copy into the caller's output slice.
    resampled: VecDeque<[f64; 2]>,
    demux_eof: bool,
    flushed: bool,

    pub total_samples: u64,
    pub samples_played: u64,
    replay_gain_linear: f64,
    fade: FadeState,
}

impl AudioFileContext {
    pub fn open(info: AudioFile) -> Result<Self, MediaLoadError> {
        let (reader, track_id, input_rate, _time_base, _frames) = media::open_track(&info.path)?;
        let decoder = build_decoder(reader.as_ref(), track_id, &info.path)?;
        let resampler = FftFixedIn::<f64>::new(
            input_rate as usize,
            OUTPUT_SAMPLE_RATE as usize,
            PERIOD_FRAMES,
            1,
            CHANNELS,
        )
        .map_err(|source| MediaLoadError::Resampler {
            path: info.path.display().to_string(),
            source: source.to_string(),
        })?;

        let fade = FadeState::new(&info);
        let total_samples = fade.total_samples;
        let replay_gain_linear = info.replay_gain_linear();

        Ok(Self {
            info,
            reader,
            decoder,
            track_id,
            resampler,
            input_rate: input_rate as usize,
            pending: [VecDeque::new(), VecDeque::new()],
            resampled: VecDeque::new(),
            demux_eof: false,
            flushed: false,
            total_samples,
            samples_played: 0,
            replay_gain_linear,
            fade,
        })
    }

    pub fn eof_reached(&self) -> bool {
        self.demux_eof && self.flushed && self.resampled.is_empty()
    }

    fn fader_gain(&self) -> f64 {
        self.fade.gain_at(self.samples_played)
    }

    /// Fills `out` (interleaved stereo f32, `frames_needed` frames) from this
    /// context, returning the number of frames actually produced. Returns
    /// fewer than `frames_needed` only at end of stream.
    pub fn extract_frames(&mut self, out: &mut [f32], frames_needed: usize) -> usize {
        let mut produced = 0;
        while produced < frames_needed {
            if self.resampled.is_empty() {
                if !self.fill_resampled() {
                    break;
                }
            }
            let Some([l, r]) = self.resampled.pop_front() else {
                break;
            };
            let gain = self.fader_gain() * self.replay_gain_linear;
            let base = produced * CHANNELS;
            out[base] = (l * gain) as f32;
            out[base + 1] = (r * gain) as f32;
            produced += 1;
            self.samples_played += 1;
        }
        produced
    }

    /// Decodes (and, at EOF, flushes) one more round of input into
    /// `self.resampled`. Returns false once there is truly nothing left.
    fn fill_resampled(&mut self) -> bool {
        if self.demux_eof && self.flushed {
            return false;
        }
        loop {
            let needed = self.resampler.input_frames_next();

            while self.pending[0].len() < needed && !self.demux_eof {
                match self.reader.next_packet() {
                    Ok(packet) => {
                        if packet.track_id() != self.track_id {
                            continue;
                        }
                        match self.decoder.decode(&packet) {
                            Ok(buf_ref) => {
                                let mut buf = buf_ref.make_equivalent::<f64>();
                                buf_ref.convert(&mut buf);
                                let right_channel = if buf.spec().channels.count() > 1 { 1 } else { 0 };
                                self.pending[0].extend(buf.chan(0).iter().copied());
                                self.pending[1].extend(buf.chan(right_channel).iter().copied());
                            }
                            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                            Err(_) => {
                                self.demux_eof = true;
                                break;
                            }
                        }
                    }
                    Err(_) => {
                        self.demux_eof = true;
                        break;
                    }
                }
            }

            if self.pending[0].len() < needed {
                if self.demux_eof {
                    if self.flushed {
                        return false;
                    }
                    self.flushed = true;
                    if self.pending[0].is_empty() {
                        return false;
                    }
                    let pad = needed - self.pending[0].len();
                    self.pending[0].extend(std::iter::repeat(0.0).take(pad));
                    self.pending[1].extend(std::iter::repeat(0.0).take(pad));
                } else {
                    return false;
                }
            }

            // Exactly `needed` frames, as `FftFixedIn` requires; any surplus
            // stays in `pending` for the next call.
            let input: [Vec<f64>; 2] = [
                self.pending[0].drain(..needed).collect(),
                self.pending[1].drain(..needed).collect(),
            ];
            let produced = match self.resampler.process(&input, None) {
                Ok(out) => {
                    let n = out[0].len();
                    for i in 0..n {
                        self.resampled.push_back([out[0][i], out[1][i]]);
                    }
                    n
                }
                Err(_) => 0,
            };
            if produced > 0 {
                return true;
            }
            if self.demux_eof && self.pending[0].is_empty() {
                return false;
            }
        }
    }
}

fn build_decoder(
    reader: &dyn FormatReader,
    track_id: u32,
    path: &std::path::Path,
) -> Result<Box<dyn Decoder>, MediaLoadError> {
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .ok_or_else(|| MediaLoadError::NoTrack {
            path: path.display().to_string(),
        })?;
    symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|source| MediaLoadError::NoDecoder {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FadeInfo;
    use std::borrow::Cow;
    use std::path::PathBuf;

    fn info_with_fade(fadein: f64, fadeout: f64, duration_secs: u64) -> AudioFile {
        AudioFile {
            path: PathBuf::new(),
            artist: None,
            album: None,
            title: None,
            album_id: None,
            release_track_id: None,
            album_gain_db: 0.0,
            album_peak: 0.0,
            track_gain_db: 0.0,
            track_peak: 0.0,
            duration_seconds: duration_secs,
            zone_name: Cow::Borrowed("test"),
            fade: Some(FadeInfo {
                fadein_secs: fadein,
                fadeout_secs: fadeout,
                min_level: 0.0,
                max_level: 1.0,
            }),
        }
    }

    #[test]
    fn zero_fadein_gives_full_gain_at_sample_zero() {
        let fade = FadeState::new(&info_with_fade(0.0, 0.0, 180));
        assert_eq!(fade.gain_at(0), 1.0);
    }

    #[test]
    fn fadein_ramps_from_zero() {
        let fade = FadeState::new(&info_with_fade(2.0, 0.0, 180));
        assert_eq!(fade.gain_at(0), 0.0);
        // Halfway through a 2s fade-in.
        assert!((fade.gain_at(OUTPUT_SAMPLE_RATE as u64) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn fadein_longer_than_duration_is_ignored() {
        let fade = FadeState::new(&info_with_fade(500.0, 0.0, 180));
        assert_eq!(fade.fadein_slope, 0.0);
        assert_eq!(fade.gain_at(0), 1.0);
    }

    #[test]
    fn fadeout_ramps_to_zero_at_end() {
        let fade = FadeState::new(&info_with_fade(0.0, 2.0, 180));
        let total = fade.total_samples;
        assert_eq!(fade.gain_at(total), 0.0);
        let halfway_into_fadeout = total - OUTPUT_SAMPLE_RATE as u64;
        assert!((fade.gain_at(halfway_into_fadeout) - 0.5).abs() < 1e-9);
        assert_eq!(fade.gain_at(0), 1.0);
    }
}
