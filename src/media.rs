use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::Signal;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;

use crate::config::FadeInfo;
use crate::errors::MediaLoadError;

/// Immutable-after-load descriptor for one audio file, including the tag and
/// ReplayGain fields the decode worker needs to compute per-track gain.
#[derive(Clone, Debug)]
pub struct AudioFile {
    pub path: PathBuf,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub album_id: Option<String>,
    pub release_track_id: Option<String>,
    pub album_gain_db: f64,
    pub album_peak: f64,
    pub track_gain_db: f64,
    pub track_peak: f64,
    pub duration_seconds: u64,
    /// Cheap to clone: a zone name is either the one `&'static` string the
    /// scheduler reuses across every track in that zone, or (rarely, in
    /// tests) an owned string.
    pub zone_name: Cow<'static, str>,
    pub fade: Option<FadeInfo>,
}

impl AudioFile {
    /// Linear ReplayGain multiplier, capped so peaks never clip:
    /// `min(10^(track_gain_db/20), 1/track_peak)`, with either component
    /// defaulting to neutral (1.0 gain, no peak cap) when absent (0.0).
    pub fn replay_gain_linear(&self) -> f64 {
        let gain = if self.track_gain_db != 0.0 {
            10f64.powf(self.track_gain_db / 20.0)
        } else {
            1.0
        };
        let cap = if self.track_peak > 0.0 {
            1.0 / self.track_peak
        } else {
            f64::INFINITY
        };
        gain.min(cap)
    }
}

/// Opens `path`, extracts tags (ReplayGain, MusicBrainz IDs, the usual
/// artist/album/title) and computes `duration_seconds`.
///
/// In non-strict mode, the demuxer's reported duration is used when present.
/// In strict mode (or as a non-strict fallback when no duration is reported)
/// every packet is decoded to count frames directly.
pub fn load(
    path: &Path,
    zone_name: Cow<'static, str>,
    fade: Option<FadeInfo>,
    strict: bool,
) -> Result<AudioFile, MediaLoadError> {
    let (mut reader, track_id, sample_rate, time_base, reported_frames) = open_track(path)?;

    let tags = collect_tags(&mut reader);

    let duration_seconds = if strict || reported_frames.is_none() {
        decode_scan_duration(path, &mut reader, track_id, sample_rate)?
    } else {
        let frames = reported_frames.unwrap();
        let tb = time_base.ok_or_else(|| MediaLoadError::NoTrack {
            path: path.display().to_string(),
        })?;
        tb.calc_time(frames).seconds
    };

    Ok(AudioFile {
        path: path.to_path_buf(),
        artist: find_tag(&tags, StandardTagKey::Artist),
        album: find_tag(&tags, StandardTagKey::Album),
        title: find_tag(&tags, StandardTagKey::TrackTitle),
        album_id: find_tag(&tags, StandardTagKey::MusicBrainzAlbumId)
            .or_else(|| find_tag_named(&tags, "MUSICBRAINZ_ALBUMID"))
            .or_else(|| find_tag_named(&tags, "MusicBrainz Album Id")),
        release_track_id: find_tag(&tags, StandardTagKey::MusicBrainzTrackId)
            .or_else(|| find_tag_named(&tags, "MUSICBRAINZ_RELEASETRACKID"))
            .or_else(|| find_tag_named(&tags, "MusicBrainz Release Track Id")),
        album_gain_db: find_gain(&tags, "REPLAYGAIN_ALBUM_GAIN"),
        album_peak: find_peak(&tags, "REPLAYGAIN_ALBUM_PEAK"),
        track_gain_db: find_gain(&tags, "REPLAYGAIN_TRACK_GAIN"),
        track_peak: find_peak(&tags, "REPLAYGAIN_TRACK_PEAK"),
        duration_seconds,
        zone_name,
        fade,
    })
}

pub(crate) type OpenedTrack = (
    Box<dyn FormatReader>,
    u32,
    u32,
    Option<symphonia::core::units::TimeBase>,
    Option<u64>,
);

pub(crate) fn open_track(path: &Path) -> Result<OpenedTrack, MediaLoadError> {
    let file = File::open(path).map_err(|source| MediaLoadError::Open {
        path: path.display().to_string(),
        source: symphonia::core::errors::Error::IoError(source),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions {
                enable_gapless: true,
                ..Default::default()
            },
            &MetadataOptions::default(),
        )
        .map_err(|source| MediaLoadError::Open {
            path: path.display().to_string(),
            source,
        })?;
    let reader = probed.format;
    let track = reader.default_track().ok_or_else(|| MediaLoadError::NoTrack {
        path: path.display().to_string(),
    })?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let time_base = track.codec_params.time_base;
    let reported_frames = track.codec_params.n_frames;
    Ok((reader, track_id, sample_rate, time_base, reported_frames))
}

fn decode_scan_duration(
    path: &Path,
    reader: &mut Box<dyn FormatReader>,
    track_id: u32,
    sample_rate: u32,
) -> Result<u64, MediaLoadError> {
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .ok_or_else(|| MediaLoadError::NoTrack {
            path: path.display().to_string(),
        })?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &Default::default())
        .map_err(|source| MediaLoadError::DecodeScan {
            path: path.display().to_string(),
            source,
        })?;

    let mut total_frames: u64 = 0;
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(source) => {
                return Err(MediaLoadError::DecodeScan {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(buf) => total_frames += buf.frames() as u64,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(source) => {
                return Err(MediaLoadError::DecodeScan {
                    path: path.display().to_string(),
                    source,
                })
            }
        }
    }
    if total_frames == 0 {
        return Err(MediaLoadError::EmptyDecode {
            path: path.display().to_string(),
        });
    }
    Ok(total_frames / sample_rate as u64)
}

fn collect_tags(reader: &mut Box<dyn FormatReader>) -> Vec<Tag> {
    let mut tags = Vec::new();
    if let Some(metadata) = reader.metadata().current() {
        tags.extend(metadata.tags().iter().cloned());
    }
    tags
}

fn find_tag(tags: &[Tag], key: StandardTagKey) -> Option<String> {
    tags.iter()
        .find(|t| t.std_key == Some(key))
        .map(|t| t.value.to_string())
}

fn find_tag_named(tags: &[Tag], name: &str) -> Option<String> {
    tags.iter()
        .find(|t| t.key.eq_ignore_ascii_case(name))
        .map(|t| t.value.to_string())
}

fn find_gain(tags: &[Tag], name: &str) -> f64 {
    find_tag_named(tags, name)
        .and_then(|v| v.trim().trim_end_matches("dB").trim_end_matches("DB").trim().parse().ok())
        .unwrap_or(0.0)
}

fn find_peak(tags: &[Tag], name: &str) -> f64 {
    find_tag_named(tags, name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_gain_defaults_to_neutral() {
        let file = AudioFile {
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
            duration_seconds: 0,
            zone_name: Cow::Borrowed("test"),
            fade: None,
        };
        assert_eq!(file.replay_gain_linear(), 1.0);
    }

    #[test]
    fn replay_gain_is_capped_by_peak() {
        let mut file = AudioFile {
            path: PathBuf::new(),
            artist: None,
            album: None,
            title: None,
            album_id: None,
            release_track_id: None,
            album_gain_db: 0.0,
            album_peak: 0.0,
            track_gain_db: 6.0,
            track_peak: 0.9,
            duration_seconds: 0,
            zone_name: Cow::Borrowed("test"),
            fade: None,
        };
        let uncapped = 10f64.powf(6.0 / 20.0);
        assert!(uncapped > 1.0 / 0.9);
        assert!((file.replay_gain_linear() - 1.0 / 0.9).abs() < 1e-9);
        file.track_peak = 0.0;
        assert!((file.replay_gain_linear() - uncapped).abs() < 1e-9);
    }
}
