use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use tiny_http::{Header, Response, Server};

use crate::media::AudioFile;

/// One track's worth of fields as exposed by the status endpoint. Kept
/// separate from `AudioFile` so the JSON field names (which match the
/// station's legacy wire format, not Rust naming conventions) live in one
/// place.
#[derive(Clone, Debug, Default)]
struct NowPlaying {
    artist: Option<String>,
    album: Option<String>,
    title: Option<String>,
    path: String,
    duration_secs: u64,
    zone: String,
    album_id: Option<String>,
    release_track_id: Option<String>,
}

impl From<&AudioFile> for NowPlaying {
    fn from(f: &AudioFile) -> Self {
        Self {
            artist: f.artist.clone(),
            album: f.album.clone(),
            title: f.title.clone(),
            path: f.path.display().to_string(),
            duration_secs: f.duration_seconds,
            zone: f.zone_name.to_string(),
            album_id: f.album_id.clone(),
            release_track_id: f.release_track_id.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Snapshot {
    current: Option<NowPlaying>,
    next: Option<NowPlaying>,
}

/// Read-mostly status state, shared between the decode thread (which installs
/// a new snapshot at every track switch), the output callback (which only
/// bumps the elapsed-frame counter, never allocates), and the HTTP server
/// (which reads both without ever blocking the audio path on a lock).
pub struct StatusHub {
    snapshot: ArcSwap<Snapshot>,
    elapsed_frames: AtomicU64,
}

impl StatusHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            elapsed_frames: AtomicU64::new(0),
        })
    }

    /// Installs a new current track and resets the elapsed counter. Called
    /// from the decode thread at a track swap (and once at boot); `next` is
    /// left untouched so a concurrent `set_next` from the schedule thread
    /// can't be clobbered by a stale read.
    pub fn set_current(&self, current: Option<&AudioFile>) {
        let current = current.map(NowPlaying::from);
        self.snapshot
            .rcu(|old| Arc::new(Snapshot { current: current.clone(), next: old.next.clone() }));
        self.elapsed_frames.store(0, Ordering::Relaxed);
    }

    /// Installs a new next-up track without touching the elapsed counter.
    /// Called from the schedule thread after it finishes pre-loading.
    pub fn set_next(&self, next: Option<&AudioFile>) {
        let next = next.map(NowPlaying::from);
        self.snapshot
            .rcu(|old| Arc::new(Snapshot { current: old.current.clone(), next: next.clone() }));
    }

    /// Called from the output callback with the number of frames actually
    /// rendered (not silence-filled) this period. Never allocates, never
    /// blocks.
    pub fn advance_elapsed(&self, frames: u64) {
        self.elapsed_frames.fetch_add(frames, Ordering::Relaxed);
    }

    fn elapsed_secs(&self, sample_rate: u32) -> u64 {
        self.elapsed_frames.load(Ordering::Relaxed) / sample_rate as u64
    }
}

/// Backslashes are escaped (this is the one field with real escaping: file
/// paths frequently contain them on the platforms this station runs on).
fn sanitize_path(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Non-path fields get character substitution instead of escaping: the
/// consumer's JSON parser tolerates a literal `/` or `'` in a string but not
/// a dangling backslash-escape, so substitute rather than escape.
fn sanitize_field(s: &str) -> String {
    s.replace('\\', "/").replace('"', "'")
}

fn json_string_or_null(value: &Option<String>, sanitize: impl Fn(&str) -> String) -> String {
    match value {
        Some(v) => format!("\"{}\"", sanitize(v)),
        None => "null".to_string(),
    }
}

fn song_json(song: &NowPlaying, elapsed_secs: Option<u64>) -> String {
    let mut fields = vec![
        format!("\"Artist\":{}", json_string_or_null(&song.artist, sanitize_field)),
        format!("\"Album\":{}", json_string_or_null(&song.album, sanitize_field)),
        format!("\"Title\":{}", json_string_or_null(&song.title, sanitize_field)),
        format!("\"Path\":\"{}\"", sanitize_path(&song.path)),
        format!("\"Duration\":\"{}\"", song.duration_secs),
        format!("\"Zone\":\"{}\"", sanitize_field(&song.zone)),
        format!(
            "\"MusicBrainz Album Id\":{}",
            json_string_or_null(&song.album_id, sanitize_field)
        ),
        format!(
            "\"MusicBrainz Release Track Id\":{}",
            json_string_or_null(&song.release_track_id, sanitize_field)
        ),
    ];
    if let Some(elapsed) = elapsed_secs {
        fields.push(format!("\"Elapsed\":\"{elapsed}\""));
    }
    format!("{{{}}}", fields.join(","))
}

fn build_body(snapshot: &Snapshot, elapsed_secs: u64) -> String {
    let current = snapshot
        .current
        .as_ref()
        .map(|s| song_json(s, Some(elapsed_secs)))
        .unwrap_or_else(|| "null".to_string());
    let next = snapshot
        .next
        .as_ref()
        .map(|s| song_json(s, None))
        .unwrap_or_else(|| "null".to_string());
    format!("{{\"current_song\":{current},\"next_song\":{next}}}")
}

/// Caches the last-rendered body for up to a second so a burst of monitoring
/// requests doesn't recompute the JSON document on every connection.
struct ResponseCache {
    body: String,
    built_at: std::time::Instant,
}

/// Runs the status HTTP server until `stop` is observed. One thread, blocking
/// accept loop; each connection is handled synchronously and closed
/// (`Connection: close`), matching the "tiny" server this replaces.
pub fn run_status_server(server: Server, hub: Arc<StatusHub>, sample_rate: u32) {
    let cache: Mutex<Option<ResponseCache>> = Mutex::new(None);
    let content_type = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
    let connection_close = Header::from_bytes(&b"Connection"[..], &b"close"[..]).unwrap();

    for request in server.incoming_requests() {
        let elapsed_secs = hub.elapsed_secs(sample_rate);
        let body = {
            let mut cache = cache.lock().unwrap();
            let needs_rebuild = match cache.as_ref() {
                Some(c) => c.built_at.elapsed() >= Duration::from_secs(1),
                None => true,
            };
            if needs_rebuild {
                let snapshot = hub.snapshot.load();
                let body = build_body(&snapshot, elapsed_secs);
                *cache = Some(ResponseCache {
                    body: body.clone(),
                    built_at: std::time::Instant::now(),
                });
                body
            } else {
                cache.as_ref().unwrap().body.clone()
            }
        };

        let response = Response::from_string(body)
            .with_header(content_type.clone())
            .with_header(connection_close.clone());
        if let Err(err) = request.respond(response) {
            log::warn!("status endpoint failed to write a response: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::path::PathBuf;

    fn sample_file(zone: &str) -> AudioFile {
        AudioFile {
            path: PathBuf::from("C:\\music\\a.mp3"),
            artist: Some("Artist \"Quoted\"".to_string()),
            album: Some("Al\\bum".to_string()),
            title: Some("Title".to_string()),
            album_id: None,
            release_track_id: None,
            album_gain_db: 0.0,
            album_peak: 0.0,
            track_gain_db: 0.0,
            track_peak: 0.0,
            duration_seconds: 42,
            zone_name: Cow::Owned(zone.to_string()),
            fade: None,
        }
    }

    #[test]
    fn path_backslashes_are_escaped_not_substituted() {
        let song = NowPlaying::from(&sample_file("Morning"));
        let json = song_json(&song, Some(3));
        assert!(json.contains("\"Path\":\"C:\\\\music\\\\a.mp3\""));
    }

    #[test]
    fn non_path_fields_substitute_instead_of_escaping() {
        let song = NowPlaying::from(&sample_file("Morning"));
        let json = song_json(&song, Some(3));
        assert!(json.contains("\"Album\":\"Al/bum\""));
        assert!(json.contains("\"Artist\":\"Artist 'Quoted'\""));
    }

    #[test]
    fn next_song_omits_elapsed() {
        let song = NowPlaying::from(&sample_file("Morning"));
        let json = song_json(&song, None);
        assert!(!json.contains("Elapsed"));
    }

    #[test]
    fn missing_fields_serialize_as_null() {
        let mut song = NowPlaying::from(&sample_file("Morning"));
        song.artist = None;
        let json = song_json(&song, Some(0));
        assert!(json.contains("\"Artist\":null"));
    }

    #[test]
    fn empty_hub_reports_null_songs() {
        let hub = StatusHub::new();
        let snapshot = hub.snapshot.load();
        let body = build_body(&snapshot, 0);
        assert_eq!(body, "{\"current_song\":null,\"next_song\":null}");
    }

    #[test]
    fn set_next_does_not_disturb_current_or_elapsed() {
        let hub = StatusHub::new();
        hub.set_current(Some(&sample_file("Morning")));
        hub.advance_elapsed(48_000);
        hub.set_next(Some(&sample_file("Evening")));
        let snapshot = hub.snapshot.load();
        assert!(snapshot.current.is_some());
        assert!(snapshot.next.is_some());
        assert_eq!(hub.elapsed_secs(48_000), 1);
    }

    #[test]
    fn set_current_resets_elapsed_but_keeps_next() {
        let hub = StatusHub::new();
        hub.set_next(Some(&sample_file("Evening")));
        hub.advance_elapsed(48_000);
        hub.set_current(Some(&sample_file("Morning")));
        assert_eq!(hub.elapsed_secs(48_000), 0);
        let snapshot = hub.snapshot.load();
        assert!(snapshot.next.is_some());
    }
}
