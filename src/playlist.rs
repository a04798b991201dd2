use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::{FadeInfo, PlaylistRef};
use crate::errors::PlaylistError;
use crate::queue::{Queue, RepeatMode};
use crate::random::Random;

/// Runtime state for one playlist file: the parsed item list, a rotating
/// cursor (via the same `Queue` the decoder's drafts already used for
/// repeat-mode iteration), and mtime-triggered reload.
pub struct Playlist {
    source_path: PathBuf,
    shuffle: bool,
    fade: Option<FadeInfo>,
    last_mtime: Option<SystemTime>,
    queue: Queue<PathBuf>,
}

impl Playlist {
    pub fn load(reference: &PlaylistRef) -> Result<Self, PlaylistError> {
        let mut playlist = Self {
            source_path: reference.path.clone(),
            shuffle: reference.shuffle,
            fade: reference.fade,
            last_mtime: None,
            queue: Queue::new(RepeatMode::All),
        };
        playlist.reload()?;
        Ok(playlist)
    }

    pub fn fade(&self) -> Option<FadeInfo> {
        self.fade
    }

    /// Reload if the source file's mtime changed. A non-fatal error (mtime
    /// read failure, unreadable file, unrecognized extension, empty result)
    /// leaves the previous item list in place.
    pub fn reload_if_changed(&mut self) -> Result<bool, PlaylistError> {
        let mtime = self.read_mtime()?;
        if Some(mtime) == self.last_mtime {
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }

    fn reload(&mut self) -> Result<(), PlaylistError> {
        let mtime = self.read_mtime()?;
        let mut items = parse_playlist_file(&self.source_path)?;
        if items.is_empty() {
            return Err(PlaylistError::Empty {
                path: self.source_path.display().to_string(),
            });
        }
        if self.shuffle {
            let mut rng = Random::from_entropy();
            rng.shuffle(&mut items);
        }
        self.queue.clear();
        self.queue.extend(items);
        self.last_mtime = Some(mtime);
        Ok(())
    }

    fn read_mtime(&self) -> Result<SystemTime, PlaylistError> {
        fs::metadata(&self.source_path)
            .and_then(|m| m.modified())
            .map_err(|source| PlaylistError::Io {
                path: self.source_path.display().to_string(),
                source,
            })
    }

    /// Scan forward from the cursor for the first readable path, wrapping
    /// (and re-shuffling, if enabled) at the end of the list. Returns the
    /// chosen path, or `None` if nothing in the list is currently readable.
    pub fn next_readable_path(&mut self) -> Option<PathBuf> {
        let len = self.queue.items().len();
        for _ in 0..len {
            let prev_index = self.queue.index();
            let path = self.queue.next_item()?.clone();
            if self.queue.index() < prev_index {
                self.reshuffle_if_enabled();
            }
            if is_regular_file(&path) {
                return Some(path);
            }
            log::warn!("skipping unreadable playlist entry: {}", path.display());
        }
        None
    }

    /// Re-shuffles the queue's items in place, keeping the cursor at its
    /// current position. Called on every wrap (index dropping back to 0) so a
    /// `shuffle=true` playlist doesn't repeat the same permutation forever.
    fn reshuffle_if_enabled(&mut self) {
        if !self.shuffle {
            return;
        }
        let mut rng = Random::from_entropy();
        rng.shuffle(self.queue.items_mut());
    }
}

/// Real filesystem check: no legacy "always true" branch.
fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

fn parse_playlist_file(path: &Path) -> Result<Vec<PathBuf>, PlaylistError> {
    let text = fs::read_to_string(path).map_err(|source| PlaylistError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let raw_entries: Vec<&str> = match ext.as_deref() {
        Some("m3u") | Some("m3u8") => parse_m3u(&text),
        Some("pls") => parse_pls(&text),
        _ => {
            return Err(PlaylistError::UnknownFormat {
                path: path.display().to_string(),
            })
        }
    };
    Ok(raw_entries
        .into_iter()
        .map(|entry| resolve_entry(parent, entry))
        .collect())
}

fn parse_m3u(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

fn parse_pls(text: &str) -> Vec<&str> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    match lines.next() {
        Some(header) if header.eq_ignore_ascii_case("[playlist]") => {}
        _ => return Vec::new(),
    }
    lines
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            if key.trim().to_ascii_lowercase().starts_with("file") {
                Some(value.trim())
            } else {
                None
            }
        })
        .collect()
}

fn resolve_entry(parent: &Path, entry: &str) -> PathBuf {
    let p = PathBuf::from(entry);
    if p.is_absolute() {
        p
    } else {
        parent.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(name: &str, contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("playoutd-test-{}-{name}", std::process::id()));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    /// Creates empty companion files next to `playlist_path` for every entry
    /// listed in it, so `is_regular_file` sees them as readable.
    fn touch_entries(playlist_path: &Path, names: &[&str]) {
        let parent = playlist_path.parent().unwrap();
        for name in names {
            fs::write(parent.join(name), b"").unwrap();
        }
    }

    #[test]
    fn parses_m3u_skipping_comments() {
        let path = write_tmp("a.m3u", "#EXTM3U\n#EXTINF:123,Some Track\ntrack1.mp3\n\ntrack2.mp3\n");
        let items = parse_playlist_file(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].ends_with("track1.mp3"));
        fs::remove_file(path).ok();
    }

    #[test]
    fn parses_pls_file_entries() {
        let path = write_tmp(
            "b.pls",
            "[playlist]\nNumberOfEntries=2\nFile1=track1.mp3\nFile2=track2.mp3\nVersion=2\n",
        );
        let items = parse_playlist_file(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[1].ends_with("track2.mp3"));
        fs::remove_file(path).ok();
    }

    #[test]
    fn relative_paths_resolve_against_playlist_parent() {
        let path = write_tmp("c.m3u", "track1.mp3\n");
        let items = parse_playlist_file(&path).unwrap();
        assert_eq!(items[0].parent(), path.parent());
        fs::remove_file(path).ok();
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let path = write_tmp("d.txt", "track1.mp3\n");
        assert!(parse_playlist_file(&path).is_err());
        fs::remove_file(path).ok();
    }

    #[test]
    fn non_shuffled_playlist_repeats_same_order_after_wrap() {
        let names = ["wraptrack1.mp3", "wraptrack2.mp3", "wraptrack3.mp3"];
        let path = write_tmp("e.m3u", &names.join("\n"));
        touch_entries(&path, &names);
        let reference = PlaylistRef {
            path: path.clone(),
            shuffle: false,
            fade: None,
        };
        let mut playlist = Playlist::load(&reference).unwrap();
        let first_cycle: Vec<_> = (0..3).map(|_| playlist.next_readable_path().unwrap()).collect();
        let second_cycle: Vec<_> = (0..3).map(|_| playlist.next_readable_path().unwrap()).collect();
        assert_eq!(first_cycle, second_cycle);
        fs::remove_file(&path).ok();
        for name in names {
            fs::remove_file(path.parent().unwrap().join(name)).ok();
        }
    }

    #[test]
    fn shuffled_playlist_preserves_item_set_after_wrap() {
        let names = [
            "shuftrack1.mp3",
            "shuftrack2.mp3",
            "shuftrack3.mp3",
            "shuftrack4.mp3",
            "shuftrack5.mp3",
        ];
        let path = write_tmp("f.m3u", &names.join("\n"));
        touch_entries(&path, &names);
        let reference = PlaylistRef {
            path: path.clone(),
            shuffle: true,
            fade: None,
        };
        let mut playlist = Playlist::load(&reference).unwrap();
        let mut first_cycle: Vec<_> = (0..5).map(|_| playlist.next_readable_path().unwrap()).collect();
        let mut second_cycle: Vec<_> = (0..5).map(|_| playlist.next_readable_path().unwrap()).collect();
        first_cycle.sort();
        second_cycle.sort();
        assert_eq!(first_cycle, second_cycle);
        fs::remove_file(&path).ok();
        for name in names {
            fs::remove_file(path.parent().unwrap().join(name)).ok();
        }
    }
}
