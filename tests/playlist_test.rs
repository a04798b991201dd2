use std::fs;
use std::path::Path;

use playoutd::config::PlaylistRef;
use playoutd::playlist::Playlist;

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"").unwrap();
}

fn write_m3u(dir: &Path, name: &str, entries: &[&str]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, entries.join("\n")).unwrap();
    path
}

#[test]
fn playlist_cycles_back_to_its_first_entry_after_a_full_pass() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "one.mp3");
    touch(dir.path(), "two.mp3");
    touch(dir.path(), "three.mp3");
    let path = write_m3u(dir.path(), "main.m3u", &["one.mp3", "two.mp3", "three.mp3"]);

    let reference = PlaylistRef {
        path,
        shuffle: false,
        fade: None,
    };
    let mut playlist = Playlist::load(&reference).unwrap();

    let first_pass: Vec<_> = (0..3).map(|_| playlist.next_readable_path().unwrap()).collect();
    let second_pass_first = playlist.next_readable_path().unwrap();

    assert_eq!(second_pass_first, first_pass[0]);
}

#[test]
fn unreadable_entries_are_skipped_without_disturbing_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "one.mp3");
    // "missing.mp3" is listed but never created on disk.
    touch(dir.path(), "two.mp3");
    let path = write_m3u(dir.path(), "main.m3u", &["one.mp3", "missing.mp3", "two.mp3"]);

    let reference = PlaylistRef {
        path,
        shuffle: false,
        fade: None,
    };
    let mut playlist = Playlist::load(&reference).unwrap();

    assert!(playlist.next_readable_path().unwrap().ends_with("one.mp3"));
    assert!(playlist.next_readable_path().unwrap().ends_with("two.mp3"));
    assert!(playlist.next_readable_path().unwrap().ends_with("one.mp3"));
}

#[test]
fn reload_if_changed_is_a_noop_when_mtime_is_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "one.mp3");
    let path = write_m3u(dir.path(), "main.m3u", &["one.mp3"]);

    let reference = PlaylistRef {
        path,
        shuffle: false,
        fade: None,
    };
    let mut playlist = Playlist::load(&reference).unwrap();
    assert!(!playlist.reload_if_changed().unwrap());
}

#[test]
fn shuffled_playlist_preserves_its_item_set_across_a_wrap() {
    let dir = tempfile::tempdir().unwrap();
    let names = ["one.mp3", "two.mp3", "three.mp3", "four.mp3", "five.mp3"];
    for name in names {
        touch(dir.path(), name);
    }
    let path = write_m3u(dir.path(), "main.m3u", &names);

    let reference = PlaylistRef {
        path,
        shuffle: true,
        fade: None,
    };
    let mut playlist = Playlist::load(&reference).unwrap();

    let mut first_cycle: Vec<_> = (0..5).map(|_| playlist.next_readable_path().unwrap()).collect();
    let mut second_cycle: Vec<_> = (0..5).map(|_| playlist.next_readable_path().unwrap()).collect();
    first_cycle.sort();
    second_cycle.sort();
    assert_eq!(first_cycle, second_cycle);
}
