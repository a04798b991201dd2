use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::{Config, FadeInfo, IntermediatePlaylistRef, PlaylistRef, Zone};
use crate::errors::{MediaLoadError, PlaylistError, SchedulerError};
use crate::media::{self, AudioFile};
use crate::playlist::Playlist;
use crate::time::WallTime;

/// Per-intermediate-playlist burst bookkeeping. `pending == -1` means idle;
/// `pending >= 0` means a burst of that many items (possibly zero, about to
/// close) is in progress.
struct BurstState {
    last_scheduled_time: WallTime,
    pending: i64,
}

impl BurstState {
    /// Idle, but already due: backdates `last_scheduled_time` by a full
    /// interval so the first burst after startup fires immediately instead of
    /// waiting out one interval first.
    fn idle_from(start_time: WallTime, interval_minutes: u32) -> Self {
        Self {
            last_scheduled_time: WallTime(start_time.0.saturating_sub(interval_minutes as u64 * 60)),
            pending: -1,
        }
    }
}

/// Pure selection logic over the weekly schedule: given a wall time, picks
/// the next track to play. Owns the loaded playlists (so cursor position and
/// mtime tracking persist call to call) and the burst state for every
/// intermediate playlist.
pub struct Scheduler {
    config: Config,
    playlists: HashMap<PathBuf, Playlist>,
    bursts: HashMap<String, BurstState>,
    start_time: WallTime,
}

impl Scheduler {
    pub fn new(config: Config, start_time: WallTime) -> Self {
        Self {
            config,
            playlists: HashMap::new(),
            bursts: HashMap::new(),
            start_time,
        }
    }

    pub fn next_for(&mut self, now: WallTime) -> Result<(AudioFile, Option<FadeInfo>), SchedulerError> {
        if let Err(err) = self.config.reload_if_changed() {
            log::warn!("config reload failed, continuing with previous schedule: {err}");
        }

        let weekday = now.weekday();
        let day = self.config.week.day(weekday);
        let time_of_day = now.time_of_day_secs();
        let zone = day.zone_for(time_of_day).ok_or_else(|| SchedulerError::NoZoneForDay {
            weekday: weekday.to_string(),
        })?;
        if zone.start_time_of_day_secs > time_of_day {
            log::warn!(
                "time of day {time_of_day} precedes every zone's start today; falling back to '{}'",
                zone.name
            );
        }

        if let Some((reference, zone_name)) = self.pick_intermediate(zone, now) {
            match self.get_next_item(&reference, zone_name.clone()) {
                Ok(file) => return Ok((file, reference.base.fade)),
                Err(err) => log::warn!("intermediate playlist '{}' unavailable: {err}", reference.name),
            }
        }

        let zone_name: Cow<'static, str> = Cow::Owned(zone.name.clone());
        let main = zone.main.clone();
        match self.get_next_item(&main, zone_name.clone()) {
            Ok(file) => return Ok((file, main.fade)),
            Err(err) => log::warn!("main playlist in zone '{}' unavailable: {err}", zone.name),
        }

        if let Some(fallback) = zone.fallback.clone() {
            match self.get_next_item(&fallback, zone_name) {
                Ok(file) => return Ok((file, fallback.fade)),
                Err(err) => log::warn!("fallback playlist in zone '{}' unavailable: {err}", zone.name),
            }
        }

        Err(SchedulerError::AllSourcesExhausted {
            zone: zone.name.clone(),
        })
    }

    /// Runs the burst state machine over `zone.others` in priority order,
    /// returning the chosen intermediate playlist reference (with its
    /// burst's pending count already decremented) if one should fire now.
    fn pick_intermediate(
        &mut self,
        zone: &Zone,
        now: WallTime,
    ) -> Option<(IntermediatePlaylistRef, Cow<'static, str>)> {
        let start_time = self.start_time;
        for ipls in &zone.others {
            let key = format!("{}::{}", zone.name, ipls.name);
            let state = self
                .bursts
                .entry(key)
                .or_insert_with(|| BurstState::idle_from(start_time, ipls.interval_minutes));

            let ready_time = state.last_scheduled_time.plus_secs(ipls.interval_minutes as u64 * 60);
            let ready = now.0 >= ready_time.0;

            if state.pending == -1 {
                if ready {
                    state.pending = ipls.items_per_burst as i64;
                } else {
                    continue;
                }
            }

            if state.pending > 0 {
                state.pending -= 1;
                return Some((ipls.clone(), Cow::Owned(zone.name.clone())));
            }

            // pending == 0: close out this burst and keep scanning lower priority lists.
            state.last_scheduled_time = now;
            state.pending = -1;
        }
        None
    }

    fn get_next_item(
        &mut self,
        reference: &PlaylistRef,
        zone_name: Cow<'static, str>,
    ) -> Result<AudioFile, SchedulerError> {
        let playlist = match self.playlists.get_mut(&reference.path) {
            Some(p) => p,
            None => {
                let loaded = Playlist::load(reference)?;
                self.playlists.entry(reference.path.clone()).or_insert(loaded)
            }
        };

        if let Err(err) = playlist.reload_if_changed() {
            log::warn!("playlist '{}' reload failed, continuing with previous contents: {err}", reference.path.display());
        }

        let path = playlist.next_readable_path().ok_or_else(|| {
            SchedulerError::Playlist(PlaylistError::Empty {
                path: reference.path.display().to_string(),
            })
        })?;
        let fade = playlist.fade();

        media::load(&path, zone_name, fade, false)
            .map_err(|err| media_load_to_playlist_error(&path, err))
            .map_err(SchedulerError::Playlist)
    }
}

fn media_load_to_playlist_error(path: &std::path::Path, err: MediaLoadError) -> PlaylistError {
    log::warn!("skipping unplayable media file {}: {err}", path.display());
    PlaylistError::Empty {
        path: path.display().to_string(),
    }
}
