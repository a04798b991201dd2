mod raw;
mod schema;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use quick_xml::de::from_str;

use crate::errors::ConfigError;
use crate::time::Weekday;

pub use schema::SCHEMA_REFERENCE;

/// Fade-in/out shape applied by the decode worker around a track's boundaries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeInfo {
    pub fadein_secs: f64,
    pub fadeout_secs: f64,
    pub min_level: f64,
    pub max_level: f64,
}

impl Default for FadeInfo {
    fn default() -> Self {
        Self {
            fadein_secs: 0.0,
            fadeout_secs: 0.0,
            min_level: 0.0,
            max_level: 1.0,
        }
    }
}

impl From<&raw::FaderXml> for FadeInfo {
    fn from(f: &raw::FaderXml) -> Self {
        Self {
            fadein_secs: f.fade_in_duration_secs,
            fadeout_secs: f.fade_out_duration_secs,
            min_level: f.min_level,
            max_level: f.max_level,
        }
    }
}

/// A declarative reference to a playlist file as named by the schedule; the
/// runtime state for the path (items, cursor, mtime) lives in the playlist
/// store (`crate::playlist`), keyed by `path`, not here.
#[derive(Clone, Debug)]
pub struct PlaylistRef {
    pub path: PathBuf,
    pub shuffle: bool,
    pub fade: Option<FadeInfo>,
}

impl From<&raw::PlaylistXml> for PlaylistRef {
    fn from(p: &raw::PlaylistXml) -> Self {
        Self {
            path: PathBuf::from(&p.path),
            shuffle: p.shuffle,
            fade: p.fader.as_ref().map(FadeInfo::from),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntermediatePlaylistRef {
    pub base: PlaylistRef,
    pub name: String,
    pub interval_minutes: u32,
    pub items_per_burst: u32,
}

impl From<&raw::IntermediatePlaylistXml> for IntermediatePlaylistRef {
    fn from(p: &raw::IntermediatePlaylistXml) -> Self {
        Self {
            base: PlaylistRef::from(&p.base),
            name: p.name.clone(),
            interval_minutes: p.sched_interval_mins,
            items_per_burst: p.num_sched_items,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Zone {
    pub name: String,
    pub start_time_of_day_secs: u32,
    pub maintainer: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub main: PlaylistRef,
    pub fallback: Option<PlaylistRef>,
    /// Descending priority, declaration order.
    pub others: Vec<IntermediatePlaylistRef>,
}

impl Zone {
    fn from_raw(z: &raw::ZoneXml) -> Result<Self, ConfigError> {
        Ok(Self {
            name: z.name.clone(),
            start_time_of_day_secs: parse_hms(&z.start)
                .map_err(|e| ConfigError::Invalid(format!("zone '{}': {e}", z.name)))?,
            maintainer: z.maintainer.clone(),
            description: z.description.clone(),
            comment: z.comment.clone(),
            main: PlaylistRef::from(&z.main),
            fallback: z.fallback.as_ref().map(PlaylistRef::from),
            others: z.intermediate.iter().map(IntermediatePlaylistRef::from).collect(),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct DaySchedule {
    /// Strictly ascending by `start_time_of_day_secs`.
    pub zones: Vec<Zone>,
}

impl DaySchedule {
    fn from_raw(d: &raw::DayXml) -> Result<Self, ConfigError> {
        let zones = d
            .zones
            .iter()
            .map(Zone::from_raw)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { zones })
    }

    /// Reverse scan: the latest zone whose start is `<= time_of_day_secs`.
    /// Falls back to the first zone (with a caller-side warning) if `now` is
    /// earlier than every zone's start.
    pub fn zone_for(&self, time_of_day_secs: u32) -> Option<&Zone> {
        self.zones
            .iter()
            .rev()
            .find(|z| z.start_time_of_day_secs <= time_of_day_secs)
            .or(self.zones.first())
    }
}

#[derive(Clone, Debug, Default)]
pub struct WeekSchedule {
    /// Sunday = 0 .. Saturday = 6.
    pub days: [DaySchedule; 7],
}

impl WeekSchedule {
    fn from_raw(w: &raw::WeekScheduleXml) -> Result<Self, ConfigError> {
        let mut days: [DaySchedule; 7] = Default::default();
        for (i, raw_day) in w.days().into_iter().enumerate() {
            days[i] = DaySchedule::from_raw(raw_day)?;
        }
        Ok(Self { days })
    }

    pub fn day(&self, weekday: Weekday) -> &DaySchedule {
        &self.days[weekday as usize]
    }
}

pub struct Config {
    path: PathBuf,
    last_mtime: Option<SystemTime>,
    pub week: WeekSchedule,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let (week, mtime) = Self::parse_file(&path)?;
        Ok(Self {
            path,
            last_mtime: Some(mtime),
            week,
        })
    }

    /// Builds a `Config` around an already-constructed `WeekSchedule` without
    /// touching the filesystem, for scheduler tests that don't care about
    /// reload behavior.
    #[cfg(test)]
    pub fn from_week_for_test(path: PathBuf, week: WeekSchedule) -> Self {
        Self {
            path,
            last_mtime: None,
            week,
        }
    }

    /// Reload if the source file's mtime changed. Failure leaves the previous
    /// schedule in place and returns the error for the caller to log.
    pub fn reload_if_changed(&mut self) -> Result<bool, ConfigError> {
        let mtime = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|source| ConfigError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        if Some(mtime) == self.last_mtime {
            return Ok(false);
        }
        let (week, mtime) = Self::parse_file(&self.path)?;
        self.week = week;
        self.last_mtime = Some(mtime);
        Ok(true)
    }

    fn parse_file(path: &Path) -> Result<(WeekSchedule, SystemTime), ConfigError> {
        let mtime = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: raw::WeekScheduleXml = from_str(&text).map_err(|source| ConfigError::Xml {
            path: path.display().to_string(),
            source,
        })?;
        schema::validate(&raw)?;
        let week = WeekSchedule::from_raw(&raw)?;
        Ok((week, mtime))
    }
}

fn parse_hms(text: &str) -> Result<u32, String> {
    let mut parts = text.splitn(3, ':');
    let (Some(h), Some(m), Some(s)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("'{text}' is not HH:MM:SS"));
    };
    let h: u32 = h.parse().map_err(|_| format!("'{text}' has a non-numeric hour"))?;
    let m: u32 = m.parse().map_err(|_| format!("'{text}' has a non-numeric minute"))?;
    let s: u32 = s.parse().map_err(|_| format!("'{text}' has a non-numeric second"))?;
    Ok(h * 3600 + m * 60 + s)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
<WeekSchedule>
  <Sun><Zone Name="Night" Start="00:00:00"><Main Path="/music/night.m3u"/></Zone></Sun>
  <Mon>
    <Zone Name="Morning" Start="06:00:00">
      <Main Path="/music/morning.m3u" Shuffle="true"/>
      <Fallback Path="/music/fallback.m3u"/>
      <Intermediate Name="news" SchedIntervalMins="30" NumSchedItems="1" Path="/music/news.m3u"/>
    </Zone>
    <Zone Name="Evening" Start="18:00:00"><Main Path="/music/evening.m3u"/></Zone>
  </Mon>
  <Tue><Zone Name="AllDay" Start="00:00:00"><Main Path="/music/tue.m3u"/></Zone></Tue>
  <Wed><Zone Name="AllDay" Start="00:00:00"><Main Path="/music/wed.m3u"/></Zone></Wed>
  <Thu><Zone Name="AllDay" Start="00:00:00"><Main Path="/music/thu.m3u"/></Zone></Thu>
  <Fri><Zone Name="AllDay" Start="00:00:00"><Main Path="/music/fri.m3u"/></Zone></Fri>
  <Sat><Zone Name="AllDay" Start="00:00:00"><Main Path="/music/sat.m3u"/></Zone></Sat>
</WeekSchedule>
"#;

    #[test]
    fn parses_and_validates_sample() {
        let raw: raw::WeekScheduleXml = from_str(SAMPLE).unwrap();
        schema::validate(&raw).unwrap();
        let week = WeekSchedule::from_raw(&raw).unwrap();
        assert_eq!(week.days[1].zones.len(), 2);
        assert_eq!(week.days[1].zones[0].others.len(), 1);
    }

    #[test]
    fn reverse_scan_picks_latest_start_at_or_before_now() {
        let raw: raw::WeekScheduleXml = from_str(SAMPLE).unwrap();
        let week = WeekSchedule::from_raw(&raw).unwrap();
        let mon = &week.days[1];
        let zone = mon.zone_for(7 * 3600).unwrap();
        assert_eq!(zone.name, "Morning");
        let zone = mon.zone_for(19 * 3600).unwrap();
        assert_eq!(zone.name, "Evening");
    }

    #[test]
    fn before_first_zone_falls_back_to_first() {
        let raw: raw::WeekScheduleXml = from_str(SAMPLE).unwrap();
        let week = WeekSchedule::from_raw(&raw).unwrap();
        let mon = &week.days[1];
        let zone = mon.zone_for(0).unwrap();
        assert_eq!(zone.name, "Morning");
    }

    #[test]
    fn load_serialize_load_yields_the_same_schedule() {
        let first: raw::WeekScheduleXml = from_str(SAMPLE).unwrap();
        let xml = quick_xml::se::to_string(&first).unwrap();
        let second: raw::WeekScheduleXml = from_str(&xml).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_more_than_four_intermediate_playlists() {
        let mut raw: raw::WeekScheduleXml = from_str(SAMPLE).unwrap();
        let extra = raw.mon.zones[0].intermediate[0].clone();
        for _ in 0..4 {
            raw.mon.zones[0].intermediate.push(extra.clone());
        }
        assert!(schema::validate(&raw).is_err());
    }
}
