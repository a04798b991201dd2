//! Wire-format structs deserialized directly from the schedule XML via
//! `quick_xml`'s serde support. Kept separate from the runtime model in
//! `super` so attribute/element quirks of the XML shape don't leak into the
//! types the scheduler actually operates on.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WeekScheduleXml {
    #[serde(rename = "Sun")]
    pub sun: DayXml,
    #[serde(rename = "Mon")]
    pub mon: DayXml,
    #[serde(rename = "Tue")]
    pub tue: DayXml,
    #[serde(rename = "Wed")]
    pub wed: DayXml,
    #[serde(rename = "Thu")]
    pub thu: DayXml,
    #[serde(rename = "Fri")]
    pub fri: DayXml,
    #[serde(rename = "Sat")]
    pub sat: DayXml,
}

impl WeekScheduleXml {
    pub fn days(&self) -> [&DayXml; 7] {
        [
            &self.sun, &self.mon, &self.tue, &self.wed, &self.thu, &self.fri, &self.sat,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DayXml {
    #[serde(rename = "Zone", default)]
    pub zones: Vec<ZoneXml>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ZoneXml {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Start")]
    pub start: String,
    #[serde(rename = "Maintainer")]
    pub maintainer: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Comment")]
    pub comment: Option<String>,
    #[serde(rename = "Main")]
    pub main: PlaylistXml,
    #[serde(rename = "Fallback")]
    pub fallback: Option<PlaylistXml>,
    #[serde(rename = "Intermediate", default)]
    pub intermediate: Vec<IntermediatePlaylistXml>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaylistXml {
    #[serde(rename = "@Path")]
    pub path: String,
    #[serde(rename = "@Shuffle", default)]
    pub shuffle: bool,
    #[serde(rename = "Fader")]
    pub fader: Option<FaderXml>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IntermediatePlaylistXml {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@SchedIntervalMins")]
    pub sched_interval_mins: u32,
    #[serde(rename = "@NumSchedItems")]
    pub num_sched_items: u32,
    #[serde(flatten)]
    pub base: PlaylistXml,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FaderXml {
    #[serde(rename = "@FadeInDurationSecs", default)]
    pub fade_in_duration_secs: f64,
    #[serde(rename = "@FadeOutDurationSecs", default)]
    pub fade_out_duration_secs: f64,
    #[serde(rename = "@MinLevel", default)]
    pub min_level: f64,
    #[serde(rename = "@MaxLevel", default = "default_max_level")]
    pub max_level: f64,
}

fn default_max_level() -> f64 {
    1.0
}
