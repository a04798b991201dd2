//! Structural validation standing in for XSD schema validation.
//!
//! The corpus this crate was grown from has no XSD-validating dependency, so
//! conformance is checked by hand against the same constraints an XSD would
//! express: element cardinality, attribute presence, numeric ranges, and time
//! format. The schema text itself is embedded purely as a documentation
//! artifact baked into the binary.
use super::raw::{FaderXml, PlaylistXml, WeekScheduleXml, ZoneXml};
use crate::errors::ConfigError;

/// Reference copy of the schema this validator enforces, embedded at compile
/// time so the binary carries its own documentation of the wire format.
pub static SCHEMA_REFERENCE: &str = include_str!("schema.xsd");

pub fn validate(week: &WeekScheduleXml) -> Result<(), ConfigError> {
    let days = [
        ("Sun", &week.sun),
        ("Mon", &week.mon),
        ("Tue", &week.tue),
        ("Wed", &week.wed),
        ("Thu", &week.thu),
        ("Fri", &week.fri),
        ("Sat", &week.sat),
    ];
    for (day_name, day) in days {
        if day.zones.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "day '{day_name}' has no zones"
            )));
        }
        let mut prev_start: Option<u32> = None;
        for zone in &day.zones {
            let start = parse_hms(&zone.start).map_err(|e| {
                ConfigError::Invalid(format!(
                    "day '{day_name}' zone '{}': {e}",
                    zone.name
                ))
            })?;
            if let Some(prev) = prev_start {
                if start <= prev {
                    return Err(ConfigError::Invalid(format!(
                        "day '{day_name}': zone '{}' does not start strictly after the previous zone",
                        zone.name
                    )));
                }
            }
            prev_start = Some(start);
            validate_zone(day_name, zone)?;
        }
    }
    Ok(())
}

fn validate_zone(day_name: &str, zone: &ZoneXml) -> Result<(), ConfigError> {
    if zone.name.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "day '{day_name}': zone has an empty Name"
        )));
    }
    validate_playlist(day_name, &zone.name, "Main", &zone.main)?;
    if let Some(fallback) = &zone.fallback {
        validate_playlist(day_name, &zone.name, "Fallback", fallback)?;
    }
    if zone.intermediate.len() > 4 {
        return Err(ConfigError::Invalid(format!(
            "day '{day_name}' zone '{}': more than 4 Intermediate playlists",
            zone.name
        )));
    }
    for ipls in &zone.intermediate {
        validate_playlist(day_name, &zone.name, "Intermediate", &ipls.base)?;
        if ipls.sched_interval_mins == 0 {
            return Err(ConfigError::Invalid(format!(
                "day '{day_name}' zone '{}': Intermediate '{}' has SchedIntervalMins=0",
                zone.name, ipls.name
            )));
        }
        if ipls.num_sched_items == 0 {
            return Err(ConfigError::Invalid(format!(
                "day '{day_name}' zone '{}': Intermediate '{}' has NumSchedItems=0",
                zone.name, ipls.name
            )));
        }
    }
    Ok(())
}

fn validate_playlist(
    day_name: &str,
    zone_name: &str,
    role: &str,
    playlist: &PlaylistXml,
) -> Result<(), ConfigError> {
    if playlist.path.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "day '{day_name}' zone '{zone_name}': {role} playlist has an empty Path"
        )));
    }
    if let Some(fader) = &playlist.fader {
        validate_fader(day_name, zone_name, role, fader)?;
    }
    Ok(())
}

fn validate_fader(
    day_name: &str,
    zone_name: &str,
    role: &str,
    fader: &FaderXml,
) -> Result<(), ConfigError> {
    for (label, secs) in [
        ("FadeInDurationSecs", fader.fade_in_duration_secs),
        ("FadeOutDurationSecs", fader.fade_out_duration_secs),
    ] {
        if !(0.0..=10.0).contains(&secs) {
            return Err(ConfigError::Invalid(format!(
                "day '{day_name}' zone '{zone_name}' {role}: {label}={secs} is outside 0..10"
            )));
        }
    }
    for (label, level) in [
        ("MinLevel", fader.min_level),
        ("MaxLevel", fader.max_level),
    ] {
        if !(0.0..=1.0).contains(&level) {
            return Err(ConfigError::Invalid(format!(
                "day '{day_name}' zone '{zone_name}' {role}: {label}={level} is outside 0.0..1.0"
            )));
        }
    }
    if fader.min_level > fader.max_level {
        return Err(ConfigError::Invalid(format!(
            "day '{day_name}' zone '{zone_name}' {role}: MinLevel exceeds MaxLevel"
        )));
    }
    Ok(())
}

/// Parses `HH:MM:SS` into seconds since midnight.
fn parse_hms(text: &str) -> Result<u32, String> {
    let mut parts = text.splitn(3, ':');
    let (Some(h), Some(m), Some(s)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("'{text}' is not HH:MM:SS"));
    };
    let h: u32 = h.parse().map_err(|_| format!("'{text}' has a non-numeric hour"))?;
    let m: u32 = m.parse().map_err(|_| format!("'{text}' has a non-numeric minute"))?;
    let s: u32 = s.parse().map_err(|_| format!("'{text}' has a non-numeric second"))?;
    if h > 23 || m > 59 || s > 59 {
        return Err(format!("'{text}' is out of HH:MM:SS range"));
    }
    Ok(h * 3600 + m * 60 + s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_time() {
        assert_eq!(parse_hms("06:30:00").unwrap(), 6 * 3600 + 30 * 60);
    }

    #[test]
    fn rejects_bad_hour() {
        assert!(parse_hms("24:00:00").is_err());
    }

    #[test]
    fn rejects_malformed_time() {
        assert!(parse_hms("06:30").is_err());
    }
}
