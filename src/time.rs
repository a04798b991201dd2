use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, ignoring leap seconds, with a day-of-week and
/// time-of-day decomposition cheap enough to call from the scheduler's hot path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallTime(pub u64);

/// Sunday = 0 .. Saturday = 6, matching the schedule's day ordering.
pub type Weekday = u8;

impl WallTime {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after the Unix epoch")
            .as_secs();
        Self(secs)
    }

    pub fn plus_secs(self, secs: u64) -> Self {
        Self(self.0 + secs)
    }

    /// Days since the epoch Thursday (1970-01-01 was a Thursday), used to derive `weekday`.
    pub fn weekday(self) -> Weekday {
        let days = self.0 / 86_400;
        // 1970-01-01 is day 0 and a Thursday, i.e. weekday index 4 (Sun=0).
        (((days + 4) % 7) as u8).min(6)
    }

    /// Seconds since local midnight, treating the clock as UTC (the schedule's
    /// `HH:MM:SS` start times are plain wall-clock values, not zone-aware).
    pub fn time_of_day_secs(self) -> u32 {
        (self.0 % 86_400) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_thursday() {
        assert_eq!(WallTime(0).weekday(), 4);
    }

    #[test]
    fn one_day_later_is_next_weekday() {
        assert_eq!(WallTime(86_400).weekday(), 5);
    }

    #[test]
    fn time_of_day_wraps_at_midnight() {
        assert_eq!(WallTime(86_400 + 3_661).time_of_day_secs(), 3_661);
    }
}
