use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

/// A value fell outside an expected range or bound.
///
/// Generic over the value's type so the same error shape serves index bounds
/// (`usize`) and level bounds (`f64`) alike.
#[derive(Debug, Error)]
pub enum OutOfBoundsError<T> {
    #[error("value {value:?} is above the maximum of {max:?}")]
    High { value: T, max: T },
    #[error("value {value:?} is below the minimum of {min:?}")]
    Low { value: T, min: T },
}

impl<T: PartialOrd + Debug> OutOfBoundsError<T> {
    /// Build a `High` or `Low` variant depending on which bound `value` violates.
    ///
    /// Panics if `value` is actually within `[min, max]` -- callers should only
    /// reach for this after confirming the value is out of range.
    pub fn range(value: T, min: T, max: T) -> Self {
        if value > max {
            Self::High { value, max }
        } else if value < min {
            Self::Low { value, min }
        } else {
            panic!("OutOfBoundsError::range called with a value inside [{min:?}, {max:?}]: {value:?}")
        }
    }
}

#[derive(Debug, Error)]
pub enum SeekError {
    #[error("invalid seek duration (expected maximum {max:?}, got {to:?})")]
    OutOfRange { to: Duration, max: Duration },
    #[error("the player does not have a song which can be skipped")]
    NoCurrentSong,
}

impl SeekError {
    pub fn out_of_range(to: Duration, max: Duration) -> Self {
        Self::OutOfRange { to, max }
    }
}

#[derive(Debug, Error)]
#[error("the player is already running")]
pub struct PlayerRunningError;

/// A day name could not be parsed from the schedule's `Mon`..`Sun` element names.
#[derive(Debug, Error)]
#[error("'{0}' is not a recognized day-of-week element name")]
pub struct UnknownDayError(pub String);

/// Errors from loading or validating the weekly schedule configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse XML in {path}: {source}")]
    Xml {
        path: String,
        #[source]
        source: quick_xml::DeError,
    },
    #[error("schema validation failed: {0}")]
    Invalid(String),
}

/// Errors from loading or re-scanning a playlist file.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("failed to read playlist file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("playlist {path} contains no usable entries")]
    Empty { path: String },
    #[error("unrecognized playlist file extension in {path}")]
    UnknownFormat { path: String },
}

/// Errors opening or scanning an audio file for metadata and duration.
#[derive(Debug, Error)]
pub enum MediaLoadError {
    #[error("could not open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: symphonia::core::errors::Error,
    },
    #[error("{path} has no usable audio track")]
    NoTrack { path: String },
    #[error("decode scan of {path} failed: {source}")]
    DecodeScan {
        path: String,
        #[source]
        source: symphonia::core::errors::Error,
    },
    #[error("{path} decoded to zero audio frames")]
    EmptyDecode { path: String },
    #[error("could not build a decoder for {path}: {source}")]
    NoDecoder {
        path: String,
        #[source]
        source: symphonia::core::errors::Error,
    },
    #[error("could not build a resampler for {path}: {source}")]
    Resampler { path: String, source: String },
}

/// Errors from the scheduler's selection pass.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no zone is defined for {weekday}")]
    NoZoneForDay { weekday: String },
    #[error(transparent)]
    Playlist(#[from] PlaylistError),
    #[error("every playlist in zone '{zone}' and its fallbacks is exhausted")]
    AllSourcesExhausted { zone: String },
}

/// Errors bringing up the audio output stream.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no default output device is available")]
    NoDevice,
    #[error("output device has no usable stream configuration: {0}")]
    NoSupportedConfig(String),
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Errors from loading the schedule's pick into an open decode pipeline, as
/// done by the schedule worker (and once, synchronously, at engine startup).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Media(#[from] MediaLoadError),
}

/// Top-level fatal error surfaced to `main`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Output(#[from] OutputError),
}
