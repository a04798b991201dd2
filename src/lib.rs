//! Core of `playoutd`, an unattended radio-broadcast audio player: given a
//! weekly, time-zoned playlist schedule, continuously renders a single
//! stereo PCM stream to the system's default audio output, crossfading and
//! level-normalizing successive tracks without gaps.
//!
//! The binary (`src/main.rs`) is a thin CLI wrapper around [`engine::Engine`].

pub mod config;
pub mod decode;
pub mod engine;
pub mod errors;
pub mod media;
pub mod playlist;
pub mod queue;
pub mod random;
pub mod ring;
pub mod scheduler;
pub mod signals;
pub mod status;
pub mod time;
pub mod worker;
