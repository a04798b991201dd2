use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::config::Config;
use crate::errors::{EngineError, WorkerError};
use crate::output;
use crate::ring::new_ring;
use crate::scheduler::Scheduler;
use crate::status::StatusHub;
use crate::time::WallTime;
use crate::worker::{run_decode_worker, run_schedule_worker, Slots};

/// The engine's lifecycle. Transitions are driven by signals (start/stop/
/// pause/resume) and by the output callback noticing a state-fade has
/// finished.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Stopped = 0,
    Playing = 1,
    Pausing = 2,
    Paused = 3,
    Resuming = 4,
    Stopping = 5,
    Error = 6,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Stopped,
            1 => Self::Playing,
            2 => Self::Pausing,
            3 => Self::Paused,
            4 => Self::Resuming,
            5 => Self::Stopping,
            _ => Self::Error,
        }
    }
}

/// The engine state word: a single aligned atomic, read by every thread and
/// written by the signal-dispatch thread and the output callback. No mutex.
#[derive(Debug)]
pub struct EngineStateCell(AtomicU8);

impl EngineStateCell {
    pub fn new(initial: EngineState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for EngineStateCell {
    fn default() -> Self {
        Self::new(EngineState::Stopped)
    }
}

/// A one-shot "go" signal shared between two threads, modeled as a small
/// state enum behind a `Mutex`/`Condvar` pair rather than a bare boolean, so
/// spurious wakeups and shutdown both have an explicit represented state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GoState {
    Idle,
    Go,
    ShuttingDown,
}

pub struct GoSignal {
    state: Mutex<GoState>,
    condvar: Condvar,
}

impl GoSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GoState::Idle),
            condvar: Condvar::new(),
        }
    }

    pub fn post(&self) {
        let mut state = self.state.lock().unwrap();
        *state = GoState::Go;
        self.condvar.notify_one();
    }

    pub fn shut_down(&self) {
        let mut state = self.state.lock().unwrap();
        *state = GoState::ShuttingDown;
        self.condvar.notify_all();
    }

    /// Blocks until posted or shut down, then consumes the `Go` state (so the
    /// next wait blocks again). Returns `false` if shutting down.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        while *state == GoState::Idle {
            state = self.condvar.wait(state).unwrap();
        }
        match *state {
            GoState::Go => {
                *state = GoState::Idle;
                true
            }
            GoState::ShuttingDown => false,
            GoState::Idle => unreachable!(),
        }
    }
}

impl Default for GoSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// The three condition variables from the concurrency model: `decoder_go`,
/// `scheduler_go`, and `space_available`, plus the shared engine state word.
pub struct EngineSignals {
    pub state: EngineStateCell,
    pub decoder_go: GoSignal,
    pub scheduler_go: GoSignal,
    pub space_available: GoSignal,
}

impl EngineSignals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: EngineStateCell::default(),
            decoder_go: GoSignal::new(),
            scheduler_go: GoSignal::new(),
            space_available: GoSignal::new(),
        })
    }

    pub fn shut_down(&self) {
        self.state.store(EngineState::Stopping);
        self.decoder_go.shut_down();
        self.scheduler_go.shut_down();
        self.space_available.shut_down();
    }

    pub fn request_stop(&self) {
        self.shut_down();
    }

    pub fn request_pause(&self) {
        if self.state.load() == EngineState::Playing {
            self.state.store(EngineState::Pausing);
        }
    }

    pub fn request_resume(&self) {
        if self.state.load() == EngineState::Paused {
            self.state.store(EngineState::Resuming);
        }
    }
}

/// Owns every long-lived piece described in §2 of the design: the scheduler,
/// the decode/schedule worker threads, the output stream, the shared signals
/// and status hub. Construction does the synchronous, possibly-fatal work
/// (parse the schedule, load the first two tracks, open the output device);
/// `start` only spawns threads that are already known to have somewhere to
/// read from.
pub struct Engine {
    signals: Arc<EngineSignals>,
    status: Arc<StatusHub>,
    output_stream: Option<cpal::Stream>,
    decode_handle: Option<JoinHandle<()>>,
    schedule_handle: Option<JoinHandle<Result<(), WorkerError>>>,
}

impl Engine {
    pub fn new(schedule_path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let config = Config::load(schedule_path)?;
        let scheduler = Arc::new(Mutex::new(Scheduler::new(config, WallTime::now())));
        let slots = Arc::new(Mutex::new(Slots::default()));
        let signals = EngineSignals::new();
        let status = StatusHub::new();

        let (producer, consumer) = new_ring();
        let output_stream = output::start_output_stream(consumer, signals.clone(), status.clone())?;

        let decode_slots = slots.clone();
        let decode_signals = signals.clone();
        let decode_status = status.clone();
        let decode_handle = std::thread::Builder::new()
            .name("decode-worker".into())
            .spawn(move || run_decode_worker(decode_slots, producer, decode_signals, decode_status))
            .expect("failed to spawn decode worker thread");

        let schedule_scheduler = scheduler.clone();
        let schedule_slots = slots.clone();
        let schedule_signals = signals.clone();
        let schedule_status = status.clone();
        let schedule_handle = std::thread::Builder::new()
            .name("schedule-worker".into())
            .spawn(move || {
                run_schedule_worker(schedule_scheduler, schedule_slots, schedule_signals, schedule_status)
            })
            .expect("failed to spawn schedule worker thread");

        Ok(Self {
            signals,
            status,
            output_stream: Some(output_stream),
            decode_handle: Some(decode_handle),
            schedule_handle: Some(schedule_handle),
        })
    }

    pub fn signals(&self) -> Arc<EngineSignals> {
        self.signals.clone()
    }

    pub fn status(&self) -> Arc<StatusHub> {
        self.status.clone()
    }

    /// `STOPPED -> RESUMING`: the output callback ramps in over the state
    /// fade as soon as the ring has samples to offer it.
    pub fn start(&self) {
        self.signals.state.store(EngineState::Resuming);
    }

    pub fn pause(&self) {
        self.signals.request_pause();
    }

    pub fn resume(&self) {
        self.signals.request_resume();
    }

    /// Requests shutdown and blocks until both worker threads have joined
    /// and the output stream has been torn down, per the
    /// `STOPPING -> STOPPED` transition.
    pub fn stop_and_join(mut self) {
        self.signals.request_stop();
        self.output_stream.take();
        if let Some(handle) = self.decode_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.schedule_handle.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::error!("schedule worker exited with an error: {err}"),
                Err(_) => log::error!("schedule worker thread panicked"),
            }
        }
        self.signals.state.store(EngineState::Stopped);
    }
}
