use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::decode::AudioFileContext;
use crate::engine::{EngineSignals, EngineState};
use crate::errors::WorkerError;
use crate::ring::{CHANNELS, PERIOD_FRAMES};
use crate::ring::RingProducer;
use crate::scheduler::Scheduler;
use crate::status::StatusHub;
use crate::time::WallTime;

/// The "current" and "next" decode pipelines, behind the single file mutex
/// the concurrency model calls for: acquired briefly by the decode thread
/// (descriptor swap) and for longer by the schedule thread (while a new
/// `next` is being opened and warmed up).
#[derive(Default)]
pub struct Slots {
    pub current: Option<AudioFileContext>,
    pub next: Option<AudioFileContext>,
}

pub type SharedSlots = Arc<Mutex<Slots>>;

fn load_context(scheduler: &Mutex<Scheduler>, at: WallTime) -> Result<AudioFileContext, WorkerError> {
    let (info, _zone_fade) = scheduler.lock().unwrap().next_for(at)?;
    Ok(AudioFileContext::open(info)?)
}

/// The schedule worker (component 9): on start, loads the first two tracks
/// (first becomes `current` immediately, the boot-only case), signals the
/// decoder, then loops staying one track ahead by waiting for `scheduler_go`
/// and loading a fresh `next` under the file mutex.
pub fn run_schedule_worker(
    scheduler: Arc<Mutex<Scheduler>>,
    slots: SharedSlots,
    signals: Arc<EngineSignals>,
    status: Arc<StatusHub>,
) -> Result<(), WorkerError> {
    let boot_time = WallTime::now();
    let first = load_context(&scheduler, boot_time)?;
    let first_duration = first.info.duration_seconds;
    {
        let mut guard = slots.lock().unwrap();
        status.set_current(Some(&first.info));
        guard.current = Some(first);
    }

    let second = load_context(&scheduler, boot_time.plus_secs(first_duration))?;
    {
        let mut guard = slots.lock().unwrap();
        status.set_next(Some(&second.info));
        guard.next = Some(second);
    }
    signals.decoder_go.post();

    loop {
        let pending_next_duration = {
            let guard = slots.lock().unwrap();
            guard.next.as_ref().map(|c| c.info.duration_seconds)
        };

        if !signals.scheduler_go.wait() {
            return Ok(());
        }
        if signals.state.load() == EngineState::Stopping {
            return Ok(());
        }

        let now = WallTime::now();
        let sched_time = now.plus_secs(pending_next_duration.unwrap_or(0));
        let loaded = load_context(&scheduler, sched_time)?;
        status.set_next(Some(&loaded.info));
        let mut guard = slots.lock().unwrap();
        guard.next = Some(loaded);
        drop(guard);
        signals.decoder_go.post();
    }
}

/// The decode worker (component 8): pulls one period at a time from
/// `current`, swapping in `next` mid-period when `current` runs dry, writing
/// the produced bytes into the ring.
pub fn run_decode_worker(
    slots: SharedSlots,
    mut producer: RingProducer,
    signals: Arc<EngineSignals>,
    status: Arc<StatusHub>,
) {
    if !signals.decoder_go.wait() {
        return;
    }

    let period_bytes = PERIOD_FRAMES * CHANNELS * std::mem::size_of::<f32>();
    let mut period_buf = vec![0f32; PERIOD_FRAMES * CHANNELS];

    loop {
        if signals.state.load() == EngineState::Stopping {
            break;
        }

        if producer.free_bytes() < period_bytes {
            if !signals.space_available.wait() {
                break;
            }
            continue;
        }

        let mut guard = slots.lock().unwrap();
        let mut produced = guard
            .current
            .as_mut()
            .map(|ctx| ctx.extract_frames(&mut period_buf, PERIOD_FRAMES))
            .unwrap_or(0);

        if produced < PERIOD_FRAMES && guard.next.is_some() {
            if let Some(cur) = guard.current.as_ref() {
                let drift = (cur.total_samples as i64 - cur.samples_played as i64).abs();
                if drift > 100 {
                    log::warn!(
                        "track '{}' ended with a sample drift of {drift} (expected <= 100)",
                        cur.info.path.display()
                    );
                }
            }
            guard.current = guard.next.take();
            signals.scheduler_go.post();
            status.set_current(guard.current.as_ref().map(|c| &c.info));

            if let Some(cur) = guard.current.as_mut() {
                let remainder = &mut period_buf[produced * CHANNELS..];
                produced += cur.extract_frames(remainder, PERIOD_FRAMES - produced);
            }
        }
        drop(guard);

        if produced > 0 {
            let bytes = f32_slice_to_le_bytes(&period_buf[..produced * CHANNELS]);
            let written = producer.write(&bytes);
            if written < bytes.len() {
                log::warn!("ring overrun: wrote {written} of {} bytes", bytes.len());
            }
        }

        if produced == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

fn f32_slice_to_le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * std::mem::size_of::<f32>());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
