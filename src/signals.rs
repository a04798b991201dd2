use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;

use crate::engine::EngineSignals;

/// Runs the signal-dispatch thread described by the concurrency model: blocks
/// the process's handled signals on this thread only, then fans each one out
/// by semantic unit as it arrives. Synchronous crash signals (SIGSEGV,
/// SIGBUS, SIGILL, SIGFPE, SIGABRT) are deliberately not registered here, so
/// they keep their default delivery to the faulting thread.
///
/// Runs until a termination signal is delivered, at which point the engine is
/// told to stop and this thread returns.
pub fn run_signal_dispatch(signals_handle: Arc<EngineSignals>) -> Result<(), std::io::Error> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1, SIGUSR2])?;
    for signal in &mut signals {
        match signal {
            SIGINT | SIGTERM => {
                log::info!("received termination signal, stopping");
                signals_handle.request_stop();
                break;
            }
            SIGUSR1 => {
                log::info!("received SIGUSR1, pausing");
                signals_handle.request_pause();
            }
            SIGUSR2 => {
                log::info!("received SIGUSR2, resuming");
                signals_handle.request_resume();
            }
            other => log::debug!("ignoring unexpected signal {other}"),
        }
    }
    Ok(())
}
