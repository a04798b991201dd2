use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use playoutd::engine::Engine;
use playoutd::errors::EngineError;
use playoutd::status::run_status_server;

/// Unattended radio-broadcast audio player: renders a weekly, time-zoned
/// playlist schedule to the system's default audio output.
#[derive(Parser, Debug)]
#[command(name = "playoutd")]
#[command(about = "Unattended radio-broadcast audio player")]
#[command(version)]
struct Args {
    /// Log verbosity: 0=silent, 1=error, 2=warn, 3=info, 4=debug.
    #[arg(short = 'd', long = "debug-level", default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=4))]
    debug_level: u8,

    /// Hex debug-facility bitmask, accepted for compatibility with the
    /// station's existing operational tooling. Not currently wired to any
    /// per-facility filtering; the whole process logs at `-d`'s level.
    #[arg(short = 'm', long = "debug-mask", value_parser = parse_hex_mask, default_value = "0")]
    debug_mask: u32,

    /// TCP port for the "now playing" status endpoint.
    #[arg(short = 'p', long = "port", default_value_t = 9670)]
    port: u16,

    /// Path to the XML weekly schedule.
    schedule: PathBuf,
}

fn parse_hex_mask(s: &str) -> Result<u32, String> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(trimmed, 16).map_err(|e| format!("'{s}' is not a hex bitmask: {e}"))
}

fn level_filter(level: u8) -> log::LevelFilter {
    match level {
        0 => log::LevelFilter::Off,
        1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(level_filter(args.debug_level))
        .init();
    log::debug!("debug-facility mask: {:#x}", args.debug_mask);

    let engine = match Engine::new(&args.schedule) {
        Ok(engine) => engine,
        Err(err) => return exit_for_engine_error(&err),
    };

    let server = match tiny_http::Server::http(("0.0.0.0", args.port)) {
        Ok(server) => server,
        Err(err) => {
            log::error!("status endpoint failed to bind port {}: {err}", args.port);
            return ExitCode::from(3);
        }
    };

    let status = engine.status();
    std::thread::Builder::new()
        .name("status-endpoint".into())
        .spawn(move || run_status_server(server, status, playoutd::ring::OUTPUT_SAMPLE_RATE))
        .expect("failed to spawn status endpoint thread");

    let signals = engine.signals();
    let signal_handle = std::thread::Builder::new()
        .name("signal-dispatch".into())
        .spawn(move || playoutd::signals::run_signal_dispatch(signals))
        .expect("failed to spawn signal dispatch thread");

    engine.start();
    log::info!("playoutd started, serving status on port {}", args.port);

    if let Err(err) = signal_handle.join() {
        log::error!("signal dispatch thread panicked: {err:?}");
    }

    engine.stop_and_join();
    log::info!("playoutd stopped");
    ExitCode::SUCCESS
}

fn exit_for_engine_error(err: &EngineError) -> ExitCode {
    log::error!("failed to start playoutd: {err}");
    let code = match err {
        EngineError::Config(_) | EngineError::Scheduler(_) | EngineError::Worker(_) => 1,
        EngineError::Output(_) => 2,
    };
    ExitCode::from(code)
}
