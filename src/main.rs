// TODO - read the GPU temperature on machines without thinkpad_hwmon (amdgpu/nouveau hwmon)

mod config;
mod error;
mod hwmon;
mod keyvalue;
mod monitor;
mod sensors;
mod source;
mod util;
mod warning;

#[cfg(test)]
mod test_utils;

use config::{SetupFile, Settings};
use error::Result;
use log::LevelFilter;
use monitor::Monitor;
use source::Prober;
use std::{
    io::{self, BufRead as _},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Instant,
};
use warning::Warning;

const VERSION: &str = "0.1.0";

enum Event {
    /// A line on stdin: reload the setup file and refresh now
    Click,
    Stop,
}

fn main() -> Result<()> {
    let rust_log = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace")).init();
    apply_debug_level(rust_log, 0);

    log::info!("Starting ({})...", VERSION);

    let mut settings = Settings::default();
    let mut setup = SetupFile::new(config::setup_path(std::env::args_os().nth(1)));
    setup.load(&mut settings);
    apply_debug_level(rust_log, settings.debug);

    let sources = Prober::new("/")?.resolve()?;
    log::info!(
        "cpu source {:?}, ssd source {:?}",
        sources.source(),
        sources.ssd_source()
    );
    log::debug!(
        "probed {:?}, dir {:?}, core mask {:#x}",
        sources.tried(),
        sources.dir(),
        sources.core_mask()
    );
    let mut monitor = Monitor::new(sources, Warning);

    let (tx, rx) = mpsc::channel();
    let stop_tx = tx.clone();
    ctrlc::set_handler(move || {
        log::info!("stopping...");
        let _ = stop_tx.send(Event::Stop);
    })?;

    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if line.is_err() || tx.send(Event::Click).is_err() {
                return;
            }
        }
        log::debug!("stdin closed, clicks disabled");
    });

    show(&monitor.poll(&settings, Instant::now(), true).label);
    let mut next_tick = Instant::now() + settings.poll_period();

    // main loop
    loop {
        let force = match rx.recv_timeout(next_tick.saturating_duration_since(Instant::now())) {
            Ok(Event::Stop) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
            Ok(Event::Click) => {
                let last_interval = settings.poll_interval;
                setup.load(&mut settings);
                apply_debug_level(rust_log, settings.debug);
                if settings.poll_interval != last_interval {
                    log::debug!(
                        "Resetting timer from {} to {} seconds.",
                        last_interval,
                        settings.poll_interval
                    );
                    next_tick = Instant::now() + settings.poll_period();
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                if setup.reload_if_changed(&mut settings, now) {
                    log::debug!("reloaded {}", setup.path().display());
                    apply_debug_level(rust_log, settings.debug);
                }
                next_tick = now + settings.poll_period();
                false
            }
        };

        let state = monitor.poll(&settings, Instant::now(), force);
        if state.changed {
            show(&state.label);
        }
    }
}

fn show(label: &str) {
    println!("{}", label);
}

/// `RUST_LOG` wins; otherwise the setup file's debug level picks the verbosity
fn apply_debug_level(rust_log: bool, debug: i32) {
    if rust_log {
        return;
    }
    log::set_max_level(match debug {
        i32::MIN..=0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });
}
