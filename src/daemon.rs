//! Periodic re-checking until a termination signal arrives.
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::Result;

/// Forward SIGINT and SIGTERM to the returned channel.
///
/// Must be called before the first batch so a signal during it is not lost.
pub fn install_signal_handler() -> Result<Receiver<i32>> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            for sig in signals.forever() {
                if tx.send(sig).is_err() {
                    break;
                }
            }
        })?;

    Ok(rx)
}

/// Call `tick` every `interval` until a signal is received or the channel
/// closes. Returns the number of ticks run.
///
/// The first batch is the caller's business; this only waits for the next.
/// A signal delivered while `tick` runs ends the loop once it returns.
pub fn run<F: FnMut()>(interval: Duration, signals: &Receiver<i32>, mut tick: F) -> u64 {
    info!(
        "Running in daemon mode, checking every {} days",
        interval.as_secs() / (24 * 60 * 60)
    );
    let mut ticks = 0;
    loop {
        match signals.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                info!("Running scheduled certificate check");
                tick();
                ticks += 1;
            }
            Ok(sig) => {
                info!("Received signal {}, shutting down", signal_name(sig));
                return ticks;
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!("Signal channel closed, shutting down");
                return ticks;
            }
        }
    }
}

fn signal_name(sig: i32) -> String {
    match sig {
        SIGINT => "SIGINT".into(),
        SIGTERM => "SIGTERM".into(),
        _ => sig.to_string(),
    }
}
