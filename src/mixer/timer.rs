// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Periodic tick source driving a frame generator.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Receiver of timer ticks.
pub trait TimeoutSink: Send + Sync {
    /// Called once per period on the timer thread.
    fn on_timeout(&self);
}

/// Thread-backed periodic timer.
///
/// Deadlines advance by whole periods so the cadence does not drift with
/// per-tick jitter; when a tick overruns its period the schedule is re-based
/// instead of bursting the missed ticks.
#[derive(Debug)]
pub struct JobTimer {
    stop: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl JobTimer {
    /// Spawn the timer thread at `frequency` ticks per second.
    ///
    /// # Errors
    ///
    /// This can fail if the timer thread cannot be spawned.
    pub fn start(frequency: u32, sink: Arc<dyn TimeoutSink>) -> Result<Self> {
        let (stop, stop_receiver) = mpsc::channel::<()>();
        let period = Duration::from_secs(1) / frequency.max(1);

        let handle = std::thread::Builder::new()
            .name(format!("job-timer-{frequency}hz"))
            .spawn(move || {
                let mut deadline = Instant::now() + period;
                loop {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match stop_receiver.recv_timeout(wait) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            sink.on_timeout();
                            deadline += period;
                            let now = Instant::now();
                            if deadline < now {
                                deadline = now + period;
                            }
                        }
                    }
                }
            })
            .context("unable to spawn timer thread")?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the timer and wait for the thread to exit.
    ///
    /// No tick is delivered after this returns.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.send(()).ok();
            if handle.join().is_err() {
                error!("timer thread panicked");
            }
        }
    }
}

impl Drop for JobTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
