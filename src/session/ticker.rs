//! Fixed-cadence trigger.
//!
//! Fires on wall-clock multiples of the interval regardless of how long each
//! callback takes; a late callback is followed by the next scheduled tick, not
//! a burst of catch-up ticks.

use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub struct Ticker {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<F>(name: &str, interval: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Err(anyhow!("ticker interval must be greater than zero"));
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                loop {
                    let wait = next.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            on_tick();
                            let now = Instant::now();
                            next += interval;
                            while next <= now {
                                next += interval;
                            }
                        }
                        // explicit stop or handle dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .context("spawn ticker thread")?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    /// Stop ticking and wait for the thread to exit. Must not be called from
    /// inside the tick callback.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.thread().id() == std::thread::current().id() {
                return;
            }
            if join.join().is_err() {
                log::error!("ticker thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
