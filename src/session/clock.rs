//! Fixed-interval tick source backed by a tokio task

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Periodic clock that calls a handler on every tick until cancelled
///
/// The first tick fires one interval after `start`. Dropping the clock
/// cancels it.
#[derive(Debug)]
pub struct Clock {
    handle: JoinHandle<()>,
}

impl Clock {
    /// Start ticking every `period`
    ///
    /// The handler runs on the clock task; returning `ControlFlow::Break`
    /// ends the loop. Must be called from within a tokio runtime.
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if on_tick().is_break() {
                    break;
                }
            }
        });

        Self { handle }
    }

    /// Stop ticking. The handler is not called again once this returns,
    /// unless it is executing right now on another worker thread.
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
