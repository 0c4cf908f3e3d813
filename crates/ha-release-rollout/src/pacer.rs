//! Cancellable fixed-interval waits.
//!
//! The controller blocks in exactly two places: polling the capacity gate
//! and settling after a termination. Both go through a [`Pacer`], which
//! races the timer against the shutdown signal so a run can stop between
//! steps without shortening the interval when nobody asks it to stop.

use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Elapsed,
    Cancelled,
}

/// Sleeps that end early when shutdown is signalled.
#[derive(Debug)]
pub struct Pacer {
    shutdown: watch::Receiver<bool>,
    /// False once the sender is gone; no signal can arrive after that.
    live: bool,
}

impl Pacer {
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            shutdown,
            live: true,
        }
    }

    /// A pacer nobody can cancel.
    pub fn uncancellable() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx)
    }

    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep for `interval` unless shutdown is requested first.
    pub async fn wait(&mut self, interval: Duration) -> Wait {
        if self.is_cancelled() {
            return Wait::Cancelled;
        }

        let sleep = tokio::time::sleep(interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Wait::Elapsed,
                changed = self.shutdown.changed(), if self.live => match changed {
                    Ok(()) if *self.shutdown.borrow_and_update() => {
                        debug!("wait cancelled by shutdown signal");
                        return Wait::Cancelled;
                    }
                    Ok(()) => {}
                    Err(_) => self.live = false,
                },
            }
        }
    }
}
