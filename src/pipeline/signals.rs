//! Pause and teardown signalling
//!
//! One handle shared by every stage of a session. Pause is a watch
//! channel the gated stages wait on; teardown is a cancellation token
//! checked at every blocking point, so no stage ever needs a receive
//! timeout just to notice the session ended.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct SessionSignals {
    cancel: CancellationToken,
    pause_tx: watch::Sender<bool>,
}

impl SessionSignals {
    /// Create a signal handle; `paused` sets the initial gate state.
    pub fn new(paused: bool) -> Self {
        let (pause_tx, _) = watch::channel(paused);
        Self {
            cancel: CancellationToken::new(),
            pause_tx,
        }
    }

    pub fn pause(&self) {
        self.pause_tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.pause_tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }

    /// End the session: unblocks every waiter, including paused stages.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the session is torn down.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Block while the session is paused.
    ///
    /// Returns `true` once the gate is open, `false` if the session was
    /// cancelled while waiting.
    pub async fn wait_resumed(&self) -> bool {
        let mut rx = self.pause_tx.subscribe();
        loop {
            if self.is_cancelled() {
                return false;
            }
            if !*rx.borrow_and_update() {
                return true;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

impl Default for SessionSignals {
    fn default() -> Self {
        Self::new(false)
    }
}
