//! Notification channel driving delivery in the in-memory driver.
//!
//! Grounded in the original's `glocal.scheduler`: an unbuffered channel of
//! topic names that `Publish` sends on and `Start`'s loop receives from.
//! Go's unbuffered channel is a true zero-capacity rendezvous; `tokio::mpsc`
//! has no zero-capacity option, so this uses the smallest available buffer
//! (`1`). The capacity is not what produces the documented last-message-only
//! delivery behavior — that comes from [`super::partition::Partition`]
//! always being read at delivery time rather than drained in order — so the
//! size-1 approximation preserves the same externally observable quirk.

use tokio::sync::{mpsc, Mutex};

use crate::error::{Error, Result};

pub struct Scheduler {
    sender: Mutex<Option<mpsc::Sender<String>>>,
}

impl Scheduler {
    /// Construct a scheduler and the receiver its `start` loop will drain.
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Notify the scheduler that `topic` has a new last message. Blocks
    /// until the consuming loop has room, mirroring the original's
    /// rendezvous-channel send.
    pub async fn notify(&self, topic: String) -> Result<()> {
        let sender = {
            let guard = self.sender.lock().await;
            guard.clone()
        };
        match sender {
            Some(sender) => sender.send(topic).await.map_err(|_| Error::bus_closed()),
            None => Err(Error::bus_closed()),
        }
    }

    /// Close the channel. The receiving loop observes `recv() == None` once
    /// all already-sent notifications drain, then exits. Idempotent.
    pub async fn close(&self) {
        self.sender.lock().await.take();
    }
}
