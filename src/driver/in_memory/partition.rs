//! Per-topic message buffer for the in-memory driver.
//!
//! Grounded in the original's `glocal.partition`: an append-only queue plus
//! a standalone `last_message` slot. The scheduler only ever delivers from
//! `last_message`, never drains `queue` — the queue exists purely as an
//! inspectable history (`len`), matching the original's unused-in-delivery
//! `totalMessages`/`queue` fields. A per-group offset map has no consumer
//! here: delivery is broadcast-to-every-subscriber via the scheduler, not a
//! per-group pull cursor over `queue`, so there is nothing for an offset to
//! index into. Drivers that need real per-group cursors (Kafka consumer
//! groups, SQS visibility timeouts) track them in their own strategy/config
//! types instead — see [`crate::driver::kafka_strategy`].

use tokio::sync::Mutex;

use crate::envelope::Envelope;

#[derive(Default)]
pub struct Partition {
    queue: Mutex<Vec<Envelope>>,
    last_message: Mutex<Option<Envelope>>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, envelope: Envelope) {
        let mut last = self.last_message.lock().await;
        self.queue.lock().await.push(envelope.clone());
        *last = Some(envelope);
    }

    /// Snapshot of whatever was most recently pushed at the time of the
    /// call. Two concurrent pushes racing a single read here is the source
    /// of the driver's documented last-message-only delivery quirk.
    pub async fn last_message(&self) -> Option<Envelope> {
        self.last_message.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }
}
