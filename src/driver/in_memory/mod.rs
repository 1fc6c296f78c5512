//! Reference driver (C11): an in-process transport with no external
//! dependencies, suitable for tests and single-process deployments.
//!
//! Grounded in the original's `glocal` package. Partitions are created
//! lazily on first publish; delivery is driven by a scheduler notification
//! per publish, but the handler always reads whatever is *currently* the
//! partition's last message rather than draining a queue in order. Two
//! publishes to the same topic in quick succession can therefore both
//! resolve to the same (later) message by the time their notifications are
//! serviced, and the earlier message is never delivered on its own. This is
//! the original's documented behavior, not a bug introduced here — callers
//! needing ordered, exactly-once-per-message delivery should reach for the
//! pull-loop or Kafka-strategy drivers instead.

mod partition;
mod partition_registry;
mod scheduler;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::envelope::Envelope;
use crate::error::Result;
use crate::handler::InternalHandler;

use self::partition_registry::PartitionRegistry;
use self::scheduler::Scheduler;

pub use self::partition::Partition;

/// Recognized in-memory driver options (§6). `is_durable` is accepted for
/// config-surface parity with the other drivers but has no effect on this
/// reference implementation — it is reserved for an on-disk variant that
/// does not exist in this core.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryConfig {
    pub is_durable: bool,
}

/// The in-memory reference [`super::Driver`].
pub struct InMemoryDriver {
    registry: Arc<PartitionRegistry>,
    scheduler: Arc<Scheduler>,
    receiver: Mutex<Option<tokio::sync::mpsc::Receiver<String>>>,
    handler: RwLock<Option<Arc<InternalHandler>>>,
    config: InMemoryConfig,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::with_config(InMemoryConfig::default())
    }

    /// Construct with explicit options. `config.is_durable` is recognized
    /// but ignored by this reference driver (see [`InMemoryConfig`]).
    pub fn with_config(config: InMemoryConfig) -> Self {
        let (scheduler, receiver) = Scheduler::new();
        Self {
            registry: Arc::new(PartitionRegistry::new()),
            scheduler: Arc::new(scheduler),
            receiver: Mutex::new(Some(receiver)),
            handler: RwLock::new(None),
            config,
        }
    }

    /// The options this driver was constructed with.
    pub fn config(&self) -> InMemoryConfig {
        self.config
    }

    /// Number of messages ever pushed to `topic`'s partition. `0` if the
    /// topic has never been published to.
    pub async fn partition_len(&self, topic: &str) -> usize {
        match self.registry.get(topic).await {
            Some(partition) => partition.len().await,
            None => 0,
        }
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Driver for InMemoryDriver {
    fn set_internal_handler(&self, handler: Arc<InternalHandler>) {
        // `try_write` is safe here: this is called once during bus
        // construction, before `start`, with no concurrent readers.
        if let Ok(mut slot) = self.handler.try_write() {
            *slot = Some(handler);
        }
    }

    async fn start(&self) -> Result<()> {
        let mut receiver = match self.receiver.lock().await.take() {
            Some(receiver) => receiver,
            None => return Ok(()), // already started
        };
        let registry = self.registry.clone();
        let handler = self.handler.read().await.clone();

        tokio::spawn(async move {
            while let Some(topic) = receiver.recv().await {
                let registry = registry.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let Some(partition) = registry.get(&topic).await else {
                        return;
                    };
                    let Some(message) = partition.last_message().await else {
                        return;
                    };
                    if let Some(handler) = handler {
                        let _ = handler.handle(message).await;
                    }
                });
            }
        });
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.scheduler.close().await;
        Ok(())
    }

    async fn publish(&self, topic: &str, envelope: Envelope) -> Result<()> {
        let partition = self.registry.get_or_create(topic).await;
        partition.push(envelope).await;
        self.scheduler.notify(topic.to_string()).await
    }

    async fn subscribe(&self, _topic: &str) -> Result<()> {
        // Partitions are created lazily on first publish; nothing to
        // provision ahead of time.
        Ok(())
    }
}
