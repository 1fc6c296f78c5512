//! Driver contract (C6): the pluggable transport a [`crate::bus::Bus`]
//! delegates actual delivery to.
//!
//! Mirrors the original `arch.Driver` interface almost verbatim
//! (`SetParentBus`, `SetInternalHandler`, `Start`, `Shutdown`, `Publish`,
//! `Subscribe`), translated to `async_trait` since Rust has no native async
//! trait methods prior to dyn-compatible `async fn`. Driver discovery is
//! call-site construction rather than a process-global `Register` map: a
//! driver is simply constructed and handed to [`crate::bus::BusBuilder`]
//! directly.

pub mod in_memory;
pub mod kafka_strategy;
pub mod pull_loop;

use std::sync::Arc;

use async_trait::async_trait;

use crate::envelope::Envelope;
use crate::error::Result;
use crate::handler::InternalHandler;

/// Transport plugged into a [`crate::bus::Bus`]. One instance is owned by
/// exactly one bus.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Bind the internal handler the driver invokes for every decoded
    /// inbound envelope. Called once, before [`Driver::start`].
    fn set_internal_handler(&self, handler: Arc<InternalHandler>);

    /// Begin consuming. Drivers that need a background polling loop spawn
    /// it here; drivers with nothing to poll (push-only) may no-op.
    async fn start(&self) -> Result<()>;

    /// Stop consuming and release resources. Idempotent: a second call
    /// after a clean shutdown is a no-op, not an error.
    async fn shutdown(&self) -> Result<()>;

    /// Route `envelope` onto `topic`.
    async fn publish(&self, topic: &str, envelope: Envelope) -> Result<()>;

    /// Register interest in `topic`. For driver families where subscription
    /// is implicit (the in-memory driver creates partitions lazily on first
    /// publish), this may be a no-op; for pull-loop/Kafka-style drivers it
    /// provisions the underlying queue/consumer-group binding.
    async fn subscribe(&self, topic: &str) -> Result<()>;
}
