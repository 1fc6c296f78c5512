//! Internal handler (C7): the single entry point a driver calls once it has
//! decoded a wire message into an [`Envelope`].
//!
//! Fan-out to every subscriber on the envelope's topic, each wrapped in the
//! bus's consumer middleware chain. A driver that wants per-subscriber
//! ack/nack semantics (the pull-loop family) inspects the returned
//! `Vec<Result<()>>` itself; drivers that only need one verdict for the
//! whole delivery (broadcast-style, like the in-memory driver) fold it with
//! [`InternalHandler::handle_one`].

use std::sync::Arc;

use tracing::{info_span, Instrument};

use crate::context::MessageContext;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::middleware::{compose_consumer, ConsumerMiddleware};
use crate::subscriber::SubscriberRegistry;

/// Binds a [`SubscriberRegistry`] and the consumer middleware chain into the
/// single callable a driver invokes per decoded envelope.
pub struct InternalHandler {
    subscribers: Arc<SubscriberRegistry>,
    middlewares: Vec<Arc<dyn ConsumerMiddleware>>,
}

impl InternalHandler {
    pub fn new(subscribers: Arc<SubscriberRegistry>, middlewares: Vec<Arc<dyn ConsumerMiddleware>>) -> Self {
        Self {
            subscribers,
            middlewares,
        }
    }

    /// Deliver `envelope` to every subscriber registered on its topic,
    /// running each through the consumer middleware chain. Returns one
    /// result per matching subscriber, in registration order.
    pub async fn handle(&self, envelope: Envelope) -> Vec<Result<()>> {
        let topic = envelope.topic().unwrap_or_default().to_string();
        let subscribers = self.subscribers.subscribers_for(&topic).await;
        let ctx = MessageContext::from_envelope(&envelope);

        let mut results = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let composed = compose_consumer(&self.middlewares, subscriber.handler().clone());
            let span = info_span!("driver.consume", topic = %topic, message_id = %envelope.id(), correlation_id = ctx.correlation_id().unwrap_or_default());
            let result = composed
                .handle(envelope.clone(), ctx.clone())
                .instrument(span)
                .await;
            results.push(result);
        }
        results
    }

    /// Convenience for single-subscriber delivery paths (pull-loop drivers):
    /// deliver and fold all results into one, erroring if any subscriber
    /// failed or if nothing was subscribed to the topic.
    pub async fn handle_one(&self, envelope: Envelope) -> Result<()> {
        let results = self.handle(envelope).await;
        for result in results {
            result?;
        }
        Ok(())
    }
}
