//! Chain-of-responsibility middleware (C8) for both sides of the bus.
//!
//! Each middleware is a decorator: given the next step in the chain, it
//! returns a new step that may run logic before/after calling `next`, or
//! skip calling it entirely to short-circuit. Middlewares are composed in
//! registration order with the first-registered ending up outermost, so it
//! sees a message before anything registered after it, matching the
//! original's publisher/consumer middleware ordering.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::MessageContext;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::subscriber::MessageHandler;

/// One step of the publish pipeline: send `envelope` onward (to the next
/// middleware, and eventually the driver).
pub type PublishStep = Arc<dyn Fn(Envelope) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Decorates the publish path. Implementations typically call `next` with a
/// (possibly mutated) envelope; returning without calling `next` drops the
/// message silently, which is how an idempotency filter would short-circuit.
pub trait PublisherMiddleware: Send + Sync {
    fn wrap(&self, next: PublishStep) -> PublishStep;
}

/// Decorates the consume path, wrapping the eventual subscriber handler.
pub trait ConsumerMiddleware: Send + Sync {
    fn wrap(&self, next: Arc<dyn MessageHandler>) -> Arc<dyn MessageHandler>;
}

/// Compose publisher middlewares around `base`. `middlewares[0]` ends up
/// outermost: it runs first and decides whether anything after it runs.
pub fn compose_publisher(middlewares: &[Arc<dyn PublisherMiddleware>], base: PublishStep) -> PublishStep {
    middlewares
        .iter()
        .rev()
        .fold(base, |next, middleware| middleware.wrap(next))
}

/// Compose consumer middlewares around `base`, with the same outermost-first
/// ordering as [`compose_publisher`].
pub fn compose_consumer(
    middlewares: &[Arc<dyn ConsumerMiddleware>],
    base: Arc<dyn MessageHandler>,
) -> Arc<dyn MessageHandler> {
    middlewares
        .iter()
        .rev()
        .fold(base, |next, middleware| middleware.wrap(next))
}
