//! Subscriber registration (C5) and resiliency configuration.
//!
//! A [`Subscriber`] binds a topic (optionally scoped to a consumer group) to
//! a [`MessageHandler`], plus the retry/DLQ fields the original carries on
//! its `Consumer` entries (`consumer.go`, `entry.go`): bounded retries with
//! exponential backoff before a message is routed to a retry topic or, once
//! exhausted, a dead-letter topic.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::context::MessageContext;
use crate::envelope::Envelope;
use crate::error::Result;

/// Default number of redelivery attempts before a message is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default floor of the retry backoff curve.
pub const DEFAULT_MIN_RETRY_BACKOFF: Duration = Duration::from_millis(500);
/// Default ceiling of the retry backoff curve.
pub const DEFAULT_MAX_RETRY_BACKOFF: Duration = Duration::from_secs(15);

/// Handles one delivered message. `Err` triggers the retry/DLQ path; `Ok`
/// acknowledges it to the driver.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, envelope: Envelope, ctx: MessageContext) -> BoxFuture<'static, Result<()>>;
}

impl<F> MessageHandler for F
where
    F: Fn(Envelope, MessageContext) -> BoxFuture<'static, Result<()>> + Send + Sync,
{
    fn handle(&self, envelope: Envelope, ctx: MessageContext) -> BoxFuture<'static, Result<()>> {
        self(envelope, ctx)
    }
}

/// Resiliency policy applied to redeliveries of a failed message.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retry_topic: Option<String>,
    pub dead_letter_queue_topic: Option<String>,
    pub max_retries: u32,
    pub min_retry_backoff: Duration,
    pub max_retry_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_topic: None,
            dead_letter_queue_topic: None,
            max_retries: DEFAULT_MAX_RETRIES,
            min_retry_backoff: DEFAULT_MIN_RETRY_BACKOFF,
            max_retry_backoff: DEFAULT_MAX_RETRY_BACKOFF,
        }
    }
}

/// One subscription: topic, optional consumer group, handler, the
/// retry policy applied when the handler errors, and an opaque
/// per-subscriber driver config (§3 "Subscriber": "`driver_config`
/// (opaque to core, typed by driver)").
pub struct Subscriber {
    pub(crate) topic: String,
    pub(crate) group: Option<String>,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) driver_config: Option<Arc<dyn Any + Send + Sync>>,
}

impl Subscriber {
    pub fn builder(topic: impl Into<String>, handler: Arc<dyn MessageHandler>) -> SubscriberBuilder {
        SubscriberBuilder {
            topic: topic.into(),
            group: None,
            handler,
            retry_policy: RetryPolicy::default(),
            driver_config: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn handler(&self) -> &Arc<dyn MessageHandler> {
        &self.handler
    }

    /// The per-subscriber driver config, if one was set, downcast to the
    /// concrete type a specific driver expects (e.g. a pull-loop driver's
    /// queue URL override, or a Kafka driver's `partition_id`). Core code
    /// never inspects the contents; only the driver that receives this
    /// subscriber via [`crate::driver::Driver::subscribe`] knows the
    /// concrete type to downcast to.
    pub fn driver_config<T: 'static>(&self) -> Option<&T> {
        self.driver_config.as_deref()?.downcast_ref::<T>()
    }
}

pub struct SubscriberBuilder {
    topic: String,
    group: Option<String>,
    handler: Arc<dyn MessageHandler>,
    retry_policy: RetryPolicy,
    driver_config: Option<Arc<dyn Any + Send + Sync>>,
}

impl SubscriberBuilder {
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn retry_topic(mut self, topic: impl Into<String>) -> Self {
        self.retry_policy.retry_topic = Some(topic.into());
        self
    }

    pub fn dead_letter_queue_topic(mut self, topic: impl Into<String>) -> Self {
        self.retry_policy.dead_letter_queue_topic = Some(topic.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry_policy.max_retries = max_retries;
        self
    }

    pub fn min_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_policy.min_retry_backoff = backoff;
        self
    }

    pub fn max_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_policy.max_retry_backoff = backoff;
        self
    }

    /// Attach an opaque, driver-typed config value to this subscription.
    /// The core never reads it; a driver that needs per-subscriber options
    /// (a pull-loop queue override, a Kafka partition/offset pair) reads it
    /// back via [`Subscriber::driver_config`] with its own concrete type.
    pub fn driver_config<T: Send + Sync + 'static>(mut self, config: T) -> Self {
        self.driver_config = Some(Arc::new(config));
        self
    }

    pub fn build(self) -> Subscriber {
        Subscriber {
            topic: self.topic,
            group: self.group,
            handler: self.handler,
            retry_policy: self.retry_policy,
            driver_config: self.driver_config,
        }
    }
}

/// Topic-indexed collection of subscribers. Multiple subscribers per topic
/// fan out to every one of them (broadcast delivery), matching the
/// in-memory driver's partition subscriber lists.
#[derive(Default)]
pub struct SubscriberRegistry {
    by_topic: tokio::sync::RwLock<std::collections::HashMap<String, Vec<Arc<Subscriber>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, subscriber: Subscriber) {
        let mut registry = self.by_topic.write().await;
        registry
            .entry(subscriber.topic.clone())
            .or_default()
            .push(Arc::new(subscriber));
    }

    pub async fn subscribers_for(&self, topic: &str) -> Vec<Arc<Subscriber>> {
        let registry = self.by_topic.read().await;
        registry.get(topic).cloned().unwrap_or_default()
    }

    pub async fn topics(&self) -> Vec<String> {
        let registry = self.by_topic.read().await;
        registry.keys().cloned().collect()
    }
}
