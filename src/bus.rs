//! Bus Facade (C9): the composition root applications talk to.
//!
//! Binds the schema registry, subscriber registry, marshaler, id factory,
//! middleware chains and a single [`Driver`] into the public API described
//! in §6's "Public Bus API" table, and enforces the state machine from
//! §4.12: `Constructed → Listening → ShuttingDown → Closed`.
//!
//! Per the "Global driver table" design note, driver discovery here is
//! construction-time (design note option (a)): a driver is built by the
//! caller and handed to [`BusBuilder::new`] directly, rather than resolved
//! from a process-wide name registry — `new_bus(driver_name, …)`'s
//! "panic if driver unknown" contract has no analogue because there is no
//! name to look up.

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use futures::future::BoxFuture;
use tracing::{info_span, Instrument};

use crate::config::BusConfig;
use crate::context::MessageContext;
use crate::driver::Driver;
use crate::envelope::Envelope;
use crate::error::{BulkError, Error, Result};
use crate::external_schema::ExternalSchemaRegistry;
use crate::handler::InternalHandler;
use crate::id::{IdFactory, UuidIdFactory};
use crate::marshaler::{JsonMarshaler, Marshaler};
use crate::message::{build_headers, Message};
use crate::middleware::{compose_publisher, ConsumerMiddleware, PublishStep, PublisherMiddleware};
use crate::schema_registry::{MessageMetadata, SchemaRegistry};
use crate::subscriber::{MessageHandler, Subscriber, SubscriberBuilder, SubscriberRegistry};

const STATE_CONSTRUCTED: u8 = 0;
const STATE_LISTENING: u8 = 1;
const STATE_SHUTTING_DOWN: u8 = 2;
const STATE_CLOSED: u8 = 3;

/// Transport-agnostic message bus. Construct with [`Bus::builder`].
pub struct Bus {
    driver: Arc<dyn Driver>,
    marshaler: Arc<dyn Marshaler>,
    external_registry: Option<Arc<dyn ExternalSchemaRegistry>>,
    id_factory: Arc<dyn IdFactory>,
    config: BusConfig,
    schema_registry: Arc<SchemaRegistry>,
    subscriber_registry: Arc<SubscriberRegistry>,
    publisher_middlewares: Vec<Arc<dyn PublisherMiddleware>>,
    consumer_middlewares: Vec<Arc<dyn ConsumerMiddleware>>,
    state: AtomicU8,
}

/// Builds a [`Bus`] around a concrete [`Driver`].
pub struct BusBuilder {
    driver: Arc<dyn Driver>,
    marshaler: Arc<dyn Marshaler>,
    external_registry: Option<Arc<dyn ExternalSchemaRegistry>>,
    id_factory: Arc<dyn IdFactory>,
    config: BusConfig,
    publisher_middlewares: Vec<Arc<dyn PublisherMiddleware>>,
    consumer_middlewares: Vec<Arc<dyn ConsumerMiddleware>>,
}

impl BusBuilder {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            marshaler: Arc::new(JsonMarshaler),
            external_registry: None,
            id_factory: Arc::new(UuidIdFactory),
            config: BusConfig::default(),
            publisher_middlewares: Vec::new(),
            consumer_middlewares: Vec::new(),
        }
    }

    pub fn marshaler(mut self, marshaler: Arc<dyn Marshaler>) -> Self {
        self.marshaler = marshaler;
        self
    }

    pub fn external_schema_registry(mut self, registry: Arc<dyn ExternalSchemaRegistry>) -> Self {
        self.external_registry = Some(registry);
        self
    }

    pub fn id_factory(mut self, factory: Arc<dyn IdFactory>) -> Self {
        self.id_factory = factory;
        self
    }

    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn publisher_middleware(mut self, middleware: Arc<dyn PublisherMiddleware>) -> Self {
        self.publisher_middlewares.push(middleware);
        self
    }

    pub fn consumer_middleware(mut self, middleware: Arc<dyn ConsumerMiddleware>) -> Self {
        self.consumer_middlewares.push(middleware);
        self
    }

    pub fn build(self) -> Bus {
        Bus {
            driver: self.driver,
            marshaler: self.marshaler,
            external_registry: self.external_registry,
            id_factory: self.id_factory,
            config: self.config,
            schema_registry: Arc::new(SchemaRegistry::new()),
            subscriber_registry: Arc::new(SubscriberRegistry::new()),
            publisher_middlewares: self.publisher_middlewares,
            consumer_middlewares: self.consumer_middlewares,
            state: AtomicU8::new(STATE_CONSTRUCTED),
        }
    }
}

impl Bus {
    pub fn builder(driver: Arc<dyn Driver>) -> BusBuilder {
        BusBuilder::new(driver)
    }

    /// Bind `T` to `metadata`. Re-registering the same type is a no-op.
    pub fn register_schema<T: 'static>(&self, metadata: MessageMetadata) {
        self.schema_registry.register::<T>(metadata);
    }

    /// Look up a registered type's metadata by the CloudEvents `type`/topic
    /// it was bound to.
    pub fn schema_metadata_by_topic(&self, topic: &str) -> Option<MessageMetadata> {
        self.schema_registry.get_by_topic(topic)
    }

    /// Look up a registered type's own metadata.
    pub fn schema_metadata<T: 'static>(&self) -> Result<MessageMetadata> {
        self.schema_registry.get::<T>()
    }

    /// Subscribe a typed handler to the topic `T` is registered under.
    pub fn subscribe<T, F>(&self, handler: F) -> Result<PendingSubscription<'_>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        F: Fn(Message<T>, MessageContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        let metadata = self.schema_registry.get::<T>()?;
        let schema_version = self.effective_schema_version(&metadata);
        let schema_name = (!metadata.schema_name.is_empty()).then_some(metadata.schema_name);
        Ok(self.pending_subscription::<T, F>(metadata.topic, schema_name, schema_version, handler))
    }

    /// Subscribe a typed handler directly to a raw topic, bypassing the
    /// schema registry (no schema-definition resolution at decode time).
    pub fn subscribe_topic<T, F>(&self, topic: impl Into<String>, handler: F) -> PendingSubscription<'_>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        F: Fn(Message<T>, MessageContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.pending_subscription::<T, F>(topic.into(), None, 0, handler)
    }

    fn pending_subscription<T, F>(
        &self,
        topic: String,
        schema_name: Option<String>,
        schema_version: u32,
        handler: F,
    ) -> PendingSubscription<'_>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        F: Fn(Message<T>, MessageContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        let group = Arc::new(std::sync::Mutex::new(None));
        let adapter: Arc<dyn MessageHandler> = Arc::new(TypedSubscriberAdapter {
            marshaler: self.marshaler.clone(),
            external_registry: self.external_registry.clone(),
            schema_name,
            schema_version,
            group: group.clone(),
            handler: Arc::new(handler),
            enable_logging: self.config.enable_logging,
            _marker: std::marker::PhantomData::<fn() -> T>,
        });
        PendingSubscription {
            bus: self,
            topic: topic.clone(),
            group,
            builder: Subscriber::builder(topic, adapter),
        }
    }

    pub async fn publish<T: Serialize>(&self, ctx: &MessageContext, value: &T) -> Result<()>
    where
        T: 'static,
    {
        let metadata = self.schema_registry.get::<T>()?;
        self.publish_with_metadata(ctx, metadata, value, None).await
    }

    pub async fn publish_with_topic<T: Serialize>(&self, ctx: &MessageContext, topic: &str, value: &T) -> Result<()> {
        let metadata = self
            .schema_registry
            .get_by_topic(topic)
            .ok_or_else(|| Error::topic_not_found(topic))?;
        self.publish_with_metadata(ctx, metadata, value, None).await
    }

    pub async fn publish_with_type<T: Serialize>(&self, ctx: &MessageContext, type_name: &str, value: &T) -> Result<()> {
        let metadata = self.schema_registry.get_by_key(type_name)?;
        self.publish_with_metadata(ctx, metadata, value, None).await
    }

    pub async fn publish_with_subject<T: Serialize>(
        &self,
        ctx: &MessageContext,
        value: &T,
        subject: impl Into<String>,
    ) -> Result<()>
    where
        T: 'static,
    {
        let metadata = self.schema_registry.get::<T>()?;
        self.publish_with_metadata(ctx, metadata, value, Some(subject.into())).await
    }

    /// Fan out `publish` over every value, aggregating all individual
    /// failures rather than stopping at the first.
    pub async fn publish_bulk<T: Serialize + 'static>(
        &self,
        ctx: &MessageContext,
        values: &[T],
    ) -> std::result::Result<(), BulkError> {
        let mut errors = Vec::new();
        for value in values {
            if let Err(e) = self.publish(ctx, value).await {
                errors.push(e);
            }
        }
        BulkError::new(errors).into_result()
    }

    /// Publish a prebuilt envelope, skipping metadata resolution and
    /// envelope construction (§4.9 variants).
    pub async fn publish_raw(&self, envelope: Envelope) -> Result<()> {
        self.ensure_open()?;
        let topic = envelope.topic().unwrap_or_default().to_string();
        self.publish_step(topic)(envelope).await
    }

    async fn publish_with_metadata<T: Serialize>(
        &self,
        ctx: &MessageContext,
        metadata: MessageMetadata,
        value: &T,
        subject: Option<String>,
    ) -> Result<()> {
        self.ensure_open()?;

        let id = self.id_factory.new_id()?;

        let schema_definition = self.resolve_schema_definition(&metadata).await?;

        let payload = serde_json::to_value(value).map_err(|e| Error::codec(e.to_string()).with_source(e))?;
        let data = self.marshaler.marshal(schema_definition.as_deref(), &payload)?;

        let mut builder = Envelope::builder(id.clone(), metadata.topic.clone(), metadata.source.clone())
            .data(self.marshaler.content_type().to_string(), data)
            .time(Utc::now())
            .topic(metadata.topic.clone());

        if let Some(data_schema) = self.data_schema_url(&metadata) {
            builder = builder.data_schema(data_schema);
        }
        if let Some(subject) = subject {
            builder = builder.subject(subject);
        }

        let derived = ctx.derive_for_publish(&id);
        if let Some(correlation_id) = derived.correlation_id() {
            builder = builder.correlation_id(correlation_id.to_string());
        }
        if let Some(causation_id) = derived.causation_id() {
            builder = builder.causation_id(causation_id.to_string());
        }

        let envelope = builder.build()?;
        let topic = metadata.topic.clone();
        let span = info_span!("driver.publish", topic = %topic, message_id = %id);
        let step = self.publish_step(topic);
        let result = step(envelope).instrument(span).await;
        if self.config.enable_logging {
            match &result {
                Ok(()) => tracing::info!(message_id = %id, "published message"),
                Err(e) => tracing::error!(message_id = %id, error = %e, "publish failed"),
            }
        }
        result
    }

    async fn resolve_schema_definition(&self, metadata: &MessageMetadata) -> Result<Option<String>> {
        match (&self.external_registry, metadata.schema_name.as_str()) {
            (Some(registry), name) if !name.is_empty() => {
                let version = self.effective_schema_version(metadata);
                Ok(Some(registry.get_schema_definition(name, version).await?))
            }
            _ => Ok(None),
        }
    }

    /// `schema_version == 0` means "use the bus-level major version"
    /// (§3, §6; original `arch/bus.go`'s `getSchemaVersion`).
    fn effective_schema_version(&self, metadata: &MessageMetadata) -> u32 {
        if metadata.schema_version != 0 {
            metadata.schema_version
        } else {
            self.config.major_version
        }
    }

    fn data_schema_url(&self, metadata: &MessageMetadata) -> Option<String> {
        let registry = self.external_registry.as_ref()?;
        if metadata.schema_name.is_empty() {
            return None;
        }
        Some(format!("{}{}", registry.get_base_location(), metadata.schema_name))
    }

    fn publish_step(&self, topic: String) -> PublishStep {
        let driver = self.driver.clone();
        let base: PublishStep = Arc::new(move |envelope: Envelope| {
            let driver = driver.clone();
            let topic = topic.clone();
            Box::pin(async move { driver.publish(&topic, envelope).await })
        });
        compose_publisher(&self.publisher_middlewares, base)
    }

    /// Start the driver and begin dispatching to subscribers. Legal only
    /// from `Constructed`.
    pub async fn listen_and_serve(&self) -> Result<()> {
        self.state
            .compare_exchange(STATE_CONSTRUCTED, STATE_LISTENING, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::bus_closed())?;

        let handler = Arc::new(InternalHandler::new(
            self.subscriber_registry.clone(),
            self.consumer_middlewares.clone(),
        ));
        self.driver.set_internal_handler(handler);
        self.driver.start().await
    }

    /// Stop cleanly. Legal only from `Listening`; a second call (or a call
    /// before `listen_and_serve`) returns `BusClosed` without side effects.
    pub async fn shutdown(&self) -> Result<()> {
        self.state
            .compare_exchange(STATE_LISTENING, STATE_SHUTTING_DOWN, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::bus_closed())?;
        let result = self.driver.shutdown().await;
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
        result
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state.load(Ordering::SeqCst) {
            STATE_CONSTRUCTED | STATE_LISTENING => Ok(()),
            _ => Err(Error::bus_closed()),
        }
    }
}

/// A subscription being built. Finish with [`PendingSubscription::register`]
/// to add it to the bus and provision it with the driver.
pub struct PendingSubscription<'a> {
    bus: &'a Bus,
    topic: String,
    group: Arc<std::sync::Mutex<Option<String>>>,
    builder: SubscriberBuilder,
}

impl<'a> PendingSubscription<'a> {
    pub fn group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        *self.group.lock().expect("subscription group lock poisoned") = Some(group.clone());
        self.builder = self.builder.group(group);
        self
    }

    pub fn retry_topic(mut self, topic: impl Into<String>) -> Self {
        self.builder = self.builder.retry_topic(topic);
        self
    }

    pub fn dead_letter_queue_topic(mut self, topic: impl Into<String>) -> Self {
        self.builder = self.builder.dead_letter_queue_topic(topic);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.builder = self.builder.max_retries(max_retries);
        self
    }

    pub fn min_retry_backoff(mut self, backoff: Duration) -> Self {
        self.builder = self.builder.min_retry_backoff(backoff);
        self
    }

    pub fn max_retry_backoff(mut self, backoff: Duration) -> Self {
        self.builder = self.builder.max_retry_backoff(backoff);
        self
    }

    /// Attach an opaque, driver-typed config value to this subscription
    /// (e.g. a Kafka partition/offset pair or a pull-loop queue override).
    /// The core never reads it back; only the driver this subscription is
    /// provisioned on does, via [`Subscriber::driver_config`].
    pub fn driver_config<T: Any + Send + Sync + 'static>(mut self, config: T) -> Self {
        self.builder = self.builder.driver_config(config);
        self
    }

    /// Register the subscription with the bus and provision it on the
    /// driver. Subscriptions registered before `listen_and_serve` start
    /// receiving as soon as the driver starts; those registered afterward
    /// start receiving as soon as the driver's `subscribe` provisions them.
    pub async fn register(self) -> Result<()> {
        self.bus.ensure_open()?;
        self.bus.driver.subscribe(&self.topic).await?;
        self.bus.subscriber_registry.add(self.builder.build()).await;
        Ok(())
    }
}

struct TypedSubscriberAdapter<T, F> {
    marshaler: Arc<dyn Marshaler>,
    external_registry: Option<Arc<dyn ExternalSchemaRegistry>>,
    schema_name: Option<String>,
    schema_version: u32,
    group: Arc<std::sync::Mutex<Option<String>>>,
    handler: Arc<F>,
    enable_logging: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> MessageHandler for TypedSubscriberAdapter<T, F>
where
    T: DeserializeOwned + Send + Sync + 'static,
    F: Fn(Message<T>, MessageContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
{
    fn handle(&self, envelope: Envelope, ctx: MessageContext) -> BoxFuture<'static, Result<()>> {
        let marshaler = self.marshaler.clone();
        let external_registry = self.external_registry.clone();
        let schema_name = self.schema_name.clone();
        let schema_version = self.schema_version;
        let group = self
            .group
            .lock()
            .expect("subscription group lock poisoned")
            .clone();
        let handler = self.handler.clone();
        let enable_logging = self.enable_logging;

        Box::pin(async move {
            let schema_definition = match (&external_registry, &schema_name) {
                (Some(registry), Some(name)) if !name.is_empty() => {
                    Some(registry.get_schema_definition(name, schema_version).await?)
                }
                _ => None,
            };
            // §4.8 step 3: decode failures are logged (when enabled) before
            // the error is returned to the driver for nack.
            let data: T = match crate::marshaler::unmarshal_typed(
                marshaler.as_ref(),
                schema_definition.as_deref(),
                &envelope.data().unwrap_or_default(),
            ) {
                Ok(data) => data,
                Err(e) => {
                    if enable_logging {
                        tracing::error!(message_id = %envelope.id(), error = %e, "decode failed");
                    }
                    return Err(e);
                }
            };
            let headers = build_headers(&envelope, group.as_deref());
            handler(Message { headers, data }, ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::in_memory::InMemoryDriver;
    use serde::Deserialize;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct ItemPaid {
        item_id: String,
        total: f64,
        quantity: u32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct OrderSent {
        order_id: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct OrderDelivered {
        order_id: String,
    }

    fn build_test_bus() -> Bus {
        Bus::builder(Arc::new(InMemoryDriver::new())).build()
    }

    #[test]
    fn register_then_resolve_both_directions() {
        let bus = build_test_bus();
        let meta = MessageMetadata::new("org.neutrino.marketplace.item.paid", "svc://marketplace");
        bus.register_schema::<ItemPaid>(meta.clone());

        assert_eq!(bus.schema_metadata::<ItemPaid>().unwrap(), meta);
        assert_eq!(
            bus.schema_metadata_by_topic("org.neutrino.marketplace.item.paid").unwrap(),
            meta
        );
    }

    #[tokio::test]
    async fn round_trip_through_in_memory_driver() {
        let bus = Arc::new(build_test_bus());
        bus.register_schema::<ItemPaid>(MessageMetadata::new(
            "org.neutrino.marketplace.item.paid",
            "svc://marketplace",
        ));

        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();
        bus.subscribe::<ItemPaid, _>(move |msg, _ctx| {
            let received = received_clone.clone();
            Box::pin(async move {
                *received.lock().await = Some(msg);
                Ok(())
            })
        })
        .unwrap()
        .register()
        .await
        .unwrap();

        bus.listen_and_serve().await.unwrap();

        let paid = ItemPaid {
            item_id: "abc".to_string(),
            total: 99.99,
            quantity: 2,
        };
        bus.publish(&MessageContext::new(), &paid).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let message = received.lock().await.take().expect("handler was invoked");
        assert_eq!(message.data, paid);
        let message_id = message.headers.get("message_id").cloned().unwrap();
        assert!(!message_id.is_empty());
        assert_eq!(message.headers.get("correlation_id"), Some(&message_id));
        assert_eq!(message.headers.get("causation_id"), Some(&message_id));
    }

    #[tokio::test]
    async fn correlation_inherits_across_nested_publish() {
        let bus = Arc::new(build_test_bus());
        bus.register_schema::<ItemPaid>(MessageMetadata::new("item.paid", "svc://marketplace"));
        bus.register_schema::<OrderSent>(MessageMetadata::new("order.sent", "svc://marketplace"));

        let nested_ctx: Arc<Mutex<Option<MessageContext>>> = Arc::new(Mutex::new(None));
        let nested_ctx_clone = nested_ctx.clone();
        let inner_bus = bus.clone();
        bus.subscribe::<ItemPaid, _>(move |_msg, ctx| {
            let inner_bus = inner_bus.clone();
            let nested_ctx_clone = nested_ctx_clone.clone();
            Box::pin(async move {
                inner_bus
                    .publish(&ctx, &OrderSent { order_id: "x".to_string() })
                    .await
                    .unwrap();
                *nested_ctx_clone.lock().await = Some(ctx);
                Ok(())
            })
        })
        .unwrap()
        .register()
        .await
        .unwrap();

        let order_received = Arc::new(Mutex::new(None));
        let order_received_clone = order_received.clone();
        bus.subscribe::<OrderSent, _>(move |msg, _ctx| {
            let order_received = order_received_clone.clone();
            Box::pin(async move {
                *order_received.lock().await = Some(msg);
                Ok(())
            })
        })
        .unwrap()
        .register()
        .await
        .unwrap();

        bus.listen_and_serve().await.unwrap();
        bus.publish(
            &MessageContext::new(),
            &ItemPaid {
                item_id: "abc".to_string(),
                total: 1.0,
                quantity: 1,
            },
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let parent_id = nested_ctx.lock().await.as_ref().unwrap().message_id().unwrap().to_string();
        let order_message = order_received.lock().await.take().expect("order handler invoked");
        assert_eq!(order_message.headers.get("correlation_id"), Some(&parent_id));
        assert_eq!(order_message.headers.get("causation_id"), Some(&parent_id));
    }

    #[tokio::test]
    async fn fan_out_invokes_every_subscriber_exactly_once() {
        let bus = Arc::new(build_test_bus());
        bus.register_schema::<OrderDelivered>(MessageMetadata::new("order.delivered", "svc://marketplace"));

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let first_clone = first.clone();
        let second_clone = second.clone();

        bus.subscribe::<OrderDelivered, _>(move |_msg, _ctx| {
            let first_clone = first_clone.clone();
            Box::pin(async move {
                first_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .unwrap()
        .register()
        .await
        .unwrap();

        bus.subscribe::<OrderDelivered, _>(move |_msg, _ctx| {
            let second_clone = second_clone.clone();
            Box::pin(async move {
                second_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .unwrap()
        .register()
        .await
        .unwrap();

        bus.listen_and_serve().await.unwrap();
        bus.publish(
            &MessageContext::new(),
            &OrderDelivered {
                order_id: "z".to_string(),
            },
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_blocks_further_publish() {
        let bus = build_test_bus();
        bus.register_schema::<ItemPaid>(MessageMetadata::new("item.paid", "svc://marketplace"));
        bus.listen_and_serve().await.unwrap();

        bus.shutdown().await.unwrap();
        let second = bus.shutdown().await;
        assert!(second.is_err());

        let result = bus
            .publish(
                &MessageContext::new(),
                &ItemPaid {
                    item_id: "abc".to_string(),
                    total: 1.0,
                    quantity: 1,
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn publish_bulk_aggregates_all_failures() {
        let bus = build_test_bus();
        // Nothing registered, so every publish fails with MessageNotRegistered.
        let values = vec![
            ItemPaid {
                item_id: "a".to_string(),
                total: 1.0,
                quantity: 1,
            },
            ItemPaid {
                item_id: "b".to_string(),
                total: 2.0,
                quantity: 1,
            },
        ];
        let result = bus.publish_bulk(&MessageContext::new(), &values).await;
        let err = result.unwrap_err();
        assert_eq!(err.errors().len(), 2);
    }

    struct RecordingSchemaRegistry {
        last_version: Arc<std::sync::Mutex<Option<u32>>>,
    }

    #[async_trait::async_trait]
    impl crate::external_schema::ExternalSchemaRegistry for RecordingSchemaRegistry {
        fn get_base_location(&self) -> &str {
            "schemas://test/"
        }

        async fn get_schema_definition(&self, name: &str, version: u32) -> Result<String> {
            *self.last_version.lock().unwrap() = Some(version);
            Ok(format!("{{\"name\":\"{name}\",\"version\":{version}}}"))
        }
    }

    #[tokio::test]
    async fn schema_version_zero_falls_back_to_bus_major_version() {
        let last_version = Arc::new(std::sync::Mutex::new(None));
        let bus = Bus::builder(Arc::new(InMemoryDriver::new()))
            .external_schema_registry(Arc::new(RecordingSchemaRegistry {
                last_version: last_version.clone(),
            }))
            .config(BusConfig {
                major_version: 7,
                ..BusConfig::default()
            })
            .build();
        bus.register_schema::<ItemPaid>(
            MessageMetadata::new("item.paid", "svc://marketplace").with_schema("item-paid", 0),
        );

        bus.publish(
            &MessageContext::new(),
            &ItemPaid {
                item_id: "abc".to_string(),
                total: 1.0,
                quantity: 1,
            },
        )
        .await
        .unwrap();

        assert_eq!(*last_version.lock().unwrap(), Some(7));
    }

    #[tokio::test]
    async fn explicit_schema_version_is_used_verbatim() {
        let last_version = Arc::new(std::sync::Mutex::new(None));
        let bus = Bus::builder(Arc::new(InMemoryDriver::new()))
            .external_schema_registry(Arc::new(RecordingSchemaRegistry {
                last_version: last_version.clone(),
            }))
            .config(BusConfig {
                major_version: 7,
                ..BusConfig::default()
            })
            .build();
        bus.register_schema::<ItemPaid>(
            MessageMetadata::new("item.paid", "svc://marketplace").with_schema("item-paid", 3),
        );

        bus.publish(
            &MessageContext::new(),
            &ItemPaid {
                item_id: "abc".to_string(),
                total: 1.0,
                quantity: 1,
            },
        )
        .await
        .unwrap();

        assert_eq!(*last_version.lock().unwrap(), Some(3));
    }
}
