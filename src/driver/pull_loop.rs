//! Pull-loop driver template, the shape shared by the SNS+SQS family: a
//! long-running task that polls a queue-like transport in batches, fans
//! each message out to its own task, and acks/leaves messages based on
//! the handler's verdict.
//!
//! Concrete wire calls (the actual SQS `ReceiveMessage`/`DeleteMessage`
//! requests, SNS envelope unwrapping) are out of scope for the core — they
//! belong to whatever crate wraps the AWS SDK. What belongs here is the
//! polling/retry/ack *engine*, parameterized over a [`PullTransport`] a
//! concrete driver implements, mirroring the relationship between a
//! `Driver` contract and its transport-specific implementation.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};

use crate::envelope::Envelope;
use crate::error::{Error, ErrorKind, Result};
use crate::handler::InternalHandler;

/// Recognized pull-loop driver options, with their defaults.
#[derive(Debug, Clone)]
pub struct PullLoopConfig {
    pub max_messages_polled: u32,
    pub visibility_timeout: Duration,
    pub wait_time_seconds: Duration,
    /// `0` means retry polling failures indefinitely.
    pub max_batch_poll_retries: u32,
    pub min_poll_backoff: Duration,
    pub max_poll_backoff: Duration,
}

impl Default for PullLoopConfig {
    fn default() -> Self {
        Self {
            max_messages_polled: 10,
            visibility_timeout: Duration::from_secs(10),
            wait_time_seconds: Duration::from_secs(5),
            max_batch_poll_retries: 0,
            min_poll_backoff: Duration::from_millis(100),
            max_poll_backoff: Duration::from_secs(30),
        }
    }
}

impl PullLoopConfig {
    fn backoff_builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_poll_backoff)
            .with_max_delay(self.max_poll_backoff)
            .with_jitter()
    }
}

/// One message received from the transport, paired with whatever handle
/// the transport needs to finalize (delete) or abandon it.
pub struct PulledMessage<R> {
    pub envelope: Envelope,
    pub receipt: R,
}

/// A queue-like transport the pull-loop engine polls. Implementors own the
/// actual wire protocol (SQS `ReceiveMessage`, outer SNS envelope
/// unwrapping, etc.) and hand back already-normalized [`Envelope`]s.
#[async_trait]
pub trait PullTransport: Send + Sync {
    type Receipt: Send + Sync + 'static;

    /// Long-poll for up to `max_messages`, waiting up to `wait` for at
    /// least one to arrive. An empty `Ok` batch is a normal "nothing
    /// arrived this round", not an error.
    async fn receive(
        &self,
        max_messages: u32,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Vec<PulledMessage<Self::Receipt>>>;

    /// Finalize a successfully handled message (delete it from the queue).
    async fn delete(&self, receipt: Self::Receipt) -> Result<()>;
}

/// Cooperative cancellation flag for a running worker. Cheap to clone and
/// share between the spawner and the worker loop.
#[derive(Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The pull-loop worker engine (§4.6, "Pull-loop subscription worker"
/// state machine). Generic over the transport so the SNS+SQS family (and
/// any other poll-based transport) shares this one implementation.
pub struct PullLoopWorker<T: PullTransport> {
    transport: T,
    config: PullLoopConfig,
    handler: Arc<InternalHandler>,
}

impl<T: PullTransport> PullLoopWorker<T> {
    pub fn new(transport: T, config: PullLoopConfig, handler: Arc<InternalHandler>) -> Self {
        Self {
            transport,
            config,
            handler,
        }
    }

    /// Run the poll loop until `cancel` is observed or the poll-retry
    /// budget is exhausted. Mirrors §4.6's pseudocode: receive, handle
    /// poll errors with bounded or infinite backoff, spawn a handler
    /// invocation per message, then check for cancellation.
    pub async fn run(&self, cancel: Cancellation) -> Result<()> {
        let mut consecutive_failures = 0u32;
        let backoff_builder = self.config.backoff_builder();
        let mut backoff = backoff_builder.build();

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let batch = self
                .transport
                .receive(
                    self.config.max_messages_polled,
                    self.config.visibility_timeout,
                    self.config.wait_time_seconds,
                )
                .await;

            let batch = match batch {
                Ok(batch) => {
                    consecutive_failures = 0;
                    backoff = backoff_builder.build();
                    batch
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if self.config.max_batch_poll_retries > 0
                        && consecutive_failures >= self.config.max_batch_poll_retries
                    {
                        return Err(Error::new(ErrorKind::SqsFailedPolling, "poll-retry budget exhausted")
                            .with_source(e));
                    }
                    let delay = backoff.next().unwrap_or(self.config.max_poll_backoff);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let mut tasks: Vec<Pin<Box<dyn Future<Output = ()> + Send>>> = Vec::with_capacity(batch.len());
            for message in batch {
                let handler = self.handler.clone();
                tasks.push(Box::pin(process_one(handler, message, self)));
            }
            for task in tasks {
                task.await;
            }

            if cancel.is_cancelled() {
                return Ok(());
            }
        }
    }
}

/// Process one pulled message: invoke the internal handler, then delete on
/// success or leave it (redelivery after `visibility_timeout`) on failure.
async fn process_one<T: PullTransport>(
    handler: Arc<InternalHandler>,
    message: PulledMessage<T::Receipt>,
    worker: &PullLoopWorker<T>,
) {
    let message_id = message.envelope.id().to_string();
    let result = handler.handle_one(message.envelope).await;
    match result {
        Ok(()) => {
            let _span = tracing::debug_span!("driver.ack", message_id = %message_id).entered();
            let _ = worker.transport.delete(message.receipt).await;
        }
        Err(e) => {
            // Message is left in place; the transport's visibility timeout
            // elapsing makes it eligible for redelivery.
            tracing::debug!(parent: &tracing::debug_span!("driver.nack", message_id = %message_id), error = %e, "handler failed, leaving message for redelivery");
        }
    }
}

/// `group` resolution per §4.6: the subscriber's own group if set, else
/// the bus-level consumer group.
pub fn resolve_consumer_group<'a>(subscriber_group: Option<&'a str>, bus_consumer_group: &'a str) -> &'a str {
    subscriber_group.filter(|g| !g.is_empty()).unwrap_or(bus_consumer_group)
}

/// Source of the AWS account/region pair ARNs and queue URLs are built
/// from.
#[derive(Debug, Clone, Default)]
pub struct AwsIdentity {
    pub region: String,
    pub account_id: String,
}

/// SQS queue endpoint: either derive the host from `region`, or use a
/// fixed custom endpoint (LocalStack, a VPC endpoint, ...).
#[derive(Debug, Clone)]
pub enum SqsEndpoint {
    Region(String),
    Custom(String),
}

/// Replace `.` with `-`: SNS/SQS resource names forbid dots.
fn wire_safe(name: &str) -> String {
    name.replace('.', "-")
}

/// `arn:aws:sns:{region}:{account}:{topic with dots→dashes}`. Any empty
/// input yields an empty string (§4.6, §8 scenario 5).
pub fn generate_sns_arn(identity: &AwsIdentity, topic: &str) -> String {
    if identity.region.is_empty() || identity.account_id.is_empty() || topic.is_empty() {
        return String::new();
    }
    format!(
        "arn:aws:sns:{}:{}:{}",
        identity.region,
        identity.account_id,
        wire_safe(topic)
    )
}

/// `https://sqs.{region}.amazonaws.com/{account}/{group with dots→dashes}`,
/// or `{custom_endpoint}/{account}/{group}` when a custom endpoint is
/// configured. Any empty input yields an empty string.
pub fn generate_sqs_queue_url(endpoint: &SqsEndpoint, account_id: &str, group: &str) -> String {
    if account_id.is_empty() || group.is_empty() {
        return String::new();
    }
    let group = wire_safe(group);
    match endpoint {
        SqsEndpoint::Region(region) if !region.is_empty() => {
            format!("https://sqs.{region}.amazonaws.com/{account_id}/{group}")
        }
        SqsEndpoint::Custom(custom) if !custom.is_empty() => format!("{custom}/{account_id}/{group}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MessageContext;
    use crate::subscriber::{MessageHandler, Subscriber, SubscriberRegistry};
    use futures::future::BoxFuture;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex;

    fn envelope(id: &str) -> Envelope {
        Envelope::builder(id, "org.example.thing", "svc://orders")
            .topic("org.example.thing")
            .build()
            .unwrap()
    }

    struct AlwaysFailingTransport;

    #[async_trait]
    impl PullTransport for AlwaysFailingTransport {
        type Receipt = ();

        async fn receive(
            &self,
            _max_messages: u32,
            _visibility_timeout: Duration,
            _wait: Duration,
        ) -> Result<Vec<PulledMessage<()>>> {
            Err(Error::new(ErrorKind::SqsFailedPolling, "simulated failure"))
        }

        async fn delete(&self, _receipt: ()) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn poll_retry_budget_stops_the_worker() {
        let registry = Arc::new(SubscriberRegistry::new());
        let handler = Arc::new(InternalHandler::new(registry, vec![]));
        let config = PullLoopConfig {
            max_batch_poll_retries: 3,
            min_poll_backoff: Duration::from_millis(1),
            max_poll_backoff: Duration::from_millis(5),
            ..Default::default()
        };
        let worker = PullLoopWorker::new(AlwaysFailingTransport, config, handler);
        let result = worker.run(Cancellation::new()).await;
        assert!(result.is_err());
    }

    struct QueueTransport {
        pending: Mutex<Vec<PulledMessage<usize>>>,
        deleted: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PullTransport for QueueTransport {
        type Receipt = usize;

        async fn receive(
            &self,
            _max_messages: u32,
            _visibility_timeout: Duration,
            _wait: Duration,
        ) -> Result<Vec<PulledMessage<usize>>> {
            Ok(std::mem::take(&mut *self.pending.lock().await))
        }

        async fn delete(&self, _receipt: usize) -> Result<()> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_handling_deletes_the_message() {
        let registry = Arc::new(SubscriberRegistry::new());
        let handled = Arc::new(AtomicUsize::new(0));
        let handled_clone = handled.clone();
        let handler_fn: Arc<dyn MessageHandler> = Arc::new(
            move |_envelope: Envelope, _ctx: MessageContext| -> BoxFuture<'static, Result<()>> {
                handled_clone.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(()) })
            },
        );
        registry
            .add(Subscriber::builder("org.example.thing", handler_fn).build())
            .await;
        let handler = Arc::new(InternalHandler::new(registry, vec![]));

        let deleted = Arc::new(AtomicUsize::new(0));
        let transport = QueueTransport {
            pending: Mutex::new(vec![PulledMessage {
                envelope: envelope("id-1"),
                receipt: 0,
            }]),
            deleted: deleted.clone(),
        };
        let worker = Arc::new(PullLoopWorker::new(transport, PullLoopConfig::default(), handler));
        let cancel = Cancellation::new();
        let run_worker = worker.clone();
        let run_cancel = cancel.clone();
        let join = tokio::spawn(async move { run_worker.run(run_cancel).await });

        // Let the first receive()/dispatch happen, then stop the loop
        // before it spins on further empty batches.
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        join.await.unwrap().unwrap();

        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert_eq!(deleted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn consumer_group_prefers_subscriber_override() {
        assert_eq!(resolve_consumer_group(Some("billing"), "default"), "billing");
        assert_eq!(resolve_consumer_group(None, "default"), "default");
        assert_eq!(resolve_consumer_group(Some(""), "default"), "default");
    }

    #[test]
    fn sns_arn_matches_canonical_form() {
        let identity = AwsIdentity {
            region: "us-east-1".to_string(),
            account_id: "1234567890".to_string(),
        };
        assert_eq!(
            generate_sns_arn(&identity, "ncorp.places.marketplace.prod.2.event.item.paid"),
            "arn:aws:sns:us-east-1:1234567890:ncorp-places-marketplace-prod-2-event-item-paid"
        );
    }

    #[test]
    fn sns_arn_empty_account_yields_empty_string() {
        let identity = AwsIdentity {
            region: "us-east-1".to_string(),
            account_id: String::new(),
        };
        assert_eq!(generate_sns_arn(&identity, "org.example.thing"), "");
    }

    #[test]
    fn sqs_queue_url_region_form() {
        let url = generate_sqs_queue_url(
            &SqsEndpoint::Region("us-east-1".to_string()),
            "1234567890",
            "orders.billing",
        );
        assert_eq!(url, "https://sqs.us-east-1.amazonaws.com/1234567890/orders-billing");
    }

    #[test]
    fn sqs_queue_url_custom_endpoint_form() {
        let url = generate_sqs_queue_url(
            &SqsEndpoint::Custom("http://localhost:4566".to_string()),
            "1234567890",
            "orders.billing",
        );
        assert_eq!(url, "http://localhost:4566/1234567890/orders-billing");
    }

    #[test]
    fn sqs_queue_url_empty_group_yields_empty_string() {
        let url = generate_sqs_queue_url(&SqsEndpoint::Region("us-east-1".to_string()), "1234567890", "");
        assert_eq!(url, "");
    }
}
