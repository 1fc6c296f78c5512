//! Kinded error model shared across the bus, registries, and drivers.

use std::fmt;

/// Stable, wire-agnostic error kind. New transport-local kinds may be added
/// without a breaking change, hence `#[non_exhaustive]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The bus has been shut down (or is shutting down) and rejects the call.
    BusClosed,
    /// No schema metadata is registered for the requested type/topic.
    MessageNotRegistered,
    /// An external schema registry was configured but has no definition for
    /// the requested (name, version) pair.
    MissingSchemaDefinition,
    /// A topic registration collided with an existing one.
    TopicAlreadyExists,
    /// A topic lookup found nothing.
    TopicNotFound,
    /// The marshaler failed to encode or decode a payload.
    Codec,
    /// Generic driver/transport failure not covered by a more specific kind.
    Transport,
    /// SQS polling failed (pull-loop driver family).
    SqsFailedPolling,
    /// A subscriber's handler returned an error while processing an SQS message.
    SqsHandlerFailed,
    /// Deleting/acknowledging an SQS message failed.
    SqsFailedToAcknowledge,
    /// Publishing to SNS failed.
    SnsFailedPublishing,
    /// Publishing to Kafka failed.
    KafkaFailedPublishing,
    /// Polling a Kafka consumer failed.
    KafkaFailedPolling,
}

impl ErrorKind {
    /// Short stable tag, as surfaced in `Error::kind`'s `Display` impl.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BusClosed => "BusClosed",
            ErrorKind::MessageNotRegistered => "MessageNotRegistered",
            ErrorKind::MissingSchemaDefinition => "MissingSchemaDefinition",
            ErrorKind::TopicAlreadyExists => "TopicAlreadyExists",
            ErrorKind::TopicNotFound => "TopicNotFound",
            ErrorKind::Codec => "CodecError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::SqsFailedPolling => "SqsFailedPolling",
            ErrorKind::SqsHandlerFailed => "SqsHandlerFailed",
            ErrorKind::SqsFailedToAcknowledge => "SqsFailedToAcknowledge",
            ErrorKind::SnsFailedPublishing => "SnsFailedPublishing",
            ErrorKind::KafkaFailedPublishing => "KafkaFailedPublishing",
            ErrorKind::KafkaFailedPolling => "KafkaFailedPolling",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The crate's error type. Carries a stable `kind`, a human description
/// (always prefixed `busline: `), and an optional wrapped cause.
#[derive(Debug, thiserror::Error)]
#[error("busline: {description}")]
pub struct Error {
    kind: ErrorKind,
    description: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Build a new error of the given kind with a human-readable description.
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            source: None,
        }
    }

    /// Attach a wrapped cause to this error.
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The stable error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable description, without the `busline: ` prefix.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The wrapped cause, if any.
    pub fn parent(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn bus_closed() -> Self {
        Self::new(ErrorKind::BusClosed, "the bus is closed")
    }

    pub fn message_not_registered() -> Self {
        Self::new(
            ErrorKind::MessageNotRegistered,
            "the specified message type is not present on the schema registry",
        )
    }

    pub fn missing_schema_definition(name: &str, version: u32) -> Self {
        Self::new(
            ErrorKind::MissingSchemaDefinition,
            format!("no schema definition for '{name}' version {version}"),
        )
    }

    pub fn topic_already_exists(topic: &str) -> Self {
        Self::new(
            ErrorKind::TopicAlreadyExists,
            format!("topic '{topic}' is already registered"),
        )
    }

    pub fn topic_not_found(topic: &str) -> Self {
        Self::new(
            ErrorKind::TopicNotFound,
            format!("topic '{topic}' is not registered"),
        )
    }

    pub fn codec(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Codec, description.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Aggregation of multiple independent failures, e.g. from `publish_bulk` or
/// from draining several subscriber workers during shutdown. Mirrors the
/// role `hashicorp/go-multierror` plays in the original Go implementation.
#[derive(Debug)]
pub struct BulkError {
    errors: Vec<Error>,
}

impl BulkError {
    pub fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    /// Returns `Ok(())` if no errors were collected, `Err(self)` otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "busline: {} error(s) occurred:", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            writeln!(f, "  {}. {e}", i + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for BulkError {}
