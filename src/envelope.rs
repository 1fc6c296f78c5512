//! The on-wire CloudEvents record carrying one message.
//!
//! Built on top of the official `cloudevents-sdk` `Event` type so that JSON
//! encoding matches the CloudEvents 1.0 core attribute set exactly
//! (`id`, `source`, `specversion`, `type`, `data`, `datacontenttype`,
//! `dataschema`, `subject`, `time`). Correlation/causation/trace-context are
//! carried as CloudEvents extension attributes (`gluon_correlation_id`,
//! `gluon_causation_id`, `gluon_trace_context`), per the wire contract this
//! bus has always used. `topic` is a driver routing hint that lives on the
//! Rust struct only — it is never serialized into the envelope body.

use chrono::{DateTime, Utc};
use cloudevents::event::{AttributesReader, AttributesWriter, ExtensionValue};
use cloudevents::{Data, Event, EventBuilder, EventBuilderV10};

use crate::error::{Error, Result};

/// CloudEvents spec version this bus emits. Always `"1.0"`.
pub const SPEC_VERSION: &str = "1.0";

const EXT_CORRELATION_ID: &str = "gluon_correlation_id";
const EXT_CAUSATION_ID: &str = "gluon_causation_id";
const EXT_TRACE_CONTEXT: &str = "gluon_trace_context";

/// Immutable CloudEvents record plus the routing-only `topic` hint.
#[derive(Debug, Clone)]
pub struct Envelope {
    event: Event,
    /// Driver routing hint. Never serialized to the wire envelope body.
    topic: Option<String>,
}

impl Envelope {
    /// Start building an envelope with the three CloudEvents attributes that
    /// have no sensible default: `id`, `type`, `source`.
    pub fn builder(
        id: impl Into<String>,
        r#type: impl Into<String>,
        source: impl Into<String>,
    ) -> EnvelopeBuilder {
        EnvelopeBuilder {
            inner: EventBuilderV10::new().id(id).ty(r#type).source(source),
            topic: None,
        }
    }

    pub fn id(&self) -> &str {
        self.event.id()
    }

    pub fn source(&self) -> String {
        self.event.source().to_string()
    }

    pub fn spec_version(&self) -> &'static str {
        SPEC_VERSION
    }

    pub fn r#type(&self) -> &str {
        self.event.ty()
    }

    /// The opaque payload, as raw bytes regardless of how it was set on the
    /// builder (binary, string, or JSON value).
    pub fn data(&self) -> Option<Vec<u8>> {
        match self.event.data() {
            Some(Data::Binary(b)) => Some(b.clone()),
            Some(Data::String(s)) => Some(s.clone().into_bytes()),
            Some(Data::Json(v)) => serde_json::to_vec(v).ok(),
            None => None,
        }
    }

    pub fn data_content_type(&self) -> Option<&str> {
        self.event.datacontenttype()
    }

    pub fn data_schema(&self) -> Option<String> {
        self.event.dataschema().map(|u| u.to_string())
    }

    pub fn subject(&self) -> Option<&str> {
        self.event.subject()
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.event.time().map(|t| t.with_timezone(&Utc))
    }

    pub fn correlation_id(&self) -> Option<String> {
        extension_string(&self.event, EXT_CORRELATION_ID)
    }

    pub fn causation_id(&self) -> Option<String> {
        extension_string(&self.event, EXT_CAUSATION_ID)
    }

    pub fn trace_context(&self) -> Option<String> {
        extension_string(&self.event, EXT_TRACE_CONTEXT)
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Set the `subject` attribute in place (used by `publish_with_subject`).
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.event.set_subject(Some(subject.into()));
    }

    /// Set the `correlation_id` extension in place. Used by the publish
    /// pipeline to inject context before handing the envelope to the driver.
    pub fn set_correlation_id(&mut self, correlation_id: impl Into<String>) {
        self.event
            .set_extension(EXT_CORRELATION_ID, ExtensionValue::String(correlation_id.into()));
    }

    /// Set the `causation_id` extension in place.
    pub fn set_causation_id(&mut self, causation_id: impl Into<String>) {
        self.event
            .set_extension(EXT_CAUSATION_ID, ExtensionValue::String(causation_id.into()));
    }

    pub fn set_trace_context(&mut self, trace_context: impl Into<String>) {
        self.event
            .set_extension(EXT_TRACE_CONTEXT, ExtensionValue::String(trace_context.into()));
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = Some(topic.into());
    }

    /// Serialize to the CloudEvents JSON wire format.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.event).map_err(|e| Error::codec(e.to_string()).with_source(e))
    }

    /// Deserialize from the CloudEvents JSON wire format. `topic` is not part
    /// of the wire body and must be supplied separately by the driver
    /// normalizing an inbound wire message.
    pub fn from_json(bytes: &[u8], topic: Option<String>) -> Result<Self> {
        let event: Event =
            serde_json::from_slice(bytes).map_err(|e| Error::codec(e.to_string()).with_source(e))?;
        Ok(Self { event, topic })
    }

    /// Access the underlying `cloudevents::Event`, e.g. for a driver that
    /// needs the full extension set to build wire headers.
    pub fn as_cloudevent(&self) -> &Event {
        &self.event
    }
}

fn extension_string(event: &Event, key: &str) -> Option<String> {
    match event.extension(key) {
        Some(ExtensionValue::String(s)) => Some(s.clone()),
        Some(ExtensionValue::Integer(i)) => Some(i.to_string()),
        Some(ExtensionValue::Boolean(b)) => Some(b.to_string()),
        None => None,
    }
}

/// Builder for [`Envelope`]. Required fields are fixed at [`Envelope::builder`]
/// time; everything else is optional.
pub struct EnvelopeBuilder {
    inner: EventBuilderV10,
    topic: Option<String>,
}

impl EnvelopeBuilder {
    pub fn data(mut self, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.inner = self.inner.data(content_type, data);
        self
    }

    pub fn data_schema(mut self, schema: impl Into<String>) -> Self {
        self.inner = self.inner.data_schema(schema.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.inner = self.inner.subject(subject);
        self
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.inner = self.inner.time(time);
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.inner = self.inner.extension(EXT_CORRELATION_ID, id.into());
        self
    }

    pub fn causation_id(mut self, id: impl Into<String>) -> Self {
        self.inner = self.inner.extension(EXT_CAUSATION_ID, id.into());
        self
    }

    pub fn trace_context(mut self, ctx: impl Into<String>) -> Self {
        self.inner = self.inner.extension(EXT_TRACE_CONTEXT, ctx.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Build the envelope. Fails only if the underlying CloudEvents builder
    /// rejects the attribute set (e.g. empty `id`).
    pub fn build(self) -> Result<Envelope> {
        let event = self
            .inner
            .build()
            .map_err(|e| Error::codec(format!("invalid envelope: {e}")).with_source(e))?;
        Ok(Envelope {
            event,
            topic: self.topic,
        })
    }
}
