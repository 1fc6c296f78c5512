//! The User Message delivered to a subscriber's handler: decoded payload
//! plus a string-keyed header view of the envelope it came from.

use std::collections::HashMap;

use crate::envelope::Envelope;

/// Delivered to a subscriber handler once its envelope has been decoded.
/// `headers` surfaces the envelope's CloudEvents attributes plus the
/// resolved consumer group; `data` is the payload decoded into its
/// registered type.
#[derive(Debug, Clone)]
pub struct Message<T> {
    pub headers: HashMap<String, String>,
    pub data: T,
}

/// Header keys populated by [`build_headers`]. Kept as constants so
/// drivers adding their own synthetic headers (e.g. `kafka-offset`) don't
/// collide with these by accident.
pub mod header {
    pub const ID: &str = "id";
    pub const MESSAGE_ID: &str = "message_id";
    pub const SOURCE: &str = "source";
    pub const SPEC_VERSION: &str = "specversion";
    pub const TYPE: &str = "type";
    pub const DATA_CONTENT_TYPE: &str = "datacontenttype";
    pub const DATA_SCHEMA: &str = "dataschema";
    pub const SUBJECT: &str = "subject";
    pub const TIME: &str = "time";
    pub const CORRELATION_ID: &str = "correlation_id";
    pub const CAUSATION_ID: &str = "causation_id";
    pub const GROUP: &str = "group";
}

/// Build the header map for a [`Message`] from its source envelope and the
/// consumer group it was delivered under, per §4.8 step 4 /
/// §3 "User Message".
pub fn build_headers(envelope: &Envelope, group: Option<&str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(header::ID.to_string(), envelope.id().to_string());
    headers.insert(header::MESSAGE_ID.to_string(), envelope.id().to_string());
    headers.insert(header::SOURCE.to_string(), envelope.source());
    headers.insert(header::SPEC_VERSION.to_string(), envelope.spec_version().to_string());
    headers.insert(header::TYPE.to_string(), envelope.r#type().to_string());
    if let Some(ct) = envelope.data_content_type() {
        headers.insert(header::DATA_CONTENT_TYPE.to_string(), ct.to_string());
    }
    if let Some(schema) = envelope.data_schema() {
        headers.insert(header::DATA_SCHEMA.to_string(), schema);
    }
    if let Some(subject) = envelope.subject() {
        headers.insert(header::SUBJECT.to_string(), subject.to_string());
    }
    if let Some(time) = envelope.time() {
        headers.insert(header::TIME.to_string(), time.to_rfc3339());
    }
    let correlation_id = envelope
        .correlation_id()
        .unwrap_or_else(|| envelope.id().to_string());
    headers.insert(header::CORRELATION_ID.to_string(), correlation_id);
    let causation_id = envelope
        .causation_id()
        .unwrap_or_else(|| envelope.id().to_string());
    headers.insert(header::CAUSATION_ID.to_string(), causation_id);
    if let Some(group) = group {
        headers.insert(header::GROUP.to_string(), group.to_string());
    }
    headers
}
