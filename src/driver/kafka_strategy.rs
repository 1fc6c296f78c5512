//! Kafka-style consumer strategy selection and wire mapping (§4.7).
//!
//! Concrete `rdkafka` consumer/producer wiring is out of scope for the
//! core (it belongs to whatever crate plugs an actual Kafka driver in);
//! what the core owns is (a) which of the two consumption strategies a
//! subscriber resolves to, and (b) the envelope↔wire-header mapping every
//! Kafka-family driver needs to agree on.

use std::collections::HashMap;

use crate::envelope::Envelope;

/// Which strategy a subscriber resolves to, selected by whether it (or the
/// bus) has a consumer group configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerStrategy {
    /// Open a group consumer on `[topic]`; offsets commit on success only.
    ConsumerGroup { group: String },
    /// Open a partition consumer with no group: fixed partition, explicit
    /// starting offset.
    PartitionShard { partition_id: i32, initial_offset: i64 },
}

/// Resolve the strategy for a subscriber per §4.7: a non-empty group
/// (subscriber's own, falling back to the bus-level one) selects consumer
/// group mode; otherwise partition-shard mode using the driver config's
/// `partition_id`/`initial_offset`.
pub fn select_strategy(
    subscriber_group: Option<&str>,
    bus_consumer_group: &str,
    partition_id: i32,
    initial_offset: i64,
) -> ConsumerStrategy {
    let group = subscriber_group.filter(|g| !g.is_empty()).or_else(|| {
        if bus_consumer_group.is_empty() {
            None
        } else {
            Some(bus_consumer_group)
        }
    });
    match group {
        Some(group) => ConsumerStrategy::ConsumerGroup {
            group: group.to_string(),
        },
        None => ConsumerStrategy::PartitionShard {
            partition_id,
            initial_offset,
        },
    }
}

/// Kafka header keys carrying the CloudEvents attribute set (§4.7, §6).
pub mod wire_header {
    pub const CE_ID: &str = "ce_id";
    pub const CE_SOURCE: &str = "ce_source";
    pub const CE_SPECVERSION: &str = "ce_specversion";
    pub const CE_TYPE: &str = "ce_type";
    pub const CE_TIME: &str = "ce_time";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const SCHEMA: &str = "schema";
    pub const SUBJECT: &str = "subject";
    pub const GL_CORRELATION_ID: &str = "gl_correlation_id";
    pub const GL_CAUSATION_ID: &str = "gl_causation_id";

    /// Synthetic headers a consumer adds to the decoded message for
    /// observability; never present on the wire.
    pub const KAFKA_OFFSET: &str = "kafka-offset";
    pub const KAFKA_PARTITION: &str = "kafka-partition";
}

/// Message key: the envelope id, verbatim.
pub fn wire_key(envelope: &Envelope) -> String {
    envelope.id().to_string()
}

/// Build the ten CloudEvents wire headers for an outbound envelope.
/// Optional attributes that are absent are simply omitted.
pub fn envelope_to_wire_headers(envelope: &Envelope) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(wire_header::CE_ID.to_string(), envelope.id().to_string());
    headers.insert(wire_header::CE_SOURCE.to_string(), envelope.source());
    headers.insert(
        wire_header::CE_SPECVERSION.to_string(),
        envelope.spec_version().to_string(),
    );
    headers.insert(wire_header::CE_TYPE.to_string(), envelope.r#type().to_string());
    if let Some(time) = envelope.time() {
        headers.insert(wire_header::CE_TIME.to_string(), time.to_rfc3339());
    }
    if let Some(ct) = envelope.data_content_type() {
        headers.insert(wire_header::CONTENT_TYPE.to_string(), ct.to_string());
    }
    if let Some(schema) = envelope.data_schema() {
        headers.insert(wire_header::SCHEMA.to_string(), schema);
    }
    if let Some(subject) = envelope.subject() {
        headers.insert(wire_header::SUBJECT.to_string(), subject.to_string());
    }
    let correlation_id = envelope
        .correlation_id()
        .unwrap_or_else(|| envelope.id().to_string());
    headers.insert(wire_header::GL_CORRELATION_ID.to_string(), correlation_id);
    if let Some(causation_id) = envelope.causation_id() {
        headers.insert(wire_header::GL_CAUSATION_ID.to_string(), causation_id);
    }
    headers
}

/// Add the consumer-side synthetic `kafka-offset`/`kafka-partition`
/// headers to an already-built header map (e.g. one produced by
/// [`crate::message::build_headers`]).
pub fn decorate_with_kafka_metadata(headers: &mut HashMap<String, String>, offset: i64, partition: i32) {
    headers.insert(wire_header::KAFKA_OFFSET.to_string(), offset.to_string());
    headers.insert(wire_header::KAFKA_PARTITION.to_string(), partition.to_string());
}
