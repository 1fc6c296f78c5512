//! Codec for payload bodies.
//!
//! Mirrors the original `arch.Marshaler` interface: a content-type tag plus
//! marshal/unmarshal operations, optionally schema-aware (an external
//! registry's schema definition is threaded through so codecs like Avro can
//! validate/encode against it; the JSON codec ignores it).
//!
//! The trait is kept object-safe (`Arc<dyn Marshaler>` is what `Bus` holds)
//! by routing through `serde_json::Value` as the common erased
//! representation; typed callers (the publish and decode pipelines) convert
//! to/from their concrete type with `serde_json::to_value`/`from_value`
//! around the erased call.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Codec for the envelope's opaque `data` payload.
pub trait Marshaler: Send + Sync {
    /// MIME type written to the envelope's `data_content_type` attribute.
    fn content_type(&self) -> &'static str;

    /// Encode an already-serialized value to bytes. `schema_definition` is
    /// the definition resolved from an external schema registry, if one is
    /// configured; codecs that don't need it may ignore it.
    fn marshal(&self, schema_definition: Option<&str>, value: &Value) -> Result<Vec<u8>>;

    /// Decode `data` into the erased `Value` representation.
    fn unmarshal(&self, schema_definition: Option<&str>, data: &[u8]) -> Result<Value>;
}

/// Encode a concrete value through a `Marshaler`, going via `serde_json::Value`.
pub fn marshal_typed<T: Serialize>(
    marshaler: &dyn Marshaler,
    schema_definition: Option<&str>,
    value: &T,
) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value).map_err(|e| Error::codec(e.to_string()).with_source(e))?;
    marshaler.marshal(schema_definition, &value)
}

/// Decode bytes through a `Marshaler` into a concrete type, going via
/// `serde_json::Value`.
pub fn unmarshal_typed<T: DeserializeOwned>(
    marshaler: &dyn Marshaler,
    schema_definition: Option<&str>,
    data: &[u8],
) -> Result<T> {
    let value = marshaler.unmarshal(schema_definition, data)?;
    serde_json::from_value(value).map_err(|e| Error::codec(e.to_string()).with_source(e))
}

/// JSON codec backed by `serde_json`. The bus's default marshaler, matching
/// the original's `MarshalerJSON`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarshaler;

impl Marshaler for JsonMarshaler {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn marshal(&self, _schema_definition: Option<&str>, value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::codec(e.to_string()).with_source(e))
    }

    fn unmarshal(&self, _schema_definition: Option<&str>, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| Error::codec(e.to_string()).with_source(e))
    }
}
