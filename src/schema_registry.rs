//! Bidirectional index binding application message types to topic/source/
//! schema metadata.
//!
//! The original Go implementation keys this registry by `reflect.TypeOf(msg)`
//! at runtime. Rust has no runtime reflection, so per the "Runtime type as
//! registry key" design note this registry takes the design-note (b) path:
//! explicit, compile-time-generic registration. `register::<T>` and
//! `get::<T>` are generic over the application message type `T`, keyed
//! internally by `TypeId` — the same invariant the original relies on (the
//! decode target's shape is recoverable without runtime reflection at the
//! call site) falls out for free because `T` is always known statically.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Per-registered-type metadata. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetadata {
    /// Topic (or logical type) this message publishes/subscribes to.
    pub topic: String,
    /// CloudEvents `source` to stamp on outbound envelopes of this type.
    pub source: String,
    /// Name used to resolve a definition from an external schema registry.
    pub schema_name: String,
    /// Schema version; `0` means "use the bus-level major version".
    pub schema_version: u32,
}

impl MessageMetadata {
    pub fn new(topic: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            source: source.into(),
            schema_name: String::new(),
            schema_version: 0,
        }
    }

    pub fn with_schema(mut self, name: impl Into<String>, version: u32) -> Self {
        self.schema_name = name.into();
        self.schema_version = version;
        self
    }
}

struct Entry {
    metadata: MessageMetadata,
    type_key: &'static str,
}

/// Maps a native message type to its [`MessageMetadata`], and back from
/// topic or type-name key. Many readers, rare writers — a single
/// readers-writer lock is sufficient (registration is bounded, happens at
/// startup).
#[derive(Default)]
pub struct SchemaRegistry {
    by_type: RwLock<HashMap<TypeId, Entry>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `T` to `metadata`. Re-registering the same type is a no-op —
    /// first write wins, matching the original's silently-ignored
    /// re-registration behavior.
    pub fn register<T: 'static>(&self, metadata: MessageMetadata) {
        let type_id = TypeId::of::<T>();
        let mut registry = self.by_type.write().expect("schema registry lock poisoned");
        registry.entry(type_id).or_insert_with(|| Entry {
            metadata,
            type_key: std::any::type_name::<T>(),
        });
    }

    /// Look up metadata by the runtime type of `T`.
    pub fn get<T: 'static>(&self) -> Result<MessageMetadata> {
        let type_id = TypeId::of::<T>();
        let registry = self.by_type.read().expect("schema registry lock poisoned");
        registry
            .get(&type_id)
            .map(|e| e.metadata.clone())
            .ok_or_else(Error::message_not_registered)
    }

    /// Reverse lookup by topic. Linear scan — registration is bounded.
    pub fn get_by_topic(&self, topic: &str) -> Option<MessageMetadata> {
        let registry = self.by_type.read().expect("schema registry lock poisoned");
        registry
            .values()
            .find(|e| e.metadata.topic == topic)
            .map(|e| e.metadata.clone())
    }

    /// Reverse lookup by the type-name key produced by `std::any::type_name`,
    /// the analogue of the original's `reflect.TypeOf(msg).String()` key —
    /// used by `publish_with_type`.
    pub fn get_by_key(&self, type_name: &str) -> Result<MessageMetadata> {
        let registry = self.by_type.read().expect("schema registry lock poisoned");
        registry
            .values()
            .find(|e| e.type_key == type_name)
            .map(|e| e.metadata.clone())
            .ok_or_else(Error::message_not_registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ItemPaid {
        #[allow(dead_code)]
        item_id: String,
    }
    struct OrderSent;

    #[test]
    fn register_then_get_returns_same_metadata() {
        let registry = SchemaRegistry::new();
        let meta = MessageMetadata::new("org.neutrino.marketplace.item.paid", "svc://marketplace");
        registry.register::<ItemPaid>(meta.clone());
        assert_eq!(registry.get::<ItemPaid>().unwrap(), meta);
    }

    #[test]
    fn re_registering_is_a_no_op() {
        let registry = SchemaRegistry::new();
        registry.register::<ItemPaid>(MessageMetadata::new("topic.a", "src.a"));
        registry.register::<ItemPaid>(MessageMetadata::new("topic.b", "src.b"));
        assert_eq!(registry.get::<ItemPaid>().unwrap().topic, "topic.a");
    }

    #[test]
    fn unknown_type_fails_with_message_not_registered() {
        let registry = SchemaRegistry::new();
        let err = registry.get::<OrderSent>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MessageNotRegistered);
    }

    #[test]
    fn get_by_topic_finds_registered_entry() {
        let registry = SchemaRegistry::new();
        registry.register::<ItemPaid>(MessageMetadata::new(
            "org.neutrino.marketplace.item.paid",
            "svc://marketplace",
        ));
        let meta = registry
            .get_by_topic("org.neutrino.marketplace.item.paid")
            .unwrap();
        assert_eq!(meta.source, "svc://marketplace");
        assert!(registry.get_by_topic("nonexistent").is_none());
    }

    #[test]
    fn get_by_key_finds_registered_entry() {
        let registry = SchemaRegistry::new();
        registry.register::<ItemPaid>(MessageMetadata::new("topic.a", "src.a"));
        let key = std::any::type_name::<ItemPaid>();
        assert!(registry.get_by_key(key).is_ok());
        assert!(registry.get_by_key("bogus::Type").is_err());
    }
}
