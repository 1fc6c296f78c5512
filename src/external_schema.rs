//! Optional external schema registry integration (C4).
//!
//! Mirrors the original's `arch.SchemaRegistry` client interface: a remote
//! service that owns versioned schema definitions by name, fronted here by
//! a read-through cache keyed by `"{name}#{version}"` so a hot publish/decode
//! path doesn't round-trip to the remote registry on every call.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// A remote registry capable of resolving schema definitions by name and
/// version. Drivers/codecs that need schema-aware encoding (e.g. Avro) call
/// through this trait; the JSON marshaler never needs it.
#[async_trait]
pub trait ExternalSchemaRegistry: Send + Sync {
    /// Base location (e.g. a registry URL or bucket prefix) definitions are
    /// resolved relative to.
    fn get_base_location(&self) -> &str;

    /// Whether `version` should be resolved as "latest" rather than a pinned
    /// version number.
    fn is_using_latest_schema(&self, version: u32) -> bool {
        version == 0
    }

    /// Fetch the raw schema definition for `name` at `version`.
    async fn get_schema_definition(&self, name: &str, version: u32) -> Result<String>;
}

/// Wraps an [`ExternalSchemaRegistry`] with an in-memory read-through cache.
pub struct CachingSchemaRegistry<R: ExternalSchemaRegistry> {
    inner: R,
    cache: RwLock<HashMap<String, String>>,
}

impl<R: ExternalSchemaRegistry> CachingSchemaRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(name: &str, version: u32) -> String {
        format!("{name}#{version}")
    }
}

#[async_trait]
impl<R: ExternalSchemaRegistry> ExternalSchemaRegistry for CachingSchemaRegistry<R> {
    fn get_base_location(&self) -> &str {
        self.inner.get_base_location()
    }

    fn is_using_latest_schema(&self, version: u32) -> bool {
        self.inner.is_using_latest_schema(version)
    }

    async fn get_schema_definition(&self, name: &str, version: u32) -> Result<String> {
        let key = Self::cache_key(name, version);
        if let Some(cached) = self.cache.read().expect("cache lock poisoned").get(&key) {
            return Ok(cached.clone());
        }

        let definition = self
            .inner
            .get_schema_definition(name, version)
            .await
            .map_err(|_| Error::missing_schema_definition(name, version))?;

        self.cache
            .write()
            .expect("cache lock poisoned")
            .insert(key, definition.clone());
        Ok(definition)
    }
}
