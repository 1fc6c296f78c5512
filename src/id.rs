//! Pluggable unique-id generator.
//!
//! Mirrors the original `arch.IDFactory`: the bus asks a factory for a new
//! id on every publish. The default factory uses UUIDv4, matching the
//! original's `FactoryUUID` (`google/uuid`).

use crate::error::Result;

/// Generates unique ids for outbound envelopes.
pub trait IdFactory: Send + Sync {
    /// Produce a new unique id. Fallible so that exotic factories (e.g. one
    /// backed by a remote sequence service) can surface failures to the
    /// caller instead of panicking.
    fn new_id(&self) -> Result<String>;
}

/// Default factory: random UUIDv4 strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdFactory;

impl IdFactory for UuidIdFactory {
    fn new_id(&self) -> Result<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_factory_produces_distinct_ids() {
        let factory = UuidIdFactory;
        let a = factory.new_id().unwrap();
        let b = factory.new_id().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
