//! busline - a transport-agnostic, CloudEvents-based message bus.
//!
//! `busline` separates the application-facing publish/subscribe API from the
//! wire transport: applications talk to a [`bus::Bus`] built around a
//! pluggable [`driver::Driver`], and every message on the wire is a
//! CloudEvents 1.0 [`envelope::Envelope`].

pub mod bus;
pub mod config;
pub mod context;
pub mod driver;
pub mod envelope;
pub mod error;
pub mod external_schema;
pub mod handler;
pub mod id;
pub mod marshaler;
pub mod message;
pub mod middleware;
pub mod observability;
pub mod schema_registry;
pub mod subscriber;

pub use bus::{Bus, BusBuilder, PendingSubscription};
pub use config::BusConfig;
pub use context::MessageContext;
pub use envelope::{Envelope, EnvelopeBuilder};
pub use error::{BulkError, Error, ErrorKind, Result};
pub use message::Message;
pub use schema_registry::MessageMetadata;
