//! Explicit request/message context.
//!
//! The original threads correlation/causation ids implicitly through
//! `context.Context` values stashed under package-private keys. Rust has no
//! ambient context type with that shape, so per the "Context propagation"
//! design note this crate takes the explicit-struct path: a [`MessageContext`]
//! is built by the publish pipeline and handed to both outbound middleware
//! and inbound handlers instead of being smuggled through a generic context
//! bag.

/// Identifiers threaded through one message's lifecycle: the id assigned to
/// it, the id of the message that caused it (if any), and the correlation id
/// shared by the whole causal chain.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    message_id: Option<String>,
    correlation_id: Option<String>,
    causation_id: Option<String>,
    trace_context: Option<String>,
}

impl MessageContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the context a *new* outbound message should carry when
    /// published from within a handler processing `self`: the causation id
    /// becomes the inbound message's id, and the correlation id is inherited
    /// unchanged, chaining an unbroken correlation id across nested publishes.
    /// For a root publish (empty `self`), both default to the new message's
    /// own id, matching the envelope-level default applied when no context
    /// is supplied.
    pub fn derive_for_publish(&self, new_message_id: &str) -> Self {
        Self {
            message_id: Some(new_message_id.to_string()),
            correlation_id: self
                .correlation_id
                .clone()
                .or_else(|| self.message_id.clone())
                .or_else(|| Some(new_message_id.to_string())),
            causation_id: self
                .message_id
                .clone()
                .or_else(|| Some(new_message_id.to_string())),
            trace_context: self.trace_context.clone(),
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn trace_context(&self) -> Option<&str> {
        self.trace_context.as_deref()
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.causation_id = Some(id.into());
        self
    }

    pub fn with_trace_context(mut self, ctx: impl Into<String>) -> Self {
        self.trace_context = Some(ctx.into());
        self
    }

    /// Build a [`MessageContext`] from an inbound envelope's extension
    /// attributes, as seen by a handler processing a delivered message.
    pub fn from_envelope(envelope: &crate::envelope::Envelope) -> Self {
        Self {
            message_id: Some(envelope.id().to_string()),
            correlation_id: envelope.correlation_id(),
            causation_id: envelope.causation_id(),
            trace_context: envelope.trace_context(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_publish_correlates_and_causes_itself() {
        let ctx = MessageContext::new().derive_for_publish("msg-1");
        assert_eq!(ctx.message_id(), Some("msg-1"));
        assert_eq!(ctx.correlation_id(), Some("msg-1"));
        assert_eq!(ctx.causation_id(), Some("msg-1"));
    }

    #[test]
    fn nested_publish_inherits_correlation_and_chains_causation() {
        let root = MessageContext::new().derive_for_publish("msg-1");
        let nested = root.derive_for_publish("msg-2");
        assert_eq!(nested.message_id(), Some("msg-2"));
        assert_eq!(nested.correlation_id(), Some("msg-1"));
        assert_eq!(nested.causation_id(), Some("msg-1"));

        let grandchild = nested.derive_for_publish("msg-3");
        assert_eq!(grandchild.correlation_id(), Some("msg-1"));
        assert_eq!(grandchild.causation_id(), Some("msg-2"));
    }

    #[test]
    fn from_envelope_captures_extensions() {
        let envelope = crate::envelope::Envelope::builder("id-1", "org.example.thing", "svc://orders")
            .correlation_id("corr-1")
            .causation_id("cause-1")
            .build()
            .unwrap();
        let ctx = MessageContext::from_envelope(&envelope);
        assert_eq!(ctx.message_id(), Some("id-1"));
        assert_eq!(ctx.correlation_id(), Some("corr-1"));
        assert_eq!(ctx.causation_id(), Some("cause-1"));
    }
}
