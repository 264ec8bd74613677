//! Message traits and static per-type options.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::Envelope;

/// A message that can travel inside an [`Envelope`].
///
/// Object safe so envelopes can carry any message type behind an `Arc`.
/// Implemented by `#[derive(Message)]`; a manual impl only needs a stable
/// type name and an `as_any` passthrough.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// The routing key for this message's type.
    fn message_type(&self) -> &'static str;

    /// Upcast for downcasting to the concrete type inside handlers.
    fn as_any(&self) -> &dyn Any;
}

/// Static description of a message type, available without an instance.
pub trait MessageDescriptor: Message + Sized {
    /// The routing key, identical to what [`Message::message_type`] returns.
    const MESSAGE_TYPE: &'static str;

    /// Options declared for this type (dedicated local queue, envelope rules).
    fn options() -> MessageOptions {
        MessageOptions::new()
    }
}

/// A rule applied to every outgoing envelope carrying a given message type.
pub trait ModifyEnvelope: Send + Sync {
    fn modify(&self, envelope: &mut Envelope);
}

impl<F> ModifyEnvelope for F
where
    F: Fn(&mut Envelope) + Send + Sync,
{
    fn modify(&self, envelope: &mut Envelope) {
        self(envelope)
    }
}

/// Stamps a fixed header on the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetHeader {
    key: String,
    value: String,
}

impl SetHeader {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ModifyEnvelope for SetHeader {
    fn modify(&self, envelope: &mut Envelope) {
        envelope
            .headers
            .insert(self.key.clone(), self.value.clone());
    }
}

/// Static configuration declared for one message type.
#[derive(Clone, Default)]
pub struct MessageOptions {
    local_queue: Option<String>,
    rules: Vec<Arc<dyn ModifyEnvelope>>,
}

impl MessageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route local deliveries of this type to a dedicated named queue.
    pub fn with_local_queue(mut self, queue: impl Into<String>) -> Self {
        self.local_queue = Some(queue.into());
        self
    }

    /// Append an envelope rule. Rules run in declaration order.
    pub fn modify_with(mut self, rule: impl ModifyEnvelope + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn local_queue(&self) -> Option<&str> {
        self.local_queue.as_deref()
    }

    pub fn rules(&self) -> &[Arc<dyn ModifyEnvelope>] {
        &self.rules
    }

    /// Merge another set of options into this one. A local queue declared by
    /// `other` wins; rules are appended after the existing ones.
    pub fn merge(mut self, other: MessageOptions) -> Self {
        if other.local_queue.is_some() {
            self.local_queue = other.local_queue;
        }
        self.rules.extend(other.rules);
        self
    }
}

impl fmt::Debug for MessageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageOptions")
            .field("local_queue", &self.local_queue)
            .field("rules", &self.rules.len())
            .finish()
    }
}
