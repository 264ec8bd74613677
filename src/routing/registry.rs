use std::collections::HashMap;

use crate::envelope::{MessageDescriptor, MessageOptions, ModifyEnvelope};

/// Static per-type options: dedicated local queue and envelope rules.
///
/// Built at startup from `#[derive(Message)]` declarations and explicit
/// registrations; read-only once handed to the router.
#[derive(Debug, Clone, Default)]
pub struct MessageTypeRegistry {
    options: HashMap<String, MessageOptions>,
}

impl MessageTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the options `T` declares.
    pub fn register<T: MessageDescriptor>(mut self) -> Self {
        self.configure(T::MESSAGE_TYPE, T::options());
        self
    }

    /// Add an envelope rule for `T` after the declared ones.
    pub fn modify<T: MessageDescriptor>(mut self, rule: impl ModifyEnvelope + 'static) -> Self {
        self.configure(T::MESSAGE_TYPE, MessageOptions::new().modify_with(rule));
        self
    }

    /// Route local deliveries of `T` to a named queue.
    pub fn local_queue<T: MessageDescriptor>(mut self, queue: &str) -> Self {
        self.configure(T::MESSAGE_TYPE, MessageOptions::new().with_local_queue(queue));
        self
    }

    /// Merge options into a message type's existing options.
    pub fn configure(&mut self, message_type: &str, options: MessageOptions) {
        let merged = match self.options.remove(message_type) {
            Some(existing) => existing.merge(options),
            None => options,
        };
        self.options.insert(message_type.to_string(), merged);
    }

    pub fn options_for(&self, message_type: &str) -> Option<&MessageOptions> {
        self.options.get(message_type)
    }

    pub fn local_queue_for(&self, message_type: &str) -> Option<&str> {
        self.options_for(message_type)?.local_queue()
    }

    /// Every dedicated local queue name, deduplicated.
    pub fn local_queues(&self) -> Vec<&str> {
        let mut queues: Vec<&str> = self
            .options
            .values()
            .filter_map(|o| o.local_queue())
            .collect();
        queues.sort_unstable();
        queues.dedup();
        queues
    }
}
