//! Static handler registration.

use std::collections::HashMap;
use std::sync::Arc;

use super::chain::HandlerFn;
use super::{ConfigurationError, HandlerChain, HandlerError, HandlerResult, InvocationContext};
use crate::envelope::{MessageDescriptor, MessageOptions};
use crate::retry::{ErrorAction, FailureMatch, RetryPolicy};

struct Registration {
    message_type: &'static str,
    options: MessageOptions,
    handlers: Vec<HandlerFn>,
}

#[derive(Default)]
struct ChainSettings {
    retries: RetryPolicy,
    maximum_attempts: Option<u32>,
}

/// Builder for the handler chains of a service.
///
/// Handlers are kept in registration order per message type. Chain settings
/// for a type without handlers are a configuration error at [`compile`].
///
/// [`compile`]: HandlerGraph::compile
pub struct HandlerGraph {
    registrations: Vec<Registration>,
    settings: HashMap<&'static str, ChainSettings>,
    retries: RetryPolicy,
    default_maximum_attempts: u32,
}

impl Default for HandlerGraph {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
            settings: HashMap::new(),
            retries: RetryPolicy::new(),
            default_maximum_attempts: 1,
        }
    }
}

impl HandlerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for message type `T`, after any already
    /// registered for it.
    pub fn handle<T, F>(mut self, handler: F) -> Self
    where
        T: MessageDescriptor,
        F: Fn(&T, &InvocationContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        let handler: HandlerFn = Arc::new(move |envelope, context| {
            let message = envelope
                .message_as::<T>()
                .ok_or_else(|| HandlerError::UnreadableBody(T::MESSAGE_TYPE.to_string()))?;
            handler(message, context).map_err(HandlerError::Failed)
        });

        match self
            .registrations
            .iter_mut()
            .find(|r| r.message_type == T::MESSAGE_TYPE)
        {
            Some(registration) => registration.handlers.push(handler),
            None => self.registrations.push(Registration {
                message_type: T::MESSAGE_TYPE,
                options: T::options(),
                handlers: vec![handler],
            }),
        }
        self
    }

    /// Retry rules that apply only to the chain for `T`.
    pub fn chain_retries<T: MessageDescriptor>(mut self, policy: RetryPolicy) -> Self {
        let settings = self.settings.entry(T::MESSAGE_TYPE).or_default();
        for rule in policy.rules() {
            settings.retries.add(rule.matcher.clone(), rule.action);
        }
        self
    }

    pub fn maximum_attempts<T: MessageDescriptor>(mut self, attempts: u32) -> Self {
        self.settings.entry(T::MESSAGE_TYPE).or_default().maximum_attempts = Some(attempts);
        self
    }

    /// Global rule consulted after every chain's own rules.
    pub fn on_failure(mut self, matcher: FailureMatch, action: ErrorAction) -> Self {
        self.retries.add(matcher, action);
        self
    }

    /// Maximum attempts for chains that do not set their own.
    pub fn default_maximum_attempts(mut self, attempts: u32) -> Self {
        self.default_maximum_attempts = attempts;
        self
    }

    pub fn message_types(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.message_type)
    }

    /// Build the immutable chains.
    pub fn compile(self) -> Result<HandlerChains, ConfigurationError> {
        if self.default_maximum_attempts == 0 {
            return Err(ConfigurationError::InvalidMaximumAttempts("default".to_string()));
        }

        let mut settings = self.settings;
        let mut chains = HashMap::with_capacity(self.registrations.len());
        let mut options = HashMap::with_capacity(self.registrations.len());

        for registration in self.registrations {
            let ChainSettings {
                retries,
                maximum_attempts,
            } = settings.remove(registration.message_type).unwrap_or_default();
            let maximum_attempts = maximum_attempts.unwrap_or(self.default_maximum_attempts);
            if maximum_attempts == 0 {
                return Err(ConfigurationError::InvalidMaximumAttempts(
                    registration.message_type.to_string(),
                ));
            }

            options.insert(registration.message_type.to_string(), registration.options);
            chains.insert(
                registration.message_type.to_string(),
                Arc::new(HandlerChain::new(
                    registration.message_type.to_string(),
                    registration.handlers,
                    retries,
                    maximum_attempts,
                )),
            );
        }

        if let Some(orphan) = settings.keys().min() {
            return Err(ConfigurationError::NoHandlers(orphan.to_string()));
        }

        Ok(HandlerChains {
            chains,
            options,
            retries: self.retries,
            default_maximum_attempts: self.default_maximum_attempts,
        })
    }
}

/// Compiled handler chains, keyed by message type.
pub struct HandlerChains {
    chains: HashMap<String, Arc<HandlerChain>>,
    options: HashMap<String, MessageOptions>,
    retries: RetryPolicy,
    default_maximum_attempts: u32,
}

impl Default for HandlerChains {
    fn default() -> Self {
        Self {
            chains: HashMap::new(),
            options: HashMap::new(),
            retries: RetryPolicy::new(),
            default_maximum_attempts: 1,
        }
    }
}

impl HandlerChains {
    pub fn chain_for(&self, message_type: &str) -> Option<Arc<HandlerChain>> {
        self.chains.get(message_type).cloned()
    }

    pub fn can_handle(&self, message_type: &str) -> bool {
        self.chains.contains_key(message_type)
    }

    /// Global retry rules.
    pub fn retries(&self) -> &RetryPolicy {
        &self.retries
    }

    pub fn default_maximum_attempts(&self) -> u32 {
        self.default_maximum_attempts
    }

    /// Static options declared by every handled message type.
    pub fn message_options(&self) -> impl Iterator<Item = (&str, &MessageOptions)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn message_types(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
