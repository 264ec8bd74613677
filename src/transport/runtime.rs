//! Registry of transports and statically configured subscribers.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{
    local_queue_uri, ListenerOptions, ListeningAgent, SendingAgent, SubscriberAgent, Transport,
    TransportAgent, TransportError, TransportUri,
};
use crate::envelope::MessageDescriptor;
use crate::routing::CopyOnWriteMap;
use crate::tracking::MessageLogger;

/// Transport lookups the router depends on.
pub trait TransportRuntime: Send + Sync {
    /// Cached sending agent for a URI, built through its transport on first use.
    fn get_or_build_sending_agent(
        &self,
        uri: &TransportUri,
    ) -> Result<Arc<dyn SendingAgent>, TransportError>;

    /// Statically configured remote subscribers of a message type.
    fn find_subscribers(
        &self,
        message_type: &str,
    ) -> Result<Vec<Arc<dyn SendingAgent>>, TransportError>;

    /// Local subscribers of a message type.
    fn find_local_subscribers(
        &self,
        message_type: &str,
    ) -> Result<Vec<Arc<dyn SendingAgent>>, TransportError>;

    /// Agent delivering to the named local queue.
    fn agent_for_local_queue(&self, name: &str) -> Result<Arc<dyn SendingAgent>, TransportError>;
}

#[derive(Debug, Clone)]
struct Subscription {
    message_type: String,
    uri: TransportUri,
    accepted: Vec<String>,
}

impl Subscription {
    fn matches(&self, message_type: &str) -> bool {
        self.message_type == message_type
    }
}

/// Default [`TransportRuntime`]: transports keyed by scheme plus publish rules.
///
/// ```
/// use std::sync::Arc;
/// use courier::transport::{LoopbackTransport, TransportUri, Transports};
/// use courier::tracking::TrackingSession;
///
/// let transports = Transports::new(Arc::new(TrackingSession::new("svc")))
///     .with_transport(LoopbackTransport::loopback().with_queue("orders"))
///     .publish("OrderPlaced", TransportUri::parse("loopback://orders").unwrap());
/// assert_eq!(transports.subscriber_uris("OrderPlaced").len(), 1);
/// ```
pub struct Transports {
    transports: BTreeMap<String, Arc<dyn Transport>>,
    subscriptions: Vec<Subscription>,
    local_subscriptions: Vec<Subscription>,
    agents: CopyOnWriteMap<TransportUri, Arc<dyn SendingAgent>>,
    logger: Arc<dyn MessageLogger>,
}

impl Transports {
    pub fn new(logger: Arc<dyn MessageLogger>) -> Self {
        Self {
            transports: BTreeMap::new(),
            subscriptions: Vec::new(),
            local_subscriptions: Vec::new(),
            agents: CopyOnWriteMap::new(),
            logger,
        }
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.add_transport(Arc::new(transport));
        self
    }

    /// Register a transport, replacing any previous one for the same scheme.
    pub fn add_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transports
            .insert(transport.protocol().to_ascii_lowercase(), transport);
        self.agents.clear();
    }

    /// Publish every message of `message_type` to `uri`.
    pub fn publish(mut self, message_type: impl Into<String>, uri: TransportUri) -> Self {
        self.add_subscription(message_type.into(), uri, Vec::new());
        self
    }

    /// Publish messages of type `T` to `uri`.
    pub fn publish_message<T: MessageDescriptor>(self, uri: TransportUri) -> Self {
        self.publish(T::MESSAGE_TYPE, uri)
    }

    /// Publish to a subscriber that only accepts the listed content types.
    pub fn publish_accepting(
        mut self,
        message_type: impl Into<String>,
        uri: TransportUri,
        accepted: Vec<String>,
    ) -> Self {
        self.add_subscription(message_type.into(), uri, accepted);
        self
    }

    /// Deliver messages of `message_type` to a local queue.
    pub fn subscribe_locally(mut self, message_type: impl Into<String>, queue: &str) -> Self {
        self.local_subscriptions.push(Subscription {
            message_type: message_type.into(),
            uri: local_queue_uri(queue),
            accepted: Vec::new(),
        });
        self
    }

    pub fn logger(&self) -> &Arc<dyn MessageLogger> {
        &self.logger
    }

    pub fn replace_logger(&mut self, logger: Arc<dyn MessageLogger>) {
        self.logger = logger;
        self.agents.clear();
    }

    pub fn transport_for(&self, uri: &TransportUri) -> Result<&Arc<dyn Transport>, TransportError> {
        self.transports
            .get(uri.scheme())
            .ok_or_else(|| TransportError::UnknownProtocol(uri.scheme().to_string()))
    }

    pub fn build_listening_agent(
        &self,
        uri: &TransportUri,
        options: &ListenerOptions,
    ) -> Result<Box<dyn ListeningAgent>, TransportError> {
        self.transport_for(uri)?.build_listening_agent(uri, options)
    }

    /// URIs of the static remote subscribers of a message type.
    pub fn subscriber_uris(&self, message_type: &str) -> Vec<TransportUri> {
        self.subscriptions
            .iter()
            .filter(|s| s.matches(message_type))
            .map(|s| s.uri.clone())
            .collect()
    }

    /// Reply channels advertised across every registered transport, in
    /// protocol order.
    pub fn reply_uris(&self) -> Vec<TransportUri> {
        self.transports
            .values()
            .fold(Vec::new(), |candidates, transport| {
                transport.validate_and_choose_reply_channel(&candidates)
            })
    }

    /// Forget cached sending agents.
    pub fn clear_agents(&self) {
        self.agents.clear();
    }

    fn add_subscription(&mut self, message_type: String, uri: TransportUri, accepted: Vec<String>) {
        debug!(message_type = %message_type, destination = %uri, "subscriber registered");
        self.subscriptions.push(Subscription {
            message_type,
            uri,
            accepted,
        });
    }

    fn agents_for(
        &self,
        subscriptions: &[Subscription],
        message_type: &str,
    ) -> Result<Vec<Arc<dyn SendingAgent>>, TransportError> {
        subscriptions
            .iter()
            .filter(|s| s.matches(message_type))
            .map(|s| {
                let agent = self.get_or_build_sending_agent(&s.uri)?;
                Ok(if s.accepted.is_empty() {
                    agent
                } else {
                    Arc::new(SubscriberAgent::new(agent, s.accepted.clone())) as Arc<dyn SendingAgent>
                })
            })
            .collect()
    }
}

impl TransportRuntime for Transports {
    fn get_or_build_sending_agent(
        &self,
        uri: &TransportUri,
    ) -> Result<Arc<dyn SendingAgent>, TransportError> {
        if let Some(agent) = self.agents.get(uri) {
            return Ok(agent);
        }

        let sender = self.transport_for(uri)?.build_sender(uri)?;
        let agent: Arc<dyn SendingAgent> =
            Arc::new(TransportAgent::new(sender, Arc::clone(&self.logger)));
        Ok(self.agents.get_or_insert(uri.clone(), agent))
    }

    fn find_subscribers(
        &self,
        message_type: &str,
    ) -> Result<Vec<Arc<dyn SendingAgent>>, TransportError> {
        self.agents_for(&self.subscriptions, message_type)
    }

    fn find_local_subscribers(
        &self,
        message_type: &str,
    ) -> Result<Vec<Arc<dyn SendingAgent>>, TransportError> {
        self.agents_for(&self.local_subscriptions, message_type)
    }

    fn agent_for_local_queue(&self, name: &str) -> Result<Arc<dyn SendingAgent>, TransportError> {
        self.get_or_build_sending_agent(&local_queue_uri(name))
    }
}
