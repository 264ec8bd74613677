//! Message router with copy-on-write route caches.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::serializers::JSON;
use super::{
    CopyOnWriteMap, MessageRoute, MessageTypeRegistry, RoutingError, SerializerGraph,
    WriterCollection,
};
use crate::envelope::{Envelope, ModifyEnvelope};
use crate::handlers::HandlerChains;
use crate::tracking::{MessageLogger, SubscriptionMismatch};
use crate::transport::{SendingAgent, TransportRuntime, DEFAULT_QUEUE};

type EnvelopeRules = Arc<[Arc<dyn ModifyEnvelope>]>;

/// Resolves where messages go.
///
/// Compiled routes, local queue agents and envelope rules are cached per
/// message type in [`CopyOnWriteMap`]s. Compilation only reads static
/// configuration, so a race between two compilations of the same type is
/// wasted work and whichever result is cached first is kept.
pub struct MessageRouter {
    service_name: String,
    serializers: Arc<dyn SerializerGraph>,
    transports: Arc<dyn TransportRuntime>,
    handlers: Arc<HandlerChains>,
    types: MessageTypeRegistry,
    logger: Arc<dyn MessageLogger>,
    routes: CopyOnWriteMap<String, Arc<[MessageRoute]>>,
    local_queues: CopyOnWriteMap<String, Arc<dyn SendingAgent>>,
    rules: CopyOnWriteMap<String, EnvelopeRules>,
}

impl MessageRouter {
    pub fn new(
        service_name: impl Into<String>,
        serializers: Arc<dyn SerializerGraph>,
        transports: Arc<dyn TransportRuntime>,
        handlers: Arc<HandlerChains>,
        types: MessageTypeRegistry,
        logger: Arc<dyn MessageLogger>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            serializers,
            transports,
            handlers,
            types,
            logger,
            routes: CopyOnWriteMap::new(),
            local_queues: CopyOnWriteMap::new(),
            rules: CopyOnWriteMap::new(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn types(&self) -> &MessageTypeRegistry {
        &self.types
    }

    /// Cached routes for a message type, compiled on first use.
    pub fn route_type(&self, message_type: &str) -> Result<Arc<[MessageRoute]>, RoutingError> {
        if let Some(routes) = self.routes.get(message_type) {
            return Ok(routes);
        }

        let compiled: Arc<[MessageRoute]> = self.compile(message_type)?.into();
        debug!(
            message_type,
            routes = compiled.len(),
            "compiled routes"
        );
        Ok(self.routes.get_or_insert(message_type.to_string(), compiled))
    }

    fn compile(&self, message_type: &str) -> Result<Vec<MessageRoute>, RoutingError> {
        let writer = self.serializers.writer_for(message_type);
        let mut routes = Vec::new();

        for agent in self.transports.find_subscribers(message_type)? {
            match select_content_type(&writer, agent.as_ref()) {
                Some(content_type) => {
                    routes.push(MessageRoute::new(message_type, content_type, agent));
                }
                None => self.logger.subscription_mismatch(&SubscriptionMismatch {
                    message_type: message_type.to_string(),
                    destination: agent.destination().clone(),
                    supported: writer.content_types().to_vec(),
                    accepted: agent.accepted_content_types(),
                }),
            }
        }

        if routes.is_empty() && self.handlers.can_handle(message_type) {
            routes.push(self.create_local_route(message_type)?);
        }

        Ok(routes)
    }

    /// Route for an envelope with an explicit destination.
    ///
    /// Reuses a compiled route for the same destination when there is one,
    /// otherwise negotiates the content type from the envelope.
    pub fn route_for_destination(&self, envelope: &Envelope) -> Result<MessageRoute, RoutingError> {
        if !envelope.has_body() {
            return Err(RoutingError::MissingMessage);
        }
        let destination = envelope
            .destination
            .as_ref()
            .ok_or(RoutingError::MissingDestination)?;

        let Some(message) = &envelope.message else {
            let agent = self.transports.get_or_build_sending_agent(destination)?;
            let message_type = envelope
                .message_type()
                .ok_or(RoutingError::MissingMessageType)?;
            let content_type = envelope.content_type.as_deref().unwrap_or(JSON);
            return Ok(MessageRoute::new(message_type, content_type, agent));
        };

        let message_type = message.message_type();
        let routes = self.route_type(message_type)?;
        if let Some(route) = routes.iter().find(|r| r.matches_envelope(envelope)) {
            return Ok(route.clone());
        }

        let agent = self.transports.get_or_build_sending_agent(destination)?;
        let writer = self.serializers.writer_for(message_type);
        let content_type = envelope
            .content_type
            .clone()
            .or_else(|| {
                envelope
                    .accepted_content_types
                    .iter()
                    .find(|t| writer.supports(t))
                    .cloned()
            })
            .unwrap_or_else(|| JSON.to_string());

        Ok(MessageRoute::new(message_type, content_type, agent))
    }

    /// Expand an outgoing envelope into one envelope per destination.
    ///
    /// With an explicit destination there is exactly one clone with the same
    /// id. Otherwise the envelope fans out over the message type's routes; a
    /// single route keeps the id, several routes give every clone a fresh id.
    /// No routes yields an empty list.
    pub fn route(&self, mut envelope: Envelope) -> Result<Vec<Envelope>, RoutingError> {
        if !envelope.has_body() {
            return Err(RoutingError::MissingMessage);
        }
        self.apply_message_type_specific_rules(&mut envelope);

        if envelope.destination.is_some() {
            let route = self.route_for_destination(&envelope)?;
            let mut outgoing = route.clone_for_sending(&envelope);
            outgoing.source = Some(self.service_name.clone());
            return Ok(vec![outgoing]);
        }

        let message_type = envelope
            .message_type()
            .ok_or(RoutingError::MissingMessageType)?;
        let routes = self.route_type(message_type)?;
        let keep_id = routes.len() == 1;

        Ok(routes
            .iter()
            .map(|route| {
                let mut outgoing = route.clone_for_sending(&envelope);
                if !keep_id {
                    outgoing.id = Uuid::new_v4();
                }
                outgoing.source = Some(self.service_name.clone());
                outgoing
            })
            .collect())
    }

    /// Cached agent for local delivery of a message type: its dedicated
    /// queue, or the default local queue.
    pub fn local_queue_by_message_type(
        &self,
        message_type: &str,
    ) -> Result<Arc<dyn SendingAgent>, RoutingError> {
        if let Some(agent) = self.local_queues.get(message_type) {
            return Ok(agent);
        }

        let queue = self.types.local_queue_for(message_type).unwrap_or(DEFAULT_QUEUE);
        let agent = self.transports.agent_for_local_queue(queue)?;
        Ok(self.local_queues.get_or_insert(message_type.to_string(), agent))
    }

    /// Route to an in-process handler: the type's dedicated queue, else the
    /// first local subscriber, else the default local queue.
    pub fn create_local_route(&self, message_type: &str) -> Result<MessageRoute, RoutingError> {
        let agent = match self.types.local_queue_for(message_type) {
            Some(_) => self.local_queue_by_message_type(message_type)?,
            None => match self
                .transports
                .find_local_subscribers(message_type)?
                .into_iter()
                .next()
            {
                Some(subscriber) => subscriber,
                None => self.local_queue_by_message_type(message_type)?,
            },
        };

        let writer = self.serializers.writer_for(message_type);
        let content_type =
            select_content_type(&writer, agent.as_ref()).unwrap_or_else(|| JSON.to_string());
        Ok(MessageRoute::new(message_type, content_type, agent))
    }

    /// Apply the type's envelope rules, in declaration order.
    pub fn apply_message_type_specific_rules(&self, envelope: &mut Envelope) {
        let Some(message) = envelope.message.clone() else {
            return;
        };
        let message_type = message.message_type();

        let rules = match self.rules.get(message_type) {
            Some(rules) => rules,
            None => {
                let rules: EnvelopeRules = self
                    .types
                    .options_for(message_type)
                    .map(|o| o.rules().to_vec())
                    .unwrap_or_default()
                    .into();
                self.rules.get_or_insert(message_type.to_string(), rules)
            }
        };

        for rule in rules.iter() {
            rule.modify(envelope);
        }
    }

    /// Forget every cached route, local queue agent and rule set.
    pub fn clear_all(&self) {
        self.routes.clear();
        self.local_queues.clear();
        self.rules.clear();
    }
}

/// First supported non-fallback type the agent accepts, else the fallback.
fn select_content_type(writer: &WriterCollection, agent: &dyn SendingAgent) -> Option<String> {
    let accepted = || writer.content_types().iter().filter(|t| agent.accepts(t));

    accepted()
        .find(|t| t.as_str() != JSON)
        .or_else(|| accepted().find(|t| t.as_str() == JSON))
        .cloned()
}
