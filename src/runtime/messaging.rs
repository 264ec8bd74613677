//! Messaging runtime facade.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use super::{HandlerPipeline, MessagingSettings};
use crate::durability::{EnvelopeStore, InMemoryEnvelopeStore, PollerStats, ScheduledJobPoller};
use crate::envelope::{Envelope, Message, MessageDescriptor};
use crate::error::BusError;
use crate::handlers::{HandlerGraph, HandlerResult, InvocationContext};
use crate::routing::{MessageRouter, MessageTypeRegistry, RoutingError, Serializers};
use crate::tracking::{CompositeLogger, MessageLogger, TracingLogger};
use crate::transport::{
    local_queue_uri, ListenerOptions, ListenerStats, ListeningAgent, LoopbackQueue,
    LoopbackTransport, Transport, TransportUri, Transports,
};

/// Rounds [`MessagingRuntime::drain_local_queues`] runs before giving up.
const MAX_DRAIN_ROUNDS: usize = 1_000;

/// Statistics returned by [`MessagingRuntime::shutdown`].
#[derive(Debug, Default, Clone)]
pub struct RuntimeStats {
    pub listeners: Vec<(TransportUri, ListenerStats)>,
    pub poller: PollerStats,
}

impl RuntimeStats {
    /// Envelopes received across all listeners.
    pub fn received(&self) -> usize {
        self.listeners.iter().map(|(_, stats)| stats.received).sum()
    }
}

/// A configured message bus for one service.
///
/// ## Example
///
/// ```ignore
/// let runtime = MessagingRuntime::builder(MessagingSettings::new("billing"))
///     .handle(|invoice: &InvoiceCreated, _ctx: &InvocationContext| {
///         println!("invoice {}", invoice.id);
///         Ok(Cascade::none())
///     })
///     .publish_message::<InvoiceCreated>(TransportUri::parse("loopback://remote")?)
///     .build()?;
///
/// runtime.start()?;
/// runtime.publish(InvoiceCreated { id: 1 })?;
/// let stats = runtime.shutdown();
/// ```
pub struct MessagingRuntime {
    pipeline: Arc<HandlerPipeline>,
    local_queues: BTreeMap<String, LoopbackQueue>,
    listen_to: Vec<TransportUri>,
    listeners: Mutex<Vec<Box<dyn ListeningAgent>>>,
    poller: Mutex<Option<ScheduledJobPoller>>,
}

impl MessagingRuntime {
    pub fn builder(settings: MessagingSettings) -> MessagingRuntimeBuilder {
        MessagingRuntimeBuilder::new(settings)
    }

    /// Publish a message to every route of its type.
    pub fn publish(&self, message: impl Message) -> Result<Vec<Envelope>, BusError> {
        self.publish_envelope(Envelope::new(message))
    }

    /// Route and send a prepared envelope.
    pub fn publish_envelope(&self, envelope: Envelope) -> Result<Vec<Envelope>, BusError> {
        self.pipeline.dispatch(envelope)
    }

    /// Send a message to an explicit destination.
    pub fn send(&self, destination: TransportUri, message: impl Message) -> Result<Envelope, BusError> {
        let sent = self.pipeline.dispatch(Envelope::new(message).with_destination(destination))?;
        sent.into_iter()
            .next()
            .ok_or_else(|| RoutingError::MissingDestination.into())
    }

    /// Execute the local chain for a message on the caller's thread.
    pub fn invoke(&self, message: impl Message) -> Result<(), BusError> {
        self.pipeline.invoke(Envelope::new(message))
    }

    /// Start listeners for every local queue and `listen_to` address, and
    /// the scheduled job poller.
    pub fn start(&self) -> Result<(), BusError> {
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| BusError::LockPoisoned("start"))?;
        let mut poller = self
            .poller
            .lock()
            .map_err(|_| BusError::LockPoisoned("start"))?;
        if !listeners.is_empty() || poller.is_some() {
            return Err(BusError::AlreadyStarted);
        }

        let options = self.pipeline.settings().listener_options();
        let addresses = self
            .local_queues
            .keys()
            .map(|name| local_queue_uri(name))
            .chain(self.listen_to.iter().cloned());

        let mut started: Vec<Box<dyn ListeningAgent>> = Vec::new();
        for address in addresses {
            match self.start_listener(&address, &options) {
                Ok(agent) => started.push(agent),
                Err(err) => {
                    for mut agent in started {
                        agent.stop();
                    }
                    return Err(err);
                }
            }
        }
        *listeners = started;

        let pipeline = Arc::clone(&self.pipeline);
        *poller = Some(ScheduledJobPoller::spawn(
            Arc::clone(self.pipeline.store()),
            move |envelope: Envelope| pipeline.dispatch(envelope).map(|_| ()),
            self.pipeline.settings().poller_options(),
        ));

        info!(
            service = %self.pipeline.settings().service_name,
            listeners = listeners.len(),
            "messaging runtime started"
        );
        Ok(())
    }

    fn start_listener(
        &self,
        address: &TransportUri,
        options: &ListenerOptions,
    ) -> Result<Box<dyn ListeningAgent>, BusError> {
        let mut agent = self
            .pipeline
            .transports()
            .build_listening_agent(address, options)?;
        let receiver = Arc::clone(&self.pipeline);
        agent.start(receiver)?;
        Ok(agent)
    }

    /// Stop every listener and the poller. In-progress dispatches finish.
    pub fn shutdown(&self) -> RuntimeStats {
        let mut stats = RuntimeStats::default();

        let agents: Vec<Box<dyn ListeningAgent>> = match self.listeners.lock() {
            Ok(mut listeners) => listeners.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for mut agent in agents {
            let address = agent.address().clone();
            stats.listeners.push((address, agent.stop()));
        }

        let poller = match self.poller.lock() {
            Ok(mut poller) => poller.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(poller) = poller {
            stats.poller = poller.stop();
        }

        stats
    }

    /// Synchronously dispatch everything waiting on the local queues,
    /// including envelopes cascaded or requeued while draining.
    pub fn drain_local_queues(&self) -> Result<usize, BusError> {
        let mut total = 0;
        for _ in 0..MAX_DRAIN_ROUNDS {
            let mut round = 0;
            for queue in self.local_queues.values() {
                round += queue.drain_into(self.pipeline.as_ref())?;
            }
            if round == 0 {
                break;
            }
            total += round;
        }
        Ok(total)
    }

    /// Resubmit due scheduled envelopes now.
    pub fn run_scheduled_jobs(&self) -> PollerStats {
        let pipeline = Arc::clone(&self.pipeline);
        let resubmit = move |envelope: Envelope| pipeline.dispatch(envelope).map(|_| ());
        ScheduledJobPoller::poll_once(
            self.pipeline.store().as_ref(),
            &resubmit,
            std::time::SystemTime::now(),
        )
    }

    pub fn local_queue(&self, name: &str) -> Option<&LoopbackQueue> {
        self.local_queues.get(name)
    }

    pub fn router(&self) -> &MessageRouter {
        self.pipeline.router()
    }

    pub fn transports(&self) -> &Transports {
        self.pipeline.transports()
    }

    pub fn store(&self) -> &Arc<dyn EnvelopeStore> {
        self.pipeline.store()
    }

    pub fn settings(&self) -> &MessagingSettings {
        self.pipeline.settings()
    }

    /// The receiver that executes handler chains.
    pub fn pipeline(&self) -> &Arc<HandlerPipeline> {
        &self.pipeline
    }
}

impl Drop for MessagingRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for [`MessagingRuntime`].
pub struct MessagingRuntimeBuilder {
    settings: MessagingSettings,
    handlers: HandlerGraph,
    serializers: Serializers,
    types: MessageTypeRegistry,
    transports: Vec<Arc<dyn Transport>>,
    loopback: LoopbackTransport,
    publish_rules: Vec<(String, TransportUri, Vec<String>)>,
    local_subscriptions: Vec<(String, String)>,
    listen_to: Vec<TransportUri>,
    store: Option<Arc<dyn EnvelopeStore>>,
    loggers: Vec<Arc<dyn MessageLogger>>,
}

impl MessagingRuntimeBuilder {
    pub fn new(settings: MessagingSettings) -> Self {
        Self {
            settings,
            handlers: HandlerGraph::new(),
            serializers: Serializers::new(),
            types: MessageTypeRegistry::new(),
            transports: Vec::new(),
            loopback: LoopbackTransport::loopback(),
            publish_rules: Vec::new(),
            local_subscriptions: Vec::new(),
            listen_to: Vec::new(),
            store: None,
            loggers: Vec::new(),
        }
    }

    /// Register a handler for message type `T`.
    pub fn handle<T, F>(mut self, handler: F) -> Self
    where
        T: MessageDescriptor,
        F: Fn(&T, &InvocationContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers = self.handlers.handle(handler);
        self
    }

    /// Replace the handler graph. Its default maximum attempts are taken
    /// from the settings.
    pub fn handlers(mut self, handlers: HandlerGraph) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn serializers(mut self, serializers: Serializers) -> Self {
        self.serializers = serializers;
        self
    }

    pub fn message_types(mut self, types: MessageTypeRegistry) -> Self {
        self.types = types;
        self
    }

    /// Register a message type's declared options without a handler.
    pub fn register<T: MessageDescriptor>(mut self) -> Self {
        self.types = self.types.register::<T>();
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transports.push(Arc::new(transport));
        self
    }

    /// Add a named loopback queue.
    pub fn local_queue(mut self, name: &str) -> Self {
        self.loopback.add_queue(name);
        self
    }

    pub fn publish(mut self, message_type: impl Into<String>, uri: TransportUri) -> Self {
        self.publish_rules.push((message_type.into(), uri, Vec::new()));
        self
    }

    pub fn publish_message<T: MessageDescriptor>(self, uri: TransportUri) -> Self {
        self.publish(T::MESSAGE_TYPE, uri)
    }

    pub fn publish_accepting(
        mut self,
        message_type: impl Into<String>,
        uri: TransportUri,
        accepted: Vec<String>,
    ) -> Self {
        self.publish_rules.push((message_type.into(), uri, accepted));
        self
    }

    pub fn subscribe_locally(mut self, message_type: impl Into<String>, queue: &str) -> Self {
        self.loopback.add_queue(queue);
        self.local_subscriptions
            .push((message_type.into(), queue.to_string()));
        self
    }

    /// Listen to an additional address when started.
    pub fn listen_to(mut self, uri: TransportUri) -> Self {
        self.listen_to.push(uri);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn EnvelopeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add a tracking sink next to the default tracing sink.
    pub fn with_logger(mut self, logger: Arc<dyn MessageLogger>) -> Self {
        self.loggers.push(logger);
        self
    }

    pub fn build(self) -> Result<MessagingRuntime, BusError> {
        self.settings.validate()?;
        let settings = self.settings;

        let handlers = Arc::new(
            self.handlers
                .default_maximum_attempts(settings.default_maximum_attempts)
                .compile()?,
        );

        let mut types = self.types;
        for (message_type, options) in handlers.message_options() {
            if types.options_for(message_type).is_none() {
                types.configure(message_type, options.clone());
            }
        }

        let mut loopback = self.loopback;
        for queue in types.local_queues() {
            loopback.add_queue(queue);
        }
        let local_queues: BTreeMap<String, LoopbackQueue> = loopback
            .settings()
            .connection_names()
            .filter_map(|name| Some((name.to_string(), loopback.queue(name)?.clone())))
            .collect();

        let logger: Arc<dyn MessageLogger> = Arc::new(
            self.loggers.into_iter().fold(
                CompositeLogger::new().with(Arc::new(TracingLogger::new(&settings.service_name))),
                CompositeLogger::with,
            ),
        );

        let mut transports = Transports::new(Arc::clone(&logger)).with_transport(loopback);
        for transport in self.transports {
            transports.add_transport(transport);
        }
        for (message_type, uri, accepted) in self.publish_rules {
            transports = transports.publish_accepting(message_type, uri, accepted);
        }
        for (message_type, queue) in self.local_subscriptions {
            transports = transports.subscribe_locally(message_type, &queue);
        }
        let transports = Arc::new(transports);

        let serializers = Arc::new(self.serializers);
        let router = MessageRouter::new(
            settings.service_name.clone(),
            serializers.clone(),
            transports.clone(),
            handlers.clone(),
            types,
            Arc::clone(&logger),
        );

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryEnvelopeStore::new()));

        info!(
            service = %settings.service_name,
            handlers = handlers.len(),
            local_queues = local_queues.len(),
            "messaging runtime built"
        );

        let pipeline = HandlerPipeline::new(
            settings,
            router,
            transports,
            handlers,
            serializers,
            store,
            logger,
        );

        Ok(MessagingRuntime {
            pipeline: Arc::new(pipeline),
            local_queues,
            listen_to: self.listen_to,
            listeners: Mutex::new(Vec::new()),
            poller: Mutex::new(None),
        })
    }
}
