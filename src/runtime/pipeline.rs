//! Handler pipeline: execution, retry policy and tracking.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use super::MessagingSettings;
use crate::durability::EnvelopeStore;
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::handlers::{Cascade, HandlerChain, HandlerChains, HandlerError};
use crate::retry::{determine_action, ErrorAction};
use crate::routing::{MessageRouter, RoutingError, Serializers};
use crate::tracking::MessageLogger;
use crate::transport::{ChannelCallback, Receiver, TransportError, TransportRuntime, Transports};

/// Executes handler chains for received envelopes and routes outgoing ones.
pub struct HandlerPipeline {
    settings: MessagingSettings,
    router: MessageRouter,
    transports: Arc<Transports>,
    handlers: Arc<HandlerChains>,
    serializers: Arc<Serializers>,
    store: Arc<dyn EnvelopeStore>,
    logger: Arc<dyn MessageLogger>,
}

impl HandlerPipeline {
    pub(crate) fn new(
        settings: MessagingSettings,
        router: MessageRouter,
        transports: Arc<Transports>,
        handlers: Arc<HandlerChains>,
        serializers: Arc<Serializers>,
        store: Arc<dyn EnvelopeStore>,
        logger: Arc<dyn MessageLogger>,
    ) -> Self {
        Self {
            settings,
            router,
            transports,
            handlers,
            serializers,
            store,
            logger,
        }
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn transports(&self) -> &Transports {
        &self.transports
    }

    pub fn store(&self) -> &Arc<dyn EnvelopeStore> {
        &self.store
    }

    pub fn settings(&self) -> &MessagingSettings {
        &self.settings
    }

    /// Route an envelope and hand each resulting envelope to its agent.
    ///
    /// Returns the envelopes that were sent. An envelope with no routes is
    /// recorded as `NoRoutesFor` and yields an empty list; a rejected
    /// delivery is recorded as `Undeliverable` after its `Sent` and is not
    /// retried.
    pub fn dispatch(&self, envelope: Envelope) -> Result<Vec<Envelope>, BusError> {
        let unrouted = envelope.clone();
        let outgoing = self.router.route(envelope)?;

        if outgoing.is_empty() {
            self.logger.no_routes_for(&unrouted);
            return Ok(outgoing);
        }

        for envelope in &outgoing {
            let destination = envelope
                .destination
                .as_ref()
                .ok_or(RoutingError::MissingDestination)?;
            let agent = self.transports.get_or_build_sending_agent(destination)?;

            match agent.enqueue_outgoing(envelope.clone()) {
                Ok(()) => {}
                Err(err @ TransportError::Rejected(_)) => self.logger.undeliverable(envelope, &err),
                Err(err) => return Err(err.into()),
            }
        }

        Ok(outgoing)
    }

    /// Run the chain on the caller's thread.
    ///
    /// Only `RetryInline` applies; any other outcome records the failure and
    /// returns it.
    pub fn invoke(&self, mut envelope: Envelope) -> Result<(), BusError> {
        envelope.source = Some(self.settings.service_name.clone());
        let chain = match self.chain_for(&envelope) {
            Some(chain) => chain,
            None => {
                self.logger.no_handler_for(&envelope);
                let message_type = envelope.message_type().unwrap_or_default().to_string();
                return Err(HandlerError::NoHandlers(message_type).into());
            }
        };

        loop {
            envelope.attempts += 1;
            match self.execute(&chain, &envelope) {
                Ok(cascade) => {
                    self.logger.message_succeeded(&envelope);
                    return self.publish_cascade(&envelope, cascade);
                }
                Err(failure) => {
                    self.logger.message_failed(&envelope, &failure);
                    let action = self.determine_action(&chain, &envelope, &failure);
                    if action != ErrorAction::RetryInline {
                        return Err(failure.into());
                    }
                }
            }
        }
    }

    fn chain_for(&self, envelope: &Envelope) -> Option<Arc<HandlerChain>> {
        self.handlers.chain_for(envelope.message_type()?)
    }

    fn execute(&self, chain: &HandlerChain, envelope: &Envelope) -> Result<Cascade, HandlerError> {
        self.logger.execution_started(envelope);
        let started = Instant::now();
        let result = chain.invoke(envelope);
        self.logger.execution_finished(envelope);

        match self.settings.execution_timeout {
            Some(limit) if started.elapsed() > limit => Err(HandlerError::Timeout(limit)),
            _ => result,
        }
    }

    fn determine_action(
        &self,
        chain: &HandlerChain,
        envelope: &Envelope,
        failure: &HandlerError,
    ) -> ErrorAction {
        let action = determine_action(
            failure,
            envelope.attempts,
            chain.maximum_attempts(),
            chain.retries(),
            self.handlers.retries(),
        );
        debug!(
            envelope_id = %envelope.id,
            message_type = chain.message_type(),
            attempts = envelope.attempts,
            action = %action,
            "failure action selected"
        );
        action
    }

    fn publish_cascade(&self, parent: &Envelope, cascade: Cascade) -> Result<(), BusError> {
        for outgoing in cascade.into_outgoing() {
            let mut child = parent.for_cascade(outgoing.message);
            child.destination = outgoing.destination;
            self.dispatch(child)?;
        }
        Ok(())
    }

    fn reschedule(&self, mut envelope: Envelope, delay: Duration, callback: &dyn ChannelCallback) {
        if let Err(err) = self.serializers.write_envelope(&mut envelope) {
            debug!(envelope_id = %envelope.id, error = %err, "scheduling envelope without data");
        }

        let not_before = SystemTime::now() + delay;
        match self.store.schedule_envelope(envelope.clone(), not_before) {
            Ok(()) => settle(callback.complete(&envelope), &envelope),
            Err(err) => {
                warn!(envelope_id = %envelope.id, error = %err, "failed to schedule envelope, requeueing");
                let id = envelope.id;
                if let Err(err) = callback.requeue(envelope) {
                    warn!(envelope_id = %id, error = %err, "failed to requeue envelope");
                }
            }
        }
    }

    fn move_to_error_queue(
        &self,
        envelope: Envelope,
        failure: &dyn std::error::Error,
        callback: &dyn ChannelCallback,
    ) {
        self.logger.moved_to_error_queue(&envelope, failure);
        let reason = failure.to_string();

        if let Err(err) = self.store.move_to_dead_letter_storage(envelope.clone(), &reason) {
            warn!(envelope_id = %envelope.id, error = %err, "failed to store dead letter");
        }
        let id = envelope.id;
        if let Err(err) = callback.move_to_errors(envelope, &reason) {
            warn!(envelope_id = %id, error = %err, "failed to move envelope to error queue");
        }
    }
}

impl Receiver for HandlerPipeline {
    fn received(&self, mut envelope: Envelope, callback: &dyn ChannelCallback) {
        self.logger.received(&envelope);

        if let Err(err) = self.serializers.read_envelope(&mut envelope) {
            self.logger.message_failed(&envelope, &err);
            self.move_to_error_queue(envelope, &err, callback);
            return;
        }

        let Some(chain) = self.chain_for(&envelope) else {
            self.logger.no_handler_for(&envelope);
            self.logger.discarded_envelope(&envelope);
            settle(callback.complete(&envelope), &envelope);
            return;
        };

        loop {
            envelope.attempts += 1;

            let failure = match self.execute(&chain, &envelope) {
                Ok(cascade) => {
                    self.logger.message_succeeded(&envelope);
                    settle(callback.complete(&envelope), &envelope);
                    if let Err(err) = self.publish_cascade(&envelope, cascade) {
                        warn!(envelope_id = %envelope.id, error = %err, "failed to publish cascaded messages");
                    }
                    return;
                }
                Err(failure) => failure,
            };

            self.logger.message_failed(&envelope, &failure);
            match self.determine_action(&chain, &envelope, &failure) {
                ErrorAction::RetryInline => continue,
                ErrorAction::Reschedule(delay) => self.reschedule(envelope, delay, callback),
                ErrorAction::Requeue => {
                    let id = envelope.id;
                    if let Err(err) = callback.requeue(envelope) {
                        warn!(envelope_id = %id, error = %err, "failed to requeue envelope");
                    }
                }
                ErrorAction::MoveToErrorQueue => {
                    self.move_to_error_queue(envelope, &failure, callback)
                }
            }
            return;
        }
    }
}

fn settle(result: Result<(), TransportError>, envelope: &Envelope) {
    if let Err(err) = result {
        warn!(envelope_id = %envelope.id, error = %err, "failed to complete envelope");
    }
}
