//! Transport trait and the shared endpoint-resolution layer.

use std::sync::Arc;

use super::{
    ListenerOptions, ListeningAgent, Sender, TransportError, TransportSettings, TransportUri,
};

/// A transport keyed by URI scheme.
pub trait Transport: Send + Sync {
    /// The URI scheme this transport serves (e.g. `loopback`).
    fn protocol(&self) -> &str;

    /// Build a sender for a logical URI.
    fn build_sender(&self, uri: &TransportUri) -> Result<Arc<dyn Sender>, TransportError>;

    /// Build a (not yet started) listening agent for a logical URI.
    fn build_listening_agent(
        &self,
        uri: &TransportUri,
        options: &ListenerOptions,
    ) -> Result<Box<dyn ListeningAgent>, TransportError>;

    /// Effective reply channels given the caller's candidates.
    fn validate_and_choose_reply_channel(&self, incoming: &[TransportUri]) -> Vec<TransportUri> {
        incoming.to_vec()
    }

    /// The configured reply address, when it resolves to a known endpoint.
    fn reply_uri(&self) -> Option<TransportUri> {
        None
    }
}

/// Protocol-specific half of an [`ExternalTransport`].
///
/// Receives an already resolved endpoint; never sees unknown connections.
pub trait TransportBuilder: Send + Sync {
    type Endpoint: Send + Sync;

    fn build_sender(
        &self,
        uri: &TransportUri,
        endpoint: &Self::Endpoint,
    ) -> Result<Arc<dyn Sender>, TransportError>;

    fn build_listening_agent(
        &self,
        uri: &TransportUri,
        endpoint: &Self::Endpoint,
        options: &ListenerOptions,
    ) -> Result<Box<dyn ListeningAgent>, TransportError>;
}

/// A transport whose connections are named endpoints in [`TransportSettings`].
///
/// Parses nothing itself and holds no protocol logic: it resolves the URI's
/// connection name, fails with [`TransportError::UnknownConnection`] when
/// there is no such endpoint, and delegates to the builder otherwise.
pub struct ExternalTransport<B: TransportBuilder> {
    protocol: String,
    settings: TransportSettings<B::Endpoint>,
    builder: B,
}

impl<B: TransportBuilder> ExternalTransport<B> {
    pub fn new(protocol: impl Into<String>, settings: TransportSettings<B::Endpoint>, builder: B) -> Self {
        Self {
            protocol: protocol.into(),
            settings,
            builder,
        }
    }

    pub fn settings(&self) -> &TransportSettings<B::Endpoint> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TransportSettings<B::Endpoint> {
        &mut self.settings
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    fn endpoint(&self, uri: &TransportUri) -> Result<&B::Endpoint, TransportError> {
        self.settings
            .endpoint_for(uri)
            .ok_or_else(|| TransportError::UnknownConnection {
                protocol: self.protocol.clone(),
                connection: uri.connection_name().to_string(),
            })
    }
}

impl<B: TransportBuilder> Transport for ExternalTransport<B> {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn build_sender(&self, uri: &TransportUri) -> Result<Arc<dyn Sender>, TransportError> {
        let endpoint = self.endpoint(uri)?;
        self.builder.build_sender(uri, endpoint)
    }

    fn build_listening_agent(
        &self,
        uri: &TransportUri,
        options: &ListenerOptions,
    ) -> Result<Box<dyn ListeningAgent>, TransportError> {
        let endpoint = self.endpoint(uri)?;
        self.builder.build_listening_agent(uri, endpoint, options)
    }

    fn validate_and_choose_reply_channel(&self, incoming: &[TransportUri]) -> Vec<TransportUri> {
        let Some(reply) = self.reply_uri() else {
            return incoming.to_vec();
        };

        let mut channels: Vec<TransportUri> = Vec::with_capacity(incoming.len() + 1);
        for uri in incoming.iter().chain(std::iter::once(&reply)) {
            if !channels.contains(uri) {
                channels.push(uri.clone());
            }
        }
        channels
    }

    fn reply_uri(&self) -> Option<TransportUri> {
        let reply = self.settings.reply_uri()?;
        self.settings.endpoint_for(reply).map(|_| reply.clone())
    }
}
