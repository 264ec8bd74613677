//! Endpoint settings shared by every external transport.

use std::collections::HashMap;

use super::TransportUri;

/// Named endpoints for one transport, plus an optional reply address.
///
/// Resolution is a pure lookup by connection name and is never mutated by
/// message traffic.
#[derive(Debug, Clone)]
pub struct TransportSettings<E> {
    endpoints: HashMap<String, E>,
    reply_uri: Option<TransportUri>,
}

impl<E> Default for TransportSettings<E> {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
            reply_uri: None,
        }
    }
}

impl<E> TransportSettings<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint under a connection name.
    pub fn with_endpoint(mut self, connection_name: impl Into<String>, endpoint: E) -> Self {
        self.endpoints.insert(connection_name.into(), endpoint);
        self
    }

    pub fn with_reply_uri(mut self, uri: TransportUri) -> Self {
        self.reply_uri = Some(uri);
        self
    }

    pub fn add_endpoint(&mut self, connection_name: impl Into<String>, endpoint: E) {
        self.endpoints.insert(connection_name.into(), endpoint);
    }

    /// Endpoint for the URI's connection name.
    pub fn endpoint_for(&self, uri: &TransportUri) -> Option<&E> {
        self.endpoints.get(uri.connection_name())
    }

    pub fn contains(&self, connection_name: &str) -> bool {
        self.endpoints.contains_key(connection_name)
    }

    pub fn reply_uri(&self) -> Option<&TransportUri> {
        self.reply_uri.as_ref()
    }

    pub fn connection_names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(|k| k.as_str())
    }
}
