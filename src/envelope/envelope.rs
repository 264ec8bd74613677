use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;
use crate::transport::TransportUri;

/// A message plus the metadata needed to deliver it.
///
/// Exactly one of `message` (typed, in-process) or `data` (wire bytes) is
/// expected to be present when the envelope is routed. The typed message is
/// never serialized with the envelope; `data` is carried as base64 so the
/// envelope can be persisted by durable storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Identity of one logical message instance.
    pub id: Uuid,
    #[serde(skip)]
    pub message: Option<Arc<dyn Message>>,
    #[serde(default, with = "data_serde", skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    /// Message type name, kept for `data`-only envelopes.
    pub message_type: Option<String>,
    pub destination: Option<TransportUri>,
    pub reply_uri: Option<TransportUri>,
    pub content_type: Option<String>,
    /// Content types the source can accept, in preference order.
    #[serde(default)]
    pub accepted_content_types: Vec<String>,
    /// Name of the originating service.
    pub source: Option<String>,
    /// Delivery attempts so far.
    #[serde(default)]
    pub attempts: u32,
    pub correlation_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Earliest time this envelope may be delivered again.
    pub scheduled_time: Option<SystemTime>,
}

mod data_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match data {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

impl Envelope {
    /// Wrap a typed message in a fresh envelope.
    pub fn new(message: impl Message) -> Self {
        Self::for_message(Arc::new(message))
    }

    /// Wrap an already shared message in a fresh envelope.
    pub fn for_message(message: Arc<dyn Message>) -> Self {
        let message_type = message.message_type().to_string();
        let mut envelope = Self::empty();
        envelope.message = Some(message);
        envelope.message_type = Some(message_type);
        envelope
    }

    /// An envelope carrying only pre-serialized bytes.
    pub fn from_data(
        message_type: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        let mut envelope = Self::empty();
        envelope.data = Some(data);
        envelope.message_type = Some(message_type.into());
        envelope.content_type = Some(content_type.into());
        envelope
    }

    /// An envelope with a fresh id and no body.
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            message: None,
            data: None,
            message_type: None,
            destination: None,
            reply_uri: None,
            content_type: None,
            accepted_content_types: Vec::new(),
            source: None,
            attempts: 0,
            correlation_id: None,
            headers: HashMap::new(),
            scheduled_time: None,
        }
    }

    /// The message type name, from the typed body when present.
    pub fn message_type(&self) -> Option<&str> {
        match &self.message {
            Some(message) => Some(message.message_type()),
            None => self.message_type.as_deref(),
        }
    }

    /// Downcast the typed body.
    pub fn message_as<T: Message>(&self) -> Option<&T> {
        self.message
            .as_ref()
            .and_then(|message| message.as_any().downcast_ref::<T>())
    }

    pub fn has_body(&self) -> bool {
        self.message.is_some() || self.data.is_some()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    pub fn with_destination(mut self, destination: TransportUri) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_accepted_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_content_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Build the envelope for a message cascaded out of this one.
    ///
    /// The child shares this envelope's correlation (or uses this envelope's
    /// id as the correlation when none is set yet).
    pub fn for_cascade(&self, message: Arc<dyn Message>) -> Envelope {
        let mut child = Envelope::for_message(message);
        child.correlation_id = Some(self.correlation_id.unwrap_or(self.id));
        child.reply_uri = self.reply_uri.clone();
        child
    }

    /// Whether the envelope is due at `now`.
    pub fn is_due(&self, now: SystemTime) -> bool {
        match self.scheduled_time {
            Some(at) => at <= now,
            None => true,
        }
    }
}
