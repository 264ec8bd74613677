//! Serialization capability.
//!
//! The router only asks a [`SerializerGraph`] which content types a message
//! type can be written in. [`Serializers`] is the included implementation:
//! per-type JSON (the fallback) and bitcode codecs registered at startup.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::SerializationError;
use crate::envelope::{Envelope, Message, MessageDescriptor};

/// The fallback content type every message type can be written in.
pub const JSON: &str = "application/json";

/// Binary content type backed by `bitcode`.
pub const BITCODE: &str = "application/x-bitcode";

/// Content types a message type can be written in, in preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterCollection {
    content_types: Vec<String>,
}

impl WriterCollection {
    pub fn new(content_types: Vec<String>) -> Self {
        Self { content_types }
    }

    /// Only the fallback type.
    pub fn fallback() -> Self {
        Self::new(vec![JSON.to_string()])
    }

    pub fn content_types(&self) -> &[String] {
        &self.content_types
    }

    pub fn supports(&self, content_type: &str) -> bool {
        self.content_types.iter().any(|t| t == content_type)
    }
}

/// Lookup of writable content types per message type.
pub trait SerializerGraph: Send + Sync {
    fn writer_for(&self, message_type: &str) -> WriterCollection;
}

type WriteFn = Arc<dyn Fn(&dyn Message) -> Result<Vec<u8>, String> + Send + Sync>;
type ReadFn = Arc<dyn Fn(&[u8]) -> Result<Arc<dyn Message>, String> + Send + Sync>;

#[derive(Clone)]
struct Codec {
    content_type: &'static str,
    write: WriteFn,
    read: ReadFn,
}

/// Per-type codecs.
///
/// ```
/// use courier::routing::{SerializerGraph, Serializers, JSON};
///
/// let serializers = Serializers::new();
/// assert_eq!(serializers.writer_for("Unknown").content_types(), [JSON.to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct Serializers {
    codecs: HashMap<String, Vec<Codec>>,
}

impl Serializers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the JSON codec for `T`.
    pub fn json<T>(self) -> Self
    where
        T: MessageDescriptor + Serialize + DeserializeOwned,
    {
        self.with_codec::<T>(
            JSON,
            Arc::new(|message| {
                let typed = downcast::<T>(message)?;
                serde_json::to_vec(typed).map_err(|e| e.to_string())
            }),
            Arc::new(|bytes| {
                let typed: T = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
                Ok(Arc::new(typed) as Arc<dyn Message>)
            }),
        )
    }

    /// Register the bitcode codec for `T`.
    #[cfg(feature = "bitcode")]
    pub fn bitcode<T>(self) -> Self
    where
        T: MessageDescriptor + Serialize + DeserializeOwned,
    {
        self.with_codec::<T>(
            BITCODE,
            Arc::new(|message| {
                let typed = downcast::<T>(message)?;
                bitcode::serialize(typed).map_err(|e| e.to_string())
            }),
            Arc::new(|bytes| {
                let typed: T = bitcode::deserialize(bytes).map_err(|e| e.to_string())?;
                Ok(Arc::new(typed) as Arc<dyn Message>)
            }),
        )
    }

    fn with_codec<T: MessageDescriptor>(
        mut self,
        content_type: &'static str,
        write: WriteFn,
        read: ReadFn,
    ) -> Self {
        let codecs = self.codecs.entry(T::MESSAGE_TYPE.to_string()).or_default();
        codecs.retain(|c| c.content_type != content_type);
        codecs.push(Codec {
            content_type,
            write,
            read,
        });
        self
    }

    fn codec(&self, message_type: &str, content_type: &str) -> Option<&Codec> {
        self.codecs
            .get(message_type)?
            .iter()
            .find(|c| c.content_type == content_type)
    }

    /// Write a typed message in the given content type.
    pub fn write(
        &self,
        message: &dyn Message,
        content_type: &str,
    ) -> Result<Vec<u8>, SerializationError> {
        let message_type = message.message_type();
        let codec = self
            .codec(message_type, content_type)
            .ok_or_else(|| SerializationError::NoWriter {
                message_type: message_type.to_string(),
                content_type: content_type.to_string(),
            })?;
        (codec.write)(message).map_err(|reason| SerializationError::Encode {
            message_type: message_type.to_string(),
            reason,
        })
    }

    /// Read bytes back into a typed message.
    pub fn read(
        &self,
        message_type: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<Arc<dyn Message>, SerializationError> {
        let codec = self
            .codec(message_type, content_type)
            .ok_or_else(|| SerializationError::NoReader {
                message_type: message_type.to_string(),
                content_type: content_type.to_string(),
            })?;
        (codec.read)(data).map_err(|reason| SerializationError::Decode {
            message_type: message_type.to_string(),
            reason,
        })
    }

    /// Fill `data` from the typed message, keeping existing bytes.
    ///
    /// Uses the envelope's content type, or the first type the message can be
    /// written in.
    pub fn write_envelope(&self, envelope: &mut Envelope) -> Result<(), SerializationError> {
        if envelope.data.is_some() {
            return Ok(());
        }
        let Some(message) = envelope.message.clone() else {
            return Ok(());
        };

        let content_type = match &envelope.content_type {
            Some(content_type) => content_type.clone(),
            None => self
                .writer_for(message.message_type())
                .content_types()
                .first()
                .cloned()
                .unwrap_or_else(|| JSON.to_string()),
        };

        envelope.data = Some(self.write(message.as_ref(), &content_type)?);
        envelope.content_type = Some(content_type);
        Ok(())
    }

    /// Fill the typed message from `data` when it is missing.
    pub fn read_envelope(&self, envelope: &mut Envelope) -> Result<(), SerializationError> {
        if envelope.message.is_some() {
            return Ok(());
        }
        let (Some(message_type), Some(data)) = (envelope.message_type.as_deref(), &envelope.data)
        else {
            return Ok(());
        };

        let content_type = envelope.content_type.as_deref().unwrap_or(JSON);
        envelope.message = Some(self.read(message_type, content_type, data)?);
        Ok(())
    }
}

impl SerializerGraph for Serializers {
    fn writer_for(&self, message_type: &str) -> WriterCollection {
        match self.codecs.get(message_type) {
            Some(codecs) if !codecs.is_empty() => WriterCollection::new(
                codecs.iter().map(|c| c.content_type.to_string()).collect(),
            ),
            _ => WriterCollection::fallback(),
        }
    }
}

fn downcast<T: Message>(message: &dyn Message) -> Result<&T, String> {
    message
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| format!("message is a '{}'", message.message_type()))
}
