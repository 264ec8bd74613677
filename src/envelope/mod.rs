//! Envelope - the unit of transit.
//!
//! An [`Envelope`] wraps a typed message (or its pre-serialized bytes) together
//! with the delivery metadata the router, the handler pipeline and the
//! transports agree on.
//!
//! ## Message identity
//!
//! Every message type has a stable name used as the routing key. Types usually
//! get it from `#[derive(Message)]`:
//!
//! ```ignore
//! #[derive(Debug, courier::Message)]
//! #[message(local_queue = "important")]
//! struct InvoiceCreated { amount: u64 }
//!
//! let envelope = Envelope::new(InvoiceCreated { amount: 10 });
//! assert_eq!(envelope.message_type(), Some("InvoiceCreated"));
//! ```

mod envelope;
mod message;

pub use envelope::Envelope;
pub use message::{Message, MessageDescriptor, MessageOptions, ModifyEnvelope, SetHeader};
