//! # courier
//!
//! A message bus runtime: typed messages are routed to local handler chains
//! or transports, failures are classified by per-chain retry policies, and
//! every delivery event is tracked.
//!
//! ```ignore
//! use courier::{Cascade, InvocationContext, MessagingRuntime, MessagingSettings};
//!
//! #[derive(Debug, courier::Message)]
//! struct OrderPlaced { id: u64 }
//!
//! let runtime = MessagingRuntime::builder(MessagingSettings::new("orders"))
//!     .handle(|order: &OrderPlaced, _ctx: &InvocationContext| {
//!         println!("order {}", order.id);
//!         Ok(Cascade::none())
//!     })
//!     .build()?;
//!
//! runtime.publish(OrderPlaced { id: 1 })?;
//! runtime.drain_local_queues()?;
//! ```

extern crate self as courier;

pub mod durability;
pub mod envelope;
mod error;
pub mod handlers;
pub mod retry;
pub mod routing;
pub mod runtime;
pub mod tracking;
pub mod transport;

pub use durability::{EnvelopeStore, InMemoryEnvelopeStore, ScheduledJobPoller};
pub use envelope::{Envelope, Message, MessageDescriptor, MessageOptions, ModifyEnvelope, SetHeader};
pub use error::BusError;
pub use handlers::{Cascade, HandlerError, HandlerGraph, HandlerResult, InvocationContext};
pub use retry::{ErrorAction, FailureMatch, RetryPolicy};
pub use routing::{MessageRoute, MessageRouter, Serializers};
pub use runtime::{MessagingRuntime, MessagingSettings};
pub use tracking::{EventType, MessageLogger, TrackingSession};
pub use transport::{TransportUri, LOCAL_URI};

/// Derive [`Message`] and [`MessageDescriptor`].
pub use courier_macros::Message;
