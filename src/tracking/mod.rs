//! Delivery tracking.
//!
//! Every lifecycle transition of an envelope is reported to a
//! [`MessageLogger`]. [`TrackingSession`] keeps an append-only, ordered list
//! of [`EnvelopeRecord`]s (tests and traces query it); [`TracingLogger`]
//! turns each event into a structured `tracing` event. Sinks never fail and
//! never block on anything but a short in-memory append.

mod logger;
mod record;
mod session;

pub use logger::{CompositeLogger, MessageLogger, SubscriptionMismatch, TracingLogger};
pub use record::{EnvelopeRecord, EventType};
pub use session::TrackingSession;
