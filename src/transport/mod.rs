//! Transport abstraction.
//!
//! Transports are keyed by URI scheme and build two things for a logical
//! address `scheme://connection-name/path`:
//!
//! - a [`Sender`], wrapped by the runtime in a [`SendingAgent`]
//! - a [`ListeningAgent`], which hands received envelopes to a [`Receiver`]
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Transports (TransportRuntime)            │
//! │  scheme → Transport, publish rules, cached agents         │
//! └──────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │           ExternalTransport<B: TransportBuilder>          │
//! │  connection name → endpoint (TransportSettings<E>)        │
//! │  unknown connection → TransportError::UnknownConnection   │
//! └──────────────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//! ┌─────────────────┐               ┌──────────────────────┐
//! │ LoopbackBuilder │               │ your broker builder  │
//! │   (included)    │               │     (external)       │
//! └─────────────────┘               └──────────────────────┘
//! ```

mod error;
mod listening;
mod loopback;
mod runtime;
mod sending;
mod settings;
mod transport;
mod uri;

pub use error::TransportError;
pub use listening::{
    ChannelCallback, Listener, ListenerOptions, ListenerStats, ListeningAgent, PollingAgent,
    Receiver,
};
pub use loopback::{
    local_queue_uri, DeadLetter, LoopbackBuilder, LoopbackCallback, LoopbackQueue,
    LoopbackSender, LoopbackTransport, DEFAULT_QUEUE, LOOPBACK,
};
pub use runtime::{TransportRuntime, Transports};
pub use sending::{Sender, SendingAgent, SubscriberAgent, TransportAgent};
pub use settings::TransportSettings;
pub use transport::{ExternalTransport, Transport, TransportBuilder};
pub use uri::TransportUri;

/// Address of the default local queue.
pub const LOCAL_URI: &str = "loopback://default";
