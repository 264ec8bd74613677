//! Messaging runtime.
//!
//! Wires the router, the handler pipeline, transports, the envelope store
//! and tracking together behind [`MessagingRuntime`]:
//!
//! ```text
//! publish ─▶ MessageRouter::route ─▶ SendingAgent ─▶ queue
//!                                                    │
//!            ┌───────────────────────────────────────┘
//!            ▼
//! ListeningAgent ─▶ HandlerPipeline ─▶ HandlerChain
//!                        │ failure
//!                        ▼
//!                   RetryPolicy ─▶ retry inline | reschedule | requeue | error queue
//! ```

mod messaging;
mod pipeline;
mod settings;

pub use messaging::{MessagingRuntime, MessagingRuntimeBuilder, RuntimeStats};
pub use pipeline::HandlerPipeline;
pub use settings::MessagingSettings;
