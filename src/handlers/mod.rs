//! Handler chains.
//!
//! [`HandlerGraph`] is the static registration table built at startup: for
//! each message type, the ordered handlers, the chain's retry rules and its
//! maximum attempts. Compiling it yields immutable [`HandlerChain`]s that
//! traffic never mutates.
//!
//! ## Example
//!
//! ```ignore
//! let handlers = HandlerGraph::new()
//!     .handle(|order: &OrderPlaced, ctx: &InvocationContext| {
//!         println!("order {} (attempt {})", order.id, ctx.attempts());
//!         Ok(Cascade::none().publish(ReserveStock { order: order.id }))
//!     })
//!     .chain_retries::<OrderPlaced>(
//!         RetryPolicy::new().on(FailureMatch::of::<io::Error>(), ErrorAction::Requeue),
//!     )
//!     .maximum_attempts::<OrderPlaced>(3)
//!     .compile()?;
//! ```

mod chain;
mod context;
mod error;
mod graph;

pub use chain::{HandlerChain, HandlerResult};
pub use context::{Cascade, InvocationContext, Outgoing};
pub use error::{ConfigurationError, HandlerError};
pub use graph::{HandlerChains, HandlerGraph};
