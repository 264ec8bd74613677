//! Message routing.
//!
//! [`MessageRouter`] answers "where does this message go, and in which
//! content type?" using three collaborators: the [`SerializerGraph`] (which
//! content types a type can be written in), the
//! [`TransportRuntime`](crate::transport::TransportRuntime) (subscribers and
//! sending agents) and the compiled handler chains (whether a local route
//! exists).
//!
//! ```text
//! route(envelope)
//!   ├─ explicit destination ─▶ route_for_destination ─▶ 1 clone, same id
//!   └─ by message type ─────▶ route_type (cached)
//!                               ├─ 1 route   ─▶ 1 clone, same id
//!                               └─ N routes  ─▶ N clones, fresh ids
//! ```

mod cache;
mod error;
mod registry;
mod route;
mod router;
mod serializers;

pub use cache::CopyOnWriteMap;
pub use error::{RoutingError, SerializationError};
pub use registry::MessageTypeRegistry;
pub use route::MessageRoute;
pub use router::MessageRouter;
pub use serializers::{SerializerGraph, Serializers, WriterCollection, BITCODE, JSON};
