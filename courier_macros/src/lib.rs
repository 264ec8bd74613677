mod message;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Message)]
// ============================================================================

/// Derives `courier::Message` and `courier::MessageDescriptor`.
///
/// The message type name defaults to the struct or enum ident. Static,
/// per-type options are declared with `#[message(...)]`:
///
/// ```ignore
/// #[derive(Debug, Serialize, Deserialize, courier::Message)]
/// #[message(
///     name = "orders.placed",
///     local_queue = "important",
///     header(key = "priority", value = "high"),
/// )]
/// pub struct OrderPlaced {
///     pub id: String,
/// }
/// ```
///
/// - `name` overrides the message type name used as the routing key
/// - `local_queue` sends local deliveries of this type to a dedicated queue
/// - `header(key, value)` stamps a header on every outgoing envelope
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    message::derive_message(input)
}
