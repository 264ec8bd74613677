//! Failure → action policy.
//!
//! A [`RetryPolicy`] is an ordered list of [`RetryRule`]s. Each failure is
//! matched against the chain's rules first and then the global rules; the
//! most specific matching rule wins, ties broken by registration order.
//!
//! ```
//! use std::time::Duration;
//! use courier::retry::{ErrorAction, FailureMatch, RetryPolicy};
//!
//! let policy = RetryPolicy::new()
//!     .on(FailureMatch::of::<std::io::Error>(), ErrorAction::Reschedule(Duration::from_secs(5)))
//!     .on(FailureMatch::message_contains("deadlock"), ErrorAction::RetryInline)
//!     .on(FailureMatch::any(), ErrorAction::MoveToErrorQueue);
//! assert_eq!(policy.len(), 3);
//! ```

mod action;
mod policy;

pub use action::ErrorAction;
pub use policy::{determine_action, FailureMatch, RetryPolicy, RetryRule};
