//! Scheduled and durable redelivery.
//!
//! Envelopes rescheduled by the retry policy go to an [`EnvelopeStore`].
//! [`ScheduledJobPoller`] is a single background thread that, on a fixed
//! interval, fetches the envelopes whose time has come and resubmits them.
//! An envelope is removed from the store only after it was resubmitted, so
//! a crash between fetch and resubmission means it is fetched again.

mod error;
mod poller;
mod store;

pub use error::StoreError;
pub use poller::{PollerOptions, PollerStats, Resubmit, ScheduledJobPoller};
pub use store::{EnvelopeStore, InMemoryEnvelopeStore};
