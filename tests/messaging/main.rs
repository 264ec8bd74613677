//! Messaging runtime integration tests.

mod support;

mod inline;
mod routing;
mod scheduling;
mod threaded;
mod transport;
