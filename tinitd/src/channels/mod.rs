//! Rendezvous fabric binding listeners, registry and supervisor.
//!
//! Two hand-off primitives: a byte-oriented request/response pipe
//! ([`remote::RemoteChannel`], listener → registry) and a typed pipe
//! ([`service::ServiceChannel`], registry ↔ supervisor). Both are
//! synchronous hand-offs over bounded channels; neither side holds the
//! other across a round trip.

pub mod remote;
pub mod service;

pub use remote::{DONE_MARKER, READY_MARKER, RemoteChannel, RemoteExchange};
pub use service::{ActionRequest, ServiceChannel, ServiceReceiver};
