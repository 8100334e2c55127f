//! Transport listeners. They only move opaque bytes: accept a request
//! payload, run one byte-pipe exchange, hand the reply back.

pub mod http;
pub mod uds;

pub use http::HttpServer;
pub use uds::UdsServer;
