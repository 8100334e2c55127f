//! Error types for tinitd.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the rendezvous fabric.
///
/// `NeverAccepted` means the request was never picked up; `ReplyTimeout`
/// means it was consumed but the consumer did not answer in time, so side
/// effects may still land.
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("request was never accepted by the registry")]
    NeverAccepted,
    #[error("timed out waiting for a reply")]
    ReplyTimeout,
    #[error("rendezvous channel closed")]
    Closed,
    #[error("protocol violation: expected {expected} marker, got {got:?}")]
    Protocol { expected: &'static str, got: Vec<u8> },
}

/// Failures while forking a service process.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to create log directory {path}: {source}")]
    LogDir { path: PathBuf, source: io::Error },
    #[error("failed to open log file {path}: {source}")]
    LogFile { path: PathBuf, source: io::Error },
    #[error("failed to spawn {command}: {source}")]
    Spawn { command: String, source: io::Error },
}
