//! Wire and registry data model.
//!
//! The byte pipe carries JSON-encoded [`ServiceRequest`]s inbound and either
//! a JSON [`ServiceAction`], a JSON name list, or a plain text message
//! outbound. Everything the supervisor tracks per process lives in
//! [`crate::supervisor::ProcessRecord`], not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of verbs accepted on the control surface.
///
/// Anything else fails request decoding and is rejected with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Register,
    Start,
    Stop,
    Restart,
    Delete,
    Status,
    List,
    Shutdown,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Register => "register",
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Delete => "delete",
            Verb::Status => "status",
            Verb::List => "list",
            Verb::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// One control request as received from a listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    #[serde(rename = "type")]
    pub verb: Verb,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A registered service: user-chosen name plus the system-generated
/// unique id (suid) that stays stable for the registration's lifetime.
///
/// Owned by the registry; the supervisor refers to it by suid only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub suid: String,
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Derived service state as reported on the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Deleted,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// One control action round trip between registry and supervisor.
///
/// Created per request by the registry, mutated by the supervisor,
/// consumed exactly once when encoded as the response. The suid never
/// leaves the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAction {
    #[serde(rename = "action")]
    pub verb: Verb,
    #[serde(skip)]
    pub suid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceAction {
    /// A fresh action for `verb` against the registration `suid`/`name`.
    pub fn new(verb: Verb, suid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            verb,
            suid: suid.into(),
            name: name.into(),
            pid: None,
            status: ServiceStatus::Stopped,
            start_time: None,
            exit_time: None,
            exit_status: None,
            error: None,
        }
    }
}

/// Response body for the list verb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceList {
    pub services: Vec<String>,
}
