//! Service registry: name→descriptor table and verb handling.

mod dispatcher;
mod worker;

pub use dispatcher::ServiceRegistry;

use crate::model::ServiceSpec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The registry table, shared with per-request workers.
pub type SharedServices = Arc<Mutex<HashMap<String, ServiceSpec>>>;
