//! Process supervision engine.
//!
//! The pool dispatcher owns the id→record table, spawns one dedicated
//! process handler per registration, runs the zombie reaper and executes
//! the shutdown escalation. Control actions arrive over the typed pipe and
//! are served by per-action workers.

mod dispatcher;
mod exec;
mod handler;
mod pool;
mod proc;
mod reaper;
mod worker;

pub use dispatcher::PoolDispatcher;
pub use pool::{Pool, ProcessRecord, SharedPool};
pub use reaper::ZombieReaper;

use crate::error::SpawnError;
use crate::model::ServiceSpec;
use std::path::PathBuf;
use std::process::Child;

/// An ephemeral unit of work: one service to fork, consumed by exactly
/// one handler.
pub struct Task {
    pub suid: String,
    pub name: String,
    pub spawn: Box<dyn FnOnce() -> Result<Child, SpawnError> + Send>,
}

impl Task {
    /// Build a task from a descriptor. The spawn function captures
    /// everything it needs so the handler stays ignorant of descriptors.
    pub fn new(spec: &ServiceSpec, log_dir: PathBuf) -> Self {
        let name = spec.name.clone();
        let command = spec.command.clone();
        let args = spec.args.clone();
        let spawn_name = name.clone();
        Self {
            suid: spec.suid.clone(),
            name,
            spawn: Box::new(move || exec::spawn_service(&log_dir, &spawn_name, &command, &args)),
        }
    }
}
