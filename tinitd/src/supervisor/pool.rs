//! The process pool: one table from unique service id to supervision
//! record, plus the one-way expansion gate, behind a single lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};

pub type SharedPool = Arc<Mutex<Pool>>;

/// Supervision record for one registration. Binds a suid to at most one
/// OS process at a time; command and args are retained so start can
/// resubmit after an exit. "running" is always derived, never stored.
pub struct ProcessRecord {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub pid: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_status: Option<String>,
    pub error: Option<String>,
    /// Fired by the reaper when the process is collected.
    pub exit_notify: Option<oneshot::Sender<()>>,
}

impl ProcessRecord {
    pub fn new(name: &str, command: &str, args: &[String]) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            args: args.to_vec(),
            pid: None,
            start_time: None,
            exit_time: None,
            exit_status: None,
            error: None,
            exit_notify: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.pid.is_some() && self.exit_time.is_none()
    }
}

/// Id→record table plus the expansion gate, guarded by one lock and
/// passed explicitly to every consumer.
pub struct Pool {
    records: HashMap<String, ProcessRecord>,
    expansion_allowed: bool,
}

impl Pool {
    pub fn new() -> SharedPool {
        Arc::new(Mutex::new(Self {
            records: HashMap::new(),
            expansion_allowed: true,
        }))
    }

    /// Insert a record unless the gate has been closed. Returns whether
    /// the record was accepted.
    pub fn insert(&mut self, suid: String, record: ProcessRecord) -> bool {
        if !self.expansion_allowed {
            return false;
        }
        self.records.insert(suid, record);
        true
    }

    pub fn contains(&self, suid: &str) -> bool {
        self.records.contains_key(suid)
    }

    pub fn get(&self, suid: &str) -> Option<&ProcessRecord> {
        self.records.get(suid)
    }

    pub fn get_mut(&mut self, suid: &str) -> Option<&mut ProcessRecord> {
        self.records.get_mut(suid)
    }

    pub fn remove(&mut self, suid: &str) -> Option<ProcessRecord> {
        self.records.remove(suid)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flip the gate; there is no way back.
    pub fn forbid_expansion(&mut self) {
        self.expansion_allowed = false;
    }

    /// Pids of every record with a live process.
    pub fn running_pids(&self) -> Vec<i32> {
        self.records
            .values()
            .filter(|r| r.is_running())
            .filter_map(|r| r.pid)
            .collect()
    }

    /// Whether every entry has recorded an exit (or never forked).
    pub fn all_exited(&self) -> bool {
        self.records.values().all(|r| !r.is_running())
    }

    /// Attribute a reaped pid to its record: stamp exit time and status
    /// and wake the owning handler. Returns false for orphans.
    pub fn record_exit(&mut self, pid: i32, exit_status: String) -> bool {
        for record in self.records.values_mut() {
            if record.pid == Some(pid) && record.exit_time.is_none() {
                record.exit_time = Some(Utc::now());
                record.exit_status = Some(exit_status);
                if let Some(notify) = record.exit_notify.take() {
                    let _ = notify.send(());
                }
                return true;
            }
        }
        false
    }
}
