//! Process handler: owns exactly one fork for its lifetime.
//!
//! A handler offers its private task slot to the dispatcher, receives one
//! task, forks it, and then blocks until the reaper reports the exit.
//! Every outcome leaves the record with either a live process or a
//! terminal exit time.

use super::Task;
use super::pool::SharedPool;
use chrono::Utc;
use log::{debug, error, info};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::sync::{mpsc, oneshot};

pub struct ProcessHandler {
    suid: String,
    pool: SharedPool,
    offer_tx: mpsc::Sender<mpsc::Sender<Task>>,
}

impl ProcessHandler {
    pub fn new(suid: String, pool: SharedPool, offer_tx: mpsc::Sender<mpsc::Sender<Task>>) -> Self {
        Self {
            suid,
            pool,
            offer_tx,
        }
    }

    pub async fn run(self) {
        let (slot_tx, mut slot_rx) = mpsc::channel::<Task>(1);
        if self.offer_tx.send(slot_tx).await.is_err() {
            // Dispatcher is gone; nothing to do.
            return;
        }
        let Some(task) = slot_rx.recv().await else {
            return;
        };
        debug!("Handler: {} accepted task for {}", self.suid, task.name);

        let (exit_tx, exit_rx) = oneshot::channel();
        let forked = (task.spawn)();
        let fork_time = Utc::now();

        match forked {
            Ok(child) => {
                let pid = child.id() as i32;
                let adopted = {
                    let mut pool = self.pool.lock().await;
                    match pool.get_mut(&self.suid) {
                        Some(record) => {
                            record.pid = Some(pid);
                            record.start_time = Some(fork_time);
                            record.exit_notify = Some(exit_tx);
                            true
                        }
                        None => false,
                    }
                };
                if !adopted {
                    // The registration vanished while we forked; the
                    // process has no owner, cull it.
                    let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
                    return;
                }
                info!(
                    "Handler: task {} ({}) is being executed with pid {}",
                    task.name, self.suid, pid
                );
                // The reaper owns waiting; we only keep the record honest.
                drop(child);
                let _ = exit_rx.await;
                debug!("Handler: {} ({}) is shutting down", task.name, self.suid);
            }
            Err(e) => {
                error!("Handler: fork of {} failed: {}", task.name, e);
                let mut pool = self.pool.lock().await;
                if let Some(record) = pool.get_mut(&self.suid) {
                    record.start_time = Some(fork_time);
                    record.exit_time = Some(Utc::now());
                    record.error = Some(e.to_string());
                }
            }
        }
    }
}
