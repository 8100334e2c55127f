//! Zombie reaper: the daemon's single wait point.
//!
//! Collects every exited child with a non-blocking `waitpid(-1)` loop.
//! A pid owned by a live pool record has its exit recorded there and its
//! handler woken; anything else is an orphan reparented to us and is
//! simply collected. Runs for the daemon's whole lifetime and is torn
//! down last.

use super::pool::SharedPool;
use log::{debug, error, info};
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct ZombieReaper {
    pool: SharedPool,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ZombieReaper {
    pub fn new(pool: SharedPool, shutdown_rx: mpsc::Receiver<()>) -> Self {
        Self { pool, shutdown_rx }
    }

    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    self.collect().await;
                    info!("Reaper: Bye!");
                    return;
                }
                _ = tick.tick() => {
                    self.collect().await;
                }
            }
        }
    }

    /// Drain every child the kernel has ready for us.
    async fn collect(&self) {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    self.attribute(pid.as_raw(), format!("exit status {code}"))
                        .await;
                }
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    self.attribute(pid.as_raw(), format!("signal: {sig:?}")).await;
                }
                Ok(WaitStatus::StillAlive) => break,
                Ok(_) => {}
                Err(Errno::ECHILD) | Err(Errno::EINTR) => break,
                Err(e) => {
                    // A broken wait leaves supervision state undefined.
                    error!("Reaper: waitpid failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    async fn attribute(&self, pid: i32, exit_status: String) {
        let mut pool = self.pool.lock().await;
        if pool.record_exit(pid, exit_status) {
            debug!("Reaper: recorded exit of pid {pid}");
        } else {
            debug!("Reaper: collected orphan pid {pid}");
        }
    }
}
