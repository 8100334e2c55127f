//! Pool dispatcher: routes new tasks to fresh handlers and control
//! actions to workers, and runs the shutdown escalation.

use super::handler::ProcessHandler;
use super::pool::{ProcessRecord, SharedPool};
use super::{Task, proc, worker};
use crate::channels::{ServiceChannel, ServiceReceiver};
use crate::model::ServiceSpec;
use log::{debug, error, info, warn};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};

/// How long pool entries get between SIGTERM and SIGKILL at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);
const POLL: Duration = Duration::from_millis(100);

pub struct PoolDispatcher {
    receiver: ServiceReceiver,
    /// Clone of the typed pipe's producer half, handed to action workers
    /// so start can resubmit preserved work.
    resubmit: ServiceChannel,
    shutdown_rx: mpsc::Receiver<()>,
    pool: SharedPool,
    offer_tx: mpsc::Sender<mpsc::Sender<Task>>,
    offer_rx: mpsc::Receiver<mpsc::Sender<Task>>,
    workers: JoinSet<()>,
    handlers: JoinSet<()>,
    watch_all: bool,
    log_dir: PathBuf,
}

impl PoolDispatcher {
    pub fn new(
        receiver: ServiceReceiver,
        resubmit: ServiceChannel,
        shutdown_rx: mpsc::Receiver<()>,
        pool: SharedPool,
        watch_all: bool,
        log_dir: PathBuf,
    ) -> Self {
        let (offer_tx, offer_rx) = mpsc::channel(1);
        Self {
            receiver,
            resubmit,
            shutdown_rx,
            pool,
            offer_tx,
            offer_rx,
            workers: JoinSet::new(),
            handlers: JoinSet::new(),
            watch_all,
            log_dir,
        }
    }

    pub async fn run(mut self) {
        info!("Pool: running and waiting for tasks");

        loop {
            tokio::select! {
                Some(spec) = self.receiver.data_rx.recv() => {
                    self.submit(spec).await;
                }
                Some(request) = self.receiver.action_rx.recv() => {
                    let pool = self.pool.clone();
                    let resubmit = self.resubmit.clone();
                    self.workers.spawn(worker::handle_action(pool, resubmit, request));
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }

        // In-flight actions first, then the escalation, then the handlers
        // (they retire once the reaper has stamped their exits).
        while self.workers.join_next().await.is_some() {}
        self.terminate_processes().await;
        while self.handlers.join_next().await.is_some() {}
        info!("Pool: Bye!");
    }

    /// Add-worker protocol: register the record, spawn a dedicated
    /// handler, bind the task through the worker-offer rendezvous.
    async fn submit(&mut self, spec: ServiceSpec) {
        if spec.command.is_empty() {
            error!("Pool: service {} command is empty", spec.name);
            return;
        }
        if spec.name.is_empty() || spec.suid.is_empty() {
            error!("Pool: service name/suid can not be empty");
            return;
        }

        {
            let mut pool = self.pool.lock().await;
            let record = ProcessRecord::new(&spec.name, &spec.command, &spec.args);
            if !pool.insert(spec.suid.clone(), record) {
                // Shutdown already underway; the submitter knows.
                debug!("Pool: expansion forbidden, dropping task for {}", spec.name);
                return;
            }
        }

        let handler =
            ProcessHandler::new(spec.suid.clone(), self.pool.clone(), self.offer_tx.clone());
        self.handlers.spawn(handler.run());

        let task = Task::new(&spec, self.log_dir.clone());
        if let Some(slot) = self.offer_rx.recv().await {
            let _ = slot.send(task).await;
        }
        debug!("Pool: task for {} bound to a handler", spec.name);
    }

    /// Shutdown escalation. Pool entries always get SIGTERM then SIGKILL
    /// on the grace deadline; in watch-all mode every other process in
    /// the namespace is terminated the same way and the namespace is
    /// drained to zero.
    async fn terminate_processes(&mut self) {
        let pool_pids = {
            let mut pool = self.pool.lock().await;
            pool.forbid_expansion();
            pool.running_pids()
        };
        warn!("Pool: expansion is now forbidden");

        for pid in &pool_pids {
            let _ = kill(Pid::from_raw(*pid), Signal::SIGTERM);
        }

        if !self.watch_all {
            if pool_pids.is_empty() {
                return;
            }
            let deadline = Instant::now() + SHUTDOWN_GRACE;
            loop {
                if self.pool.lock().await.all_exited() {
                    return;
                }
                if Instant::now() >= deadline {
                    break;
                }
                sleep(POLL).await;
            }
            for pid in self.pool.lock().await.running_pids() {
                let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
            }
            return;
        }

        info!("Pool: sending SIGTERM to all processes");
        for pid in proc::live_processes() {
            let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
        }

        info!("Pool: checking if processes have terminated");
        for _ in 0..60 {
            if proc::live_processes().is_empty() {
                return;
            }
            sleep(Duration::from_secs(1)).await;
        }

        info!("Pool: done waiting for processes. Sending SIGKILL to all processes");
        for pid in proc::live_processes() {
            let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
        }
        // The namespace must drain to zero; the reaper collects as we wait.
        while !proc::live_processes().is_empty() {
            sleep(POLL).await;
        }
    }
}
