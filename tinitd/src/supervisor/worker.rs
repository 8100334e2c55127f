//! Per-id control actions against the pool.

use super::pool::SharedPool;
use crate::channels::{ActionRequest, ServiceChannel};
use crate::model::{ServiceAction, ServiceSpec, ServiceStatus, Verb};
use log::{error, info, warn};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

/// Grace period between SIGTERM and SIGKILL for a single service.
const STOP_GRACE: Duration = Duration::from_secs(10);
/// Bounded wait for the exit record after a SIGKILL.
const KILL_WAIT: Duration = Duration::from_secs(5);
/// Bounded wait for a resubmitted service to rejoin the pool / fork.
const START_WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(50);

/// Serve one action round trip. Runs as its own task so the dispatcher
/// keeps accepting new work while we wait on processes.
pub async fn handle_action(pool: SharedPool, resubmit: ServiceChannel, request: ActionRequest) {
    let ActionRequest {
        mut action,
        responder,
    } = request;

    if action.suid.is_empty() {
        error!("Worker: action {} for {} has no suid", action.verb, action.name);
        action.error = Some("missing service id".to_string());
        let _ = responder.send(action);
        return;
    }

    let known = { pool.lock().await.contains(&action.suid) };
    if !known {
        // Unknown ids are already satisfied: report stopped, no error.
        action.status = ServiceStatus::Stopped;
        let _ = responder.send(action);
        return;
    }

    if matches!(action.verb, Verb::Stop | Verb::Delete | Verb::Restart) {
        stop_process(&pool, &action.suid).await;
    }

    if action.verb == Verb::Delete {
        pool.lock().await.remove(&action.suid);
        action.status = ServiceStatus::Deleted;
        info!("Worker: service {} deleted from the pool", action.name);
        let _ = responder.send(action);
        return;
    }

    {
        let pool = pool.lock().await;
        match pool.get(&action.suid) {
            Some(record) if record.is_running() => {
                action.status = ServiceStatus::Running;
                action.pid = record.pid;
            }
            _ => action.status = ServiceStatus::Stopped,
        }
    }

    if matches!(action.verb, Verb::Start | Verb::Restart) {
        if action.status == ServiceStatus::Running {
            error!("Worker: can not start {}. Already running...", action.name);
            action.error = Some("already running".to_string());
        } else {
            start_process(&pool, &resubmit, &mut action).await;
        }
    }

    {
        let pool = pool.lock().await;
        if let Some(record) = pool.get(&action.suid) {
            action.start_time = record.start_time;
            action.exit_time = record.exit_time;
            action.exit_status = record.exit_status.clone();
            if action.error.is_none() {
                action.error = record.error.clone();
            }
        }
    }

    info!("Worker: service action {} for {} finished", action.verb, action.name);
    let _ = responder.send(action);
}

/// SIGTERM the record's process, escalate to SIGKILL after the grace
/// period, and wait for the reaper to stamp the exit.
pub async fn stop_process(pool: &SharedPool, suid: &str) {
    let pid = {
        let pool = pool.lock().await;
        pool.get(suid).filter(|r| r.is_running()).and_then(|r| r.pid)
    };
    let Some(pid) = pid else {
        return;
    };

    info!("Worker: sending SIGTERM to pid {pid}");
    let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
    if wait_exited(pool, suid, STOP_GRACE).await {
        return;
    }

    warn!("Worker: pid {pid} survived SIGTERM, sending SIGKILL");
    let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
    wait_exited(pool, suid, KILL_WAIT).await;
}

/// Resubmit a task built from the record's stored command and args under
/// the same suid, then wait for the new pool entry and its start time.
async fn start_process(pool: &SharedPool, resubmit: &ServiceChannel, action: &mut ServiceAction) {
    let spec = {
        let mut pool = pool.lock().await;
        let Some(record) = pool.remove(&action.suid) else {
            return;
        };
        ServiceSpec {
            suid: action.suid.clone(),
            name: record.name,
            command: record.command,
            args: record.args,
        }
    };

    // Bounded so a start racing shutdown cannot wedge this worker.
    match timeout(START_WAIT, resubmit.push(spec)).await {
        Ok(Ok(())) => {}
        _ => {
            error!("Worker: could not hand {} back to the pool", action.name);
            action.error = Some("timed out handing the service back to the pool".to_string());
            return;
        }
    }

    info!("Worker: starting service {}...", action.name);

    let deadline = Instant::now() + START_WAIT;
    loop {
        if pool.lock().await.contains(&action.suid) {
            break;
        }
        if Instant::now() >= deadline {
            error!("Worker: done waiting for {} to be added to the pool", action.name);
            action.error = Some("timed out waiting for the service to join the pool".to_string());
            return;
        }
        sleep(POLL).await;
    }

    let deadline = Instant::now() + START_WAIT;
    loop {
        {
            let pool = pool.lock().await;
            if let Some(record) = pool.get(&action.suid) {
                if record.start_time.is_some() {
                    if record.is_running() {
                        action.status = ServiceStatus::Running;
                        action.pid = record.pid;
                    }
                    return;
                }
            }
        }
        if Instant::now() >= deadline {
            return;
        }
        sleep(POLL).await;
    }
}

/// Poll the record until it carries an exit time. True on success, false
/// on deadline; a removed record counts as exited.
async fn wait_exited(pool: &SharedPool, suid: &str, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        {
            let pool = pool.lock().await;
            match pool.get(suid) {
                Some(record) => {
                    if record.exit_time.is_some() {
                        return true;
                    }
                }
                None => return true,
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL).await;
    }
}
