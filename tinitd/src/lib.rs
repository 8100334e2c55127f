//! tinitd - Minimal init daemon for containers.
//!
//! Runs as PID 1 inside a container namespace (or locally in dev mode)
//! and supervises a dynamic set of long-running services.
//!
//! ## Architecture
//!
//! - **Registry**: name→descriptor table, decodes control requests
//! - **Supervisor**: process pool, dedicated per-service handlers,
//!   shutdown escalation
//! - **Reaper**: collects every exited child in the namespace
//! - **Listeners**: HTTP and unix-socket transports moving opaque bytes
//!
//! The pieces only talk through the rendezvous fabric in [`channels`]:
//! listeners → registry over the byte pipe, registry → supervisor over
//! the typed pipe.

pub mod channels;
pub mod error;
pub mod listeners;
pub mod model;
pub mod registry;
pub mod supervisor;
pub mod utils;

use crate::channels::{RemoteChannel, ServiceChannel};
use crate::registry::ServiceRegistry;
use crate::supervisor::{Pool, PoolDispatcher, ZombieReaper};
use log::info;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Daemon configuration.
pub struct Config {
    /// Unix socket for the control surface.
    pub unix_socket: PathBuf,
    /// HTTP listening port.
    pub http_port: u16,
    /// HTTP listening interface.
    pub http_listen: String,
    /// Directory for per-service log files (created on demand).
    pub log_dir: PathBuf,
    /// Whether shutdown terminates every process in the namespace.
    pub watch_all: bool,
    /// Producer-side bound on byte-pipe exchanges.
    pub data_timeout: Duration,
    /// Bound on registry↔supervisor action round trips.
    pub action_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        if std::process::id() == 1 {
            // Running as the namespace's init
            Self {
                unix_socket: PathBuf::from("/run/tinit.sock"),
                http_port: 8081,
                http_listen: "127.0.0.1".to_string(),
                log_dir: PathBuf::from("/var/log/tinitd"),
                watch_all: true,
                data_timeout: Duration::from_secs(60),
                action_timeout: Duration::from_secs(60),
            }
        } else {
            // Running locally for development
            Self {
                unix_socket: PathBuf::from("/tmp/tinit.sock"),
                http_port: 8081,
                http_listen: "127.0.0.1".to_string(),
                log_dir: PathBuf::from("/tmp/tinitd/log"),
                watch_all: false,
                data_timeout: Duration::from_secs(60),
                action_timeout: Duration::from_secs(60),
            }
        }
    }
}

/// Handles for the running core units.
pub struct Services {
    /// Producer half of the byte pipe, cloned into every listener.
    pub remote: RemoteChannel,
    registry_stop: mpsc::Sender<()>,
    supervisor_stop: mpsc::Sender<()>,
    reaper_stop: mpsc::Sender<()>,
    registry_handle: JoinHandle<()>,
    supervisor_handle: JoinHandle<()>,
    reaper_handle: JoinHandle<()>,
}

/// Wire up and start the core units: reaper, supervisor, registry.
pub fn initialize_services(config: &Config) -> Services {
    let pool = Pool::new();
    let (remote, remote_rx) = RemoteChannel::new(config.data_timeout);
    let (service_chan, service_recv) = ServiceChannel::new(config.action_timeout);

    let (reaper_stop, reaper_stop_rx) = mpsc::channel(1);
    let reaper = ZombieReaper::new(pool.clone(), reaper_stop_rx);
    let reaper_handle = tokio::spawn(reaper.run());
    info!("Reaper initialized");

    let (supervisor_stop, supervisor_stop_rx) = mpsc::channel(1);
    let dispatcher = PoolDispatcher::new(
        service_recv,
        service_chan.clone(),
        supervisor_stop_rx,
        pool,
        config.watch_all,
        config.log_dir.clone(),
    );
    let supervisor_handle = tokio::spawn(dispatcher.run());
    info!("Supervisor initialized");

    let (registry_stop, registry_stop_rx) = mpsc::channel(1);
    let registry = ServiceRegistry::new(remote_rx, registry_stop_rx, service_chan);
    let registry_handle = tokio::spawn(registry.run());
    info!("Registry initialized");

    Services {
        remote,
        registry_stop,
        supervisor_stop,
        reaper_stop,
        registry_handle,
        supervisor_handle,
        reaper_handle,
    }
}

impl Services {
    /// Tear the core down in order: registry, then the supervisor (which
    /// runs the shutdown escalation), then, last, the reaper. Each unit
    /// is awaited before the next one is signalled.
    pub async fn shutdown(self) {
        let _ = self.registry_stop.send(()).await;
        let _ = self.registry_handle.await;

        let _ = self.supervisor_stop.send(()).await;
        let _ = self.supervisor_handle.await;

        let _ = self.reaper_stop.send(()).await;
        let _ = self.reaper_handle.await;
    }
}
