//! Registry dispatcher: accepts byte-pipe exchanges and hands each one
//! to a request worker.

use super::{SharedServices, worker};
use crate::channels::{RemoteExchange, ServiceChannel};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

/// How long a worker waits for the payload after sending the ready marker.
const PAYLOAD_WAIT: Duration = Duration::from_secs(10);

pub struct ServiceRegistry {
    remote_rx: mpsc::Receiver<RemoteExchange>,
    shutdown_rx: mpsc::Receiver<()>,
    services: SharedServices,
    service_chan: ServiceChannel,
    workers: JoinSet<()>,
}

impl ServiceRegistry {
    pub fn new(
        remote_rx: mpsc::Receiver<RemoteExchange>,
        shutdown_rx: mpsc::Receiver<()>,
        service_chan: ServiceChannel,
    ) -> Self {
        Self {
            remote_rx,
            shutdown_rx,
            services: Arc::new(Mutex::new(HashMap::new())),
            service_chan,
            workers: JoinSet::new(),
        }
    }

    pub async fn run(mut self) {
        info!("Registry: running and waiting for requests");

        loop {
            tokio::select! {
                Some(exchange) = self.remote_rx.recv() => {
                    let services = self.services.clone();
                    let chan = self.service_chan.clone();
                    self.workers.spawn(worker::handle_exchange(
                        services,
                        chan,
                        exchange,
                        PAYLOAD_WAIT,
                    ));
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }

        // Let in-flight requests finish before declaring ourselves done.
        while self.workers.join_next().await.is_some() {}
        info!("Registry: Bye!");
    }
}
