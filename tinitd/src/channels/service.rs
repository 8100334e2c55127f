//! Typed pipe between the registry and the supervisor.
//!
//! Two flows: new-service descriptors pushed as plain hand-offs, and
//! control actions paired 1:1 with a oneshot responder and wrapped in the
//! action timeout. No markers here; the pairing makes desync impossible.

use crate::error::FabricError;
use crate::model::{ServiceAction, ServiceSpec};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// One control action awaiting the supervisor's single response.
pub struct ActionRequest {
    pub action: ServiceAction,
    pub responder: oneshot::Sender<ServiceAction>,
}

/// Producer handle of the typed pipe.
#[derive(Clone)]
pub struct ServiceChannel {
    data_tx: mpsc::Sender<ServiceSpec>,
    action_tx: mpsc::Sender<ActionRequest>,
    action_timeout: Duration,
}

/// Supervisor-side receivers.
pub struct ServiceReceiver {
    pub data_rx: mpsc::Receiver<ServiceSpec>,
    pub action_rx: mpsc::Receiver<ActionRequest>,
}

impl ServiceChannel {
    /// Create the pipe. `action_timeout` bounds every action round trip.
    pub fn new(action_timeout: Duration) -> (Self, ServiceReceiver) {
        let (data_tx, data_rx) = mpsc::channel(1);
        let (action_tx, action_rx) = mpsc::channel(1);
        (
            Self {
                data_tx,
                action_tx,
                action_timeout,
            },
            ServiceReceiver { data_rx, action_rx },
        )
    }

    /// Hand a new-service descriptor to the supervisor.
    pub async fn push(&self, spec: ServiceSpec) -> Result<(), FabricError> {
        self.data_tx.send(spec).await.map_err(|_| FabricError::Closed)
    }

    /// Run one action round trip; a breach of the timeout abandons the
    /// request (the supervisor may still complete it unobserved).
    pub async fn request(&self, action: ServiceAction) -> Result<ServiceAction, FabricError> {
        let (responder, response_rx) = oneshot::channel();
        self.action_tx
            .send(ActionRequest { action, responder })
            .await
            .map_err(|_| FabricError::Closed)?;

        match timeout(self.action_timeout, response_rx).await {
            Ok(Ok(action)) => Ok(action),
            Ok(Err(_)) => Err(FabricError::Closed),
            Err(_) => Err(FabricError::ReplyTimeout),
        }
    }
}
