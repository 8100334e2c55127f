//! Byte-oriented request/response pipe between listeners and the registry.
//!
//! Every request is one [`RemoteExchange`] handed through a bounded channel,
//! so two producers can never interleave partial hand-offs. The exchange
//! keeps the wire markers: the consumer announces itself with `0x0` before
//! the payload is sent, and closes with `0xF` after the reply. The double
//! marker lets a producer tell "my request was never picked up" apart from
//! "it was consumed but the reply never came".

use crate::error::FabricError;
use log::{error, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Ready marker, sent by the consumer before the payload crosses.
pub const READY_MARKER: &[u8] = b"0x0";
/// Done marker, sent by the consumer after the reply.
pub const DONE_MARKER: &[u8] = b"0xF";

/// Producer handle of the byte pipe. Cheap to clone; one per listener.
#[derive(Clone)]
pub struct RemoteChannel {
    tx: mpsc::Sender<RemoteExchange>,
    data_timeout: Duration,
}

/// Consumer half of a single exchange, received by the registry.
pub struct RemoteExchange {
    payload_rx: mpsc::Receiver<Vec<u8>>,
    frames_tx: mpsc::Sender<Vec<u8>>,
}

impl RemoteChannel {
    /// Create the pipe. `data_timeout` bounds every producer-side wait.
    pub fn new(data_timeout: Duration) -> (Self, mpsc::Receiver<RemoteExchange>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx, data_timeout }, rx)
    }

    /// Run one full request/response exchange.
    ///
    /// An empty reply means the request was consumed without a response
    /// (the shutdown sentinel path). Side effects of a timed-out exchange
    /// may still land on the other side; the exchange itself is abandoned.
    pub async fn exchange(&self, payload: Vec<u8>) -> Result<Vec<u8>, FabricError> {
        let (payload_tx, payload_rx) = mpsc::channel(1);
        let (frames_tx, mut frames_rx) = mpsc::channel(1);

        self.tx
            .send(RemoteExchange {
                payload_rx,
                frames_tx,
            })
            .await
            .map_err(|_| FabricError::Closed)?;

        let ready = timeout(self.data_timeout, frames_rx.recv())
            .await
            .map_err(|_| FabricError::NeverAccepted)?
            .ok_or(FabricError::Closed)?;
        if ready != READY_MARKER {
            error!("RemoteChannel: ready marker was {:?}", ready);
            return Err(FabricError::Protocol {
                expected: "ready",
                got: ready,
            });
        }

        payload_tx
            .send(payload)
            .await
            .map_err(|_| FabricError::Closed)?;

        let reply = timeout(self.data_timeout, frames_rx.recv())
            .await
            .map_err(|_| FabricError::ReplyTimeout)?
            .ok_or(FabricError::Closed)?;
        if reply == DONE_MARKER {
            // Consumed without a response.
            return Ok(Vec::new());
        }

        match timeout(self.data_timeout, frames_rx.recv()).await {
            Ok(Some(done)) if done == DONE_MARKER => {}
            Ok(Some(done)) => error!("RemoteChannel: done marker was {:?}", done),
            Ok(None) | Err(_) => warn!("RemoteChannel: exchange ended without a done marker"),
        }

        Ok(reply)
    }
}

impl RemoteExchange {
    /// Send the ready marker. Returns false if the producer already gave up.
    pub async fn accept(&self) -> bool {
        self.frames_tx.send(READY_MARKER.to_vec()).await.is_ok()
    }

    /// Wait up to `wait` for the request payload.
    pub async fn payload(&mut self, wait: Duration) -> Option<Vec<u8>> {
        timeout(wait, self.payload_rx.recv()).await.ok().flatten()
    }

    /// Send the reply bytes.
    pub async fn reply(&self, data: Vec<u8>) {
        let _ = self.frames_tx.send(data).await;
    }

    /// Close the exchange with the done marker.
    pub async fn finish(self) {
        let _ = self.frames_tx.send(DONE_MARKER.to_vec()).await;
    }
}
