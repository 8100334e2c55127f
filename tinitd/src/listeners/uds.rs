//! Unix-domain-socket listener.
//!
//! A client writes one payload and shuts down its write half; the reply
//! is written back on the same connection.

use crate::channels::RemoteChannel;
use log::{error, info};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub struct UdsServer {
    listener: UnixListener,
    socket: PathBuf,
    remote: RemoteChannel,
    shutdown_rx: mpsc::Receiver<()>,
}

impl UdsServer {
    /// Bind the socket, replacing a stale file from a previous run.
    /// A bind failure is fatal to the daemon.
    pub fn bind(
        socket: &Path,
        remote: RemoteChannel,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> io::Result<Self> {
        let _ = std::fs::remove_file(socket);
        let listener = UnixListener::bind(socket)?;
        info!("SocketServer: listening on {}", socket.display());
        Ok(Self {
            listener,
            socket: socket.to_path_buf(),
            remote,
            shutdown_rx,
        })
    }

    pub async fn run(mut self) {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            connections.spawn(serve_connection(stream, self.remote.clone()));
                        }
                        Err(e) => error!("SocketServer: accept failed: {e}"),
                    }
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }

        while connections.join_next().await.is_some() {}
        let _ = std::fs::remove_file(&self.socket);
        info!("SocketServer: Bye!");
    }
}

async fn serve_connection(mut stream: UnixStream, remote: RemoteChannel) {
    let mut payload = Vec::new();
    if let Err(e) = stream.read_to_end(&mut payload).await {
        error!("SocketServer: read failed: {e}");
        return;
    }
    if payload.is_empty() {
        return;
    }

    match remote.exchange(payload).await {
        Ok(reply) => {
            let _ = stream.write_all(&reply).await;
        }
        Err(e) => {
            error!("SocketServer: {e}");
            let _ = stream.write_all(e.to_string().as_bytes()).await;
        }
    }
    let _ = stream.shutdown().await;
}
