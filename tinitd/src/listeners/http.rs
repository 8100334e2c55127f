//! HTTP listener: one POST endpoint carrying the raw request payload.

use crate::channels::RemoteChannel;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use log::{error, info};
use std::io;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub struct HttpServer {
    listener: TcpListener,
    remote: RemoteChannel,
    shutdown_rx: mpsc::Receiver<()>,
}

impl HttpServer {
    /// Bind the listening socket. A bind failure is fatal to the daemon.
    pub async fn bind(
        listen: &str,
        port: u16,
        remote: RemoteChannel,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind((listen, port)).await?;
        info!("HttpServer: listening on {listen}:{port}");
        Ok(Self {
            listener,
            remote,
            shutdown_rx,
        })
    }

    pub async fn run(self) {
        let Self {
            listener,
            remote,
            mut shutdown_rx,
        } = self;

        let app = Router::new()
            .route("/api/services", post(services))
            .with_state(remote);

        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
        };

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("HttpServer: {e}");
        }
        info!("HttpServer: Bye!");
    }
}

async fn services(State(remote): State<RemoteChannel>, body: Bytes) -> Response {
    match remote.exchange(body.to_vec()).await {
        Ok(reply) => (StatusCode::OK, reply).into_response(),
        Err(e) => {
            error!("HttpServer: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
