//! Test helpers for tinitd integration tests.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tinitd::model::{ServiceAction, ServiceRequest, Verb};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Test server wrapper that manages one tinitd process in dev mode.
///
/// Each server gets its own scratch directory for the control socket and
/// the service log files, so tests are parallel-safe.
pub struct TestServer {
    process: Child,
    pub socket: PathBuf,
    pub log_dir: PathBuf,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::start_with_http_port(0).await
    }

    /// Start tinitd with `--dev` and wait for the control socket.
    pub async fn start_with_http_port(
        http_port: u16,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let dir = TempDir::new()?;
        let socket = dir.path().join("tinit.sock");
        let log_dir = dir.path().join("log");

        let bin = env!("CARGO_BIN_EXE_tinitd");
        let process = Command::new(bin)
            .arg("--dev")
            .arg("--unix-socket")
            .arg(&socket)
            .arg("--http-port")
            .arg(http_port.to_string())
            .arg("--log-dir")
            .arg(&log_dir)
            .env("RUST_LOG", "info")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Wait for the server to be ready (up to 5 seconds)
        for _ in 0..50 {
            if UnixStream::connect(&socket).await.is_ok() {
                return Ok(Self {
                    process,
                    socket,
                    log_dir,
                    _dir: dir,
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err("Server did not start in time".into())
    }

    /// Send one raw payload over the unix socket and return the reply.
    pub async fn send(&self, payload: &[u8]) -> Vec<u8> {
        let mut stream = UnixStream::connect(&self.socket)
            .await
            .expect("Failed to connect to control socket");
        stream.write_all(payload).await.expect("write failed");
        stream.shutdown().await.expect("shutdown failed");

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.expect("read failed");
        reply
    }

    /// Send one structured request and return the raw reply.
    pub async fn request(&self, request: &ServiceRequest) -> Vec<u8> {
        let payload = serde_json::to_vec(request).expect("encode failed");
        self.send(&payload).await
    }

    /// Register a service.
    pub async fn register(&self, name: &str, command: &str, args: &[&str]) -> String {
        let reply = self
            .request(&ServiceRequest {
                verb: Verb::Register,
                name: name.to_string(),
                command: command.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            })
            .await;
        String::from_utf8_lossy(&reply).to_string()
    }

    /// Run one action verb and decode the ServiceAction reply.
    pub async fn action(&self, verb: Verb, name: &str) -> ServiceAction {
        let reply = self.action_raw(verb, name).await;
        serde_json::from_slice(&reply).unwrap_or_else(|e| {
            panic!(
                "expected a service action reply, got {:?} ({e})",
                String::from_utf8_lossy(&reply)
            )
        })
    }

    /// Run one action verb and return the raw reply.
    pub async fn action_raw(&self, verb: Verb, name: &str) -> Vec<u8> {
        self.request(&ServiceRequest {
            verb,
            name: name.to_string(),
            command: String::new(),
            args: vec![],
        })
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send SIGTERM for graceful shutdown
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(self.process.id() as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
        let _ = self.process.wait();
    }
}
