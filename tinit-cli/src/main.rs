//! tinit - command-line client for tinitd.
//!
//! One verb per invocation; prints the raw daemon response.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tinitd::model::{ServiceRequest, Verb};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// CLI for the tinitd init daemon.
#[derive(Parser)]
#[command(name = "tinit")]
#[command(about = "CLI for the tinitd init daemon", long_about = None)]
struct Cli {
    /// tinitd HTTP address (e.g. http://127.0.0.1:8081); uses the unix
    /// socket when not set
    #[arg(short, long)]
    server: Option<String>,

    /// tinitd unix socket
    #[arg(long, default_value = "/tmp/tinit.sock")]
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new service
    Register {
        /// Service name
        #[arg(short, long)]
        name: String,

        /// Command to execute
        #[arg(short, long)]
        command: String,

        /// Arguments passed to the command
        args: Vec<String>,
    },
    /// Start a registered service
    Start { name: String },
    /// Stop a running service
    Stop { name: String },
    /// Restart a service
    Restart { name: String },
    /// Delete a service, stopping it first
    Delete { name: String },
    /// Show the status of a service
    Status { name: String },
    /// List registered services
    List,
}

impl Commands {
    fn into_request(self) -> ServiceRequest {
        let (verb, name, command, args) = match self {
            Commands::Register {
                name,
                command,
                args,
            } => (Verb::Register, name, command, args),
            Commands::Start { name } => (Verb::Start, name, String::new(), vec![]),
            Commands::Stop { name } => (Verb::Stop, name, String::new(), vec![]),
            Commands::Restart { name } => (Verb::Restart, name, String::new(), vec![]),
            Commands::Delete { name } => (Verb::Delete, name, String::new(), vec![]),
            Commands::Status { name } => (Verb::Status, name, String::new(), vec![]),
            Commands::List => (Verb::List, String::new(), String::new(), vec![]),
        };
        ServiceRequest {
            verb,
            name,
            command,
            args,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let request = cli.command.into_request();
    let payload = serde_json::to_vec(&request)?;

    let reply = match &cli.server {
        Some(server) => send_http(server, payload).await?,
        None => send_uds(&cli.socket, payload).await?,
    };

    println!("{}", String::from_utf8_lossy(&reply));
    Ok(())
}

async fn send_http(server: &str, payload: Vec<u8>) -> Result<Vec<u8>> {
    let url = format!("{}/api/services", server.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .body(payload)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?;
    Ok(response.bytes().await?.to_vec())
}

async fn send_uds(socket: &str, payload: Vec<u8>) -> Result<Vec<u8>> {
    let mut stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("could not connect to {socket}"))?;
    stream.write_all(&payload).await?;
    // Half-close so the daemon sees the end of the request
    stream.shutdown().await?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await?;
    Ok(reply)
}
