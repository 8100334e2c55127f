//! tinitd - Minimal init daemon for containers.
//!
//! Runs as PID 1 in a container namespace, or locally with `--dev`.

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use nix::sys::prctl;
use std::path::PathBuf;
use tinitd::listeners::{HttpServer, UdsServer};
use tinitd::utils::{env, signals};
use tinitd::{Config, initialize_services};
use tokio::sync::mpsc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimal init daemon for containers.
#[derive(Parser)]
#[command(name = "tinitd")]
#[command(version = VERSION)]
#[command(about = "Minimal init daemon for containers")]
struct Args {
    /// Allow running without being PID 1; disables watch-all shutdown
    #[arg(long)]
    dev: bool,

    /// Unix socket for the control surface
    #[arg(long)]
    unix_socket: Option<PathBuf>,

    /// HTTP listening port
    #[arg(long)]
    http_port: Option<u16>,

    /// HTTP listening interface
    #[arg(long)]
    http_listener: Option<String>,

    /// Directory for per-service log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let is_pid1 = std::process::id() == 1;

    // Redirect stdin/stdout/stderr to the console when running as PID 1
    if is_pid1 {
        signals::setup_console();
    }

    let daemon_env = env::daemon_env();

    // Initialize logging; TINIT_DEBUG=true raises the default level
    let default_level = if daemon_env.get("debug").map(String::as_str) == Some("true") {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    info!("tinitd v{} starting", VERSION);

    // Parse CLI args (only in non-PID1 mode)
    let args = if is_pid1 {
        Args {
            dev: false,
            unix_socket: None,
            http_port: None,
            http_listener: None,
            log_dir: None,
        }
    } else {
        Args::parse()
    };

    if !is_pid1 && !args.dev {
        anyhow::bail!("not pid 1, exiting... (use --dev to run unprivileged)");
    }

    let mut config = Config::default();
    config.watch_all = !args.dev;
    if let Some(socket) = args.unix_socket {
        config.unix_socket = socket;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(listen) = args.http_listener {
        config.http_listen = listen;
    }
    if let Some(log_dir) = args.log_dir {
        config.log_dir = log_dir;
    }
    if let Some(port) = daemon_env.get("port") {
        match port.parse() {
            Ok(port) => config.http_port = port,
            Err(_) => error!("Ignoring invalid TINIT_PORT: {port}"),
        }
    }
    if let Some(listen) = daemon_env.get("listen") {
        config.http_listen = listen.clone();
    }

    if config.watch_all {
        warn!(
            "watch-all is enabled: on stop tinitd will SIGTERM and SIGKILL (on timeout) all processes"
        );
    } else {
        // Orphaned grandchildren must still reparent to us for reaping
        prctl::set_child_subreaper(true)
            .map_err(|e| anyhow::anyhow!("Failed to set as child subreaper: {}", e))?;
    }

    let services = initialize_services(&config);

    let (uds_stop, uds_stop_rx) = mpsc::channel(1);
    let uds = UdsServer::bind(&config.unix_socket, services.remote.clone(), uds_stop_rx)?;
    let uds_handle = tokio::spawn(uds.run());

    let (http_stop, http_stop_rx) = mpsc::channel(1);
    let http = HttpServer::bind(
        &config.http_listen,
        config.http_port,
        services.remote.clone(),
        http_stop_rx,
    )
    .await?;
    let http_handle = tokio::spawn(http.run());

    info!("tinitd ready");
    signals::wait_for_shutdown().await?;
    info!("Interrupted");

    // Strict teardown order: listeners, then registry, then supervisor
    // (escalation), then the reaper.
    let _ = uds_stop.send(()).await;
    let _ = uds_handle.await;
    let _ = http_stop.send(()).await;
    let _ = http_handle.await;
    services.shutdown().await;

    info!("Bye!");
    Ok(())
}
