//! Signal handling and PID-1 console setup.

use std::io;
use tokio::signal::unix::{SignalKind, signal};

/// Complete when the daemon receives a termination signal.
pub async fn wait_for_shutdown() -> io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

/// Redirect stdin/stdout/stderr to the console when running as PID 1.
pub fn setup_console() {
    use std::fs::OpenOptions;
    use std::os::unix::io::AsRawFd;

    let console_path = "/dev/console";

    if let Ok(console) = OpenOptions::new().read(true).write(true).open(console_path) {
        let fd = console.as_raw_fd();
        unsafe {
            libc::dup2(fd, 0); // stdin
            libc::dup2(fd, 1); // stdout
            libc::dup2(fd, 2); // stderr
        }
        // console file handle dropped here, but fd 0/1/2 keep it open
    }
}
