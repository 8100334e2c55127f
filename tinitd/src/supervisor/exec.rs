//! Forking of service processes.

use crate::error::SpawnError;
use nix::unistd::setsid;
use std::fs::{DirBuilder, File, OpenOptions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

fn open_log(log_dir: &Path, file_name: String) -> Result<File, SpawnError> {
    let path = log_dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o666)
        .open(&path)
        .map_err(|source| SpawnError::LogFile { path, source })
}

/// Fork one service process: own session, cwd `/`, stdin closed,
/// stdout/stderr appended to per-service files under `log_dir` (created
/// on demand).
pub fn spawn_service(
    log_dir: &Path,
    name: &str,
    command: &str,
    args: &[String],
) -> Result<Child, SpawnError> {
    if !log_dir.is_dir() {
        DirBuilder::new()
            .recursive(true)
            .mode(0o760)
            .create(log_dir)
            .map_err(|source| SpawnError::LogDir {
                path: log_dir.to_path_buf(),
                source,
            })?;
    }

    let stdout = open_log(log_dir, format!("{name}-out.log"))?;
    let stderr = open_log(log_dir, format!("{name}-err.log"))?;

    let mut cmd = Command::new(command);
    cmd.args(args)
        .current_dir("/")
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);

    // Detach from the daemon's controlling terminal.
    unsafe {
        cmd.pre_exec(|| setsid().map(|_| ()).map_err(io::Error::from));
    }

    cmd.spawn().map_err(|source| SpawnError::Spawn {
        command: command.to_string(),
        source,
    })
}
