//! Namespace process enumeration for watch-all shutdown.

use std::fs;
use std::path::Path;

/// Every live pid in the namespace except PID 1 and the daemon itself.
///
/// Kernel threads and already-gone entries are skipped by requiring a
/// readable cmdline.
pub fn live_processes() -> Vec<i32> {
    let mut pids = Vec::new();
    let Ok(entries) = fs::read_dir("/proc") else {
        return pids;
    };

    let own_pid = std::process::id() as i32;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Ok(pid) = name.to_string_lossy().parse::<i32>() else {
            continue;
        };
        if pid == 1 || pid == own_pid {
            continue;
        }
        if !Path::new("/proc").join(pid.to_string()).join("cmdline").exists() {
            continue;
        }
        pids.push(pid);
    }
    pids
}
