//! PID file handling and terminating running servers.

use std::io;
use std::path::{Path, PathBuf};

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

const PID_FILE: &str = "rmai.pid";
const PROCESS_NAME: &str = "rmai";

/// Path of the server's PID file inside `data_dir`.
pub fn pid_file(data_dir: &Path) -> PathBuf {
    data_dir.join(PID_FILE)
}

/// Write the current process id to the PID file.
pub fn write_pid_file(data_dir: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(data_dir)?;
    let path = pid_file(data_dir);
    std::fs::write(&path, std::process::id().to_string())?;
    Ok(path)
}

pub fn remove_pid_file(data_dir: &Path) {
    let path = pid_file(data_dir);
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("failed to remove {}: {e}", path.display());
        }
    }
}

/// PID recorded in the PID file, if the file exists and holds a number.
pub fn read_pid_file(data_dir: &Path) -> Option<u32> {
    std::fs::read_to_string(pid_file(data_dir))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Whether a process with this PID is currently running.
pub fn is_running(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys.process(Pid::from_u32(pid)).is_some()
}

/// PID from the PID file, but only when that process is still an `rmai serve`.
///
/// A PID file left behind by a crash may name a recycled PID that now
/// belongs to an unrelated program.
pub fn running_server_pid(data_dir: &Path) -> Option<u32> {
    let pid = read_pid_file(data_dir)?;
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys.process(Pid::from_u32(pid))
        .filter(|p| looks_like_server(p))
        .map(|_| pid)
}

fn terminate(process: &sysinfo::Process) -> bool {
    process
        .kill_with(Signal::Term)
        .unwrap_or_else(|| process.kill())
}

fn is_server_process(name: &str, cmd: &[String]) -> bool {
    let name_matches = name == PROCESS_NAME || name.starts_with(&format!("{PROCESS_NAME}."));
    name_matches && cmd.iter().any(|arg| arg == "serve")
}

fn looks_like_server(process: &sysinfo::Process) -> bool {
    let name = process.name().to_string_lossy();
    let cmd: Vec<String> = process
        .cmd()
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    is_server_process(&name, &cmd)
}

/// Terminate the running server. Returns how many processes were signalled.
///
/// The PID file is trusted only when it names an `rmai serve` process; a
/// stale file is removed and every `rmai serve` other than the caller is
/// signalled instead.
pub fn stop_server(data_dir: &Path) -> usize {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);
    let own = std::process::id();

    if let Some(pid) = read_pid_file(data_dir) {
        remove_pid_file(data_dir);
        let server = sys
            .process(Pid::from_u32(pid))
            .filter(|p| pid != own && looks_like_server(p));
        match server {
            Some(process) => {
                let signalled = terminate(process);
                tracing::info!(pid, signalled, "stop via pid file");
                return usize::from(signalled);
            }
            None => tracing::warn!(pid, "pid file does not name a running server, ignoring it"),
        }
    }

    let mut count = 0;
    for (pid, process) in sys.processes() {
        if pid.as_u32() == own {
            continue;
        }
        if looks_like_server(process) && terminate(process) {
            tracing::info!(pid = pid.as_u32(), "terminated server process");
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_pid_file(dir.path()).is_none());

        write_pid_file(dir.path()).unwrap();
        assert_eq!(read_pid_file(dir.path()), Some(std::process::id()));
        assert!(is_running(std::process::id()));

        remove_pid_file(dir.path());
        assert!(read_pid_file(dir.path()).is_none());
        remove_pid_file(dir.path());
    }

    #[test]
    fn garbage_pid_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(pid_file(dir.path()), "not-a-pid").unwrap();
        assert!(read_pid_file(dir.path()).is_none());
    }

    #[test]
    fn stale_pid_file_never_signals_unrelated_process() {
        let dir = tempfile::tempdir().unwrap();
        // The test binary is running but is not `rmai serve`.
        write_pid_file(dir.path()).unwrap();
        assert!(running_server_pid(dir.path()).is_none());

        assert_eq!(stop_server(dir.path()), 0);
        assert!(read_pid_file(dir.path()).is_none());
        assert!(is_running(std::process::id()));
    }

    #[test]
    fn server_process_matching() {
        let serve = vec!["/usr/bin/rmai".to_string(), "serve".to_string()];
        assert!(is_server_process("rmai", &serve));
        assert!(is_server_process("rmai.exe", &serve));
        assert!(!is_server_process("rmai", &["rmai".into(), "stop".into()]));
        assert!(!is_server_process("python", &serve));
    }
}
