//! Control of processes known only by their ID
//!
//! Used for processes started by another session, where no child handle is
//! available and the PID is all that survives (for example in a lock file).

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// Returns true if a process with this ID is running
///
/// Zombies (exited but not yet reaped) count as not running.
pub fn is_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        if pid == 0 || pid > i32::MAX as u32 {
            return false;
        }
        // Signal 0 only checks that the process exists and can be signalled;
        // EPERM still means the process is there
        let exists = match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => true,
            Err(nix::errno::Errno::EPERM) => true,
            Err(_) => false,
        };
        exists && !is_zombie(pid)
    }

    #[cfg(not(unix))]
    {
        use sysinfo::{Pid, ProcessStatus};

        if pid == 0 {
            return false;
        }
        process_table(pid)
            .process(Pid::from_u32(pid))
            .is_some_and(|process| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
    }
}

/// Process table refreshed for `pid` only
#[cfg(not(unix))]
fn process_table(pid: u32) -> sysinfo::System {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[Pid::from_u32(pid)]),
        true,
        ProcessRefreshKind::nothing(),
    );
    system
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    // Format: "pid (comm) state ..."; comm may itself contain parentheses
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            let rest = &stat[stat.rfind(')')? + 1..];
            rest.split_whitespace().next().map(|state| state == "Z")
        })
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Ask the process to shut down (SIGTERM)
pub fn request_close(pid: u32) -> Result<()> {
    send(pid, Signal::Terminate)
}

/// Forcefully end the process (SIGKILL)
pub fn force_kill(pid: u32) -> Result<()> {
    send(pid, Signal::Kill)
}

#[derive(Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn send(pid: u32, signal: Signal) -> Result<()> {
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;

    let nix_signal = match signal {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(Error::ProcessNotFound { pid });
    }

    match signal::kill(Pid::from_raw(pid as i32), nix_signal) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Err(Error::ProcessNotFound { pid }),
        Err(e) => Err(Error::signal_failed(nix_signal as i32, e.to_string())),
    }
}

#[cfg(not(unix))]
fn send(pid: u32, signal: Signal) -> Result<()> {
    match signal {
        // No cooperative close for a process we hold no handle to
        Signal::Terminate => Err(Error::Unsupported {
            operation: "terminating a process by id",
        }),
        Signal::Kill => match process_table(pid).process(sysinfo::Pid::from_u32(pid)) {
            Some(process) if process.kill() => Ok(()),
            Some(_) => Err(Error::signal_failed(9, format!("could not kill process {}", pid))),
            None => Err(Error::ProcessNotFound { pid }),
        },
    }
}

/// Poll until the process is gone or the timeout elapses
///
/// Returns true if the process exited in time.
pub async fn wait_for_exit(pid: u32, timeout: Duration, poll_interval: Duration) -> bool {
    let started = Instant::now();
    loop {
        if !is_alive(pid) {
            return true;
        }
        if started.elapsed() >= timeout {
            return false;
        }
        async_io::Timer::after(poll_interval).await;
    }
}
