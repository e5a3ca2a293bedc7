//! Long-lived tool servers announced through lock files

use crate::error::{Error, Result};
use crate::lock::{self, LockFileContent};
use async_io::Timer;
use chrono::{DateTime, Utc};
use command_executor::{
    Command, Error as ExecutorError, ExitStatus, Executor, ProcessHandle, RunResult, signal,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default wait after each of the close request and the kill
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

const PID_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A tool server started by this session
#[derive(Debug)]
pub struct ServerProcess {
    process: RunResult,
    target: PathBuf,
    listen_address: Url,
    lock_file_path: PathBuf,
    started_at: DateTime<Utc>,
}

impl ServerProcess {
    /// Launch `command` in serve mode and announce it in the lock file for `target`
    ///
    /// If the lock file cannot be written the process is killed again.
    pub async fn start(
        executor: &Executor,
        command: &Command,
        target: &Path,
        listen_address: Url,
        lock_dir: &Path,
    ) -> Result<Self> {
        let lock_file_path = lock::lock_file_path(lock_dir, target)?;
        let mut process = executor.run(&command.detached()).await?;

        let content = LockFileContent::new(process.pid(), listen_address.clone());
        if let Err(e) = lock::write_lock_file(&lock_file_path, &content) {
            warn!(
                "Failed to write lock file {} for pid {}, killing server: {}",
                lock_file_path.display(),
                process.pid(),
                e
            );
            if let Err(kill_err) = process.kill().await {
                debug!("Failed to kill server {}: {}", process.pid(), kill_err);
            }
            return Err(e);
        }

        info!(
            "Server for {} started (pid {}, listening on {})",
            target.display(),
            process.pid(),
            listen_address
        );
        Ok(Self {
            process,
            target: target.to_path_buf(),
            listen_address,
            lock_file_path,
            started_at: Utc::now(),
        })
    }

    /// Server process ID
    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    /// Game data file the server was started for
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Address the server listens on
    pub fn listen_address(&self) -> &Url {
        &self.listen_address
    }

    /// Lock file announcing this server
    pub fn lock_file_path(&self) -> &Path {
        &self.lock_file_path
    }

    /// When the server was started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Underlying process
    pub fn process(&self) -> &RunResult {
        &self.process
    }

    /// Ask the OS whether the server has exited
    pub fn poll_exit(&mut self) -> command_executor::Result<Option<ExitStatus>> {
        self.process.poll_exit()
    }

    /// Stop the server: close request, then kill after `grace`
    ///
    /// The lock file is deleted whatever happens to the process.
    pub async fn end_gracefully(mut self, grace: Duration) -> Result<()> {
        let pid = self.pid();
        let result = self.shut_down(grace).await;
        lock::delete_lock_file(&self.lock_file_path).await;
        self.process.dispose();
        match &result {
            Ok(()) => info!("Server {} for {} ended", pid, self.target.display()),
            Err(e) => warn!("Server {} for {} did not end cleanly: {}", pid, self.target.display(), e),
        }
        result
    }

    async fn shut_down(&mut self, grace: Duration) -> Result<()> {
        let pid = self.pid();
        if matches!(self.process.poll_exit(), Ok(Some(_))) {
            debug!("Server {} already exited", pid);
            return Ok(());
        }

        match self.process.terminate().await {
            Ok(()) | Err(ExecutorError::ProcessNotFound { .. }) => {}
            Err(e) => debug!("Close request to server {} failed: {}", pid, e),
        }
        if wait_within(&mut self.process, grace).await {
            return Ok(());
        }

        warn!("Server {} ignored the close request, killing it", pid);
        if let Err(e) = self.process.kill().await {
            debug!("Kill of server {} failed: {}", pid, e);
        }
        if wait_within(&mut self.process, grace).await {
            Ok(())
        } else {
            Err(Error::StillRunning { pid })
        }
    }
}

async fn wait_within(process: &mut RunResult, limit: Duration) -> bool {
    let pid = process.pid();
    let exited = async {
        match process.wait().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Waiting on server {} failed: {}", pid, e);
                !signal::is_alive(pid)
            }
        }
    };
    let timed_out = async {
        Timer::after(limit).await;
        false
    };
    futures_lite::future::or(exited, timed_out).await
}

/// End the server recorded in the lock file at `lock_file_path`
///
/// Returns true if a running process was found and ended. A missing or
/// unparsable lock file, or a process that is already gone, counts as
/// already ended. The lock file is deleted in every case.
pub async fn find_and_end_gracefully(lock_file_path: &Path, grace: Duration) -> Result<bool> {
    let result = match lock::read_lock_file(lock_file_path).await {
        Ok(Some(content)) => end_pid(content.pid, grace).await,
        Ok(None) => Ok(false),
        Err(e) => {
            debug!("Ignoring unusable lock file {}: {}", lock_file_path.display(), e);
            Ok(false)
        }
    };
    lock::delete_lock_file(lock_file_path).await;
    result
}

async fn end_pid(pid: u32, grace: Duration) -> Result<bool> {
    if !signal::is_alive(pid) {
        debug!("Server {} is already gone", pid);
        return Ok(false);
    }

    match signal::request_close(pid) {
        Ok(()) => {
            if signal::wait_for_exit(pid, grace, PID_POLL_INTERVAL).await {
                info!("Server {} ended after close request", pid);
                return Ok(true);
            }
            warn!("Server {} ignored the close request, killing it", pid);
        }
        Err(ExecutorError::ProcessNotFound { .. }) => return Ok(false),
        Err(e) => debug!("Close request to server {} failed: {}", pid, e),
    }

    match signal::force_kill(pid) {
        Ok(()) => {}
        Err(ExecutorError::ProcessNotFound { .. }) => return Ok(true),
        Err(e) => return Err(e.into()),
    }
    if signal::wait_for_exit(pid, grace, PID_POLL_INTERVAL).await {
        info!("Server {} killed", pid);
        Ok(true)
    } else {
        Err(Error::StillRunning { pid })
    }
}
