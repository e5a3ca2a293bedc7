//! Running process handle with buffered output capture

use crate::error::{Error, Result};
use crate::event::{LogSource, ProcessEvent, ProcessEventType};
use crate::process::{ExitStatus, ProcessHandle};
use async_channel::Sender;
use async_process::Child;
use async_trait::async_trait;
use futures_lite::io::{AsyncBufReadExt, AsyncRead, BufReader};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Shared capture state, written by the stream readers
pub(crate) struct CaptureState {
    pid: u32,
    /// Bit set of captured streams that have not reported end-of-stream
    pending: AtomicU8,
    stdout: Option<Mutex<String>>,
    stderr: Option<Mutex<String>>,
    events: Option<Sender<ProcessEvent>>,
}

impl CaptureState {
    fn new(pid: u32, stdout: bool, stderr: bool, events: Option<Sender<ProcessEvent>>) -> Self {
        let mut pending = 0;
        if stdout {
            pending |= LogSource::Stdout.pending_bit();
        }
        if stderr {
            pending |= LogSource::Stderr.pending_bit();
        }
        Self {
            pid,
            pending: AtomicU8::new(pending),
            stdout: stdout.then(|| Mutex::new(String::new())),
            stderr: stderr.then(|| Mutex::new(String::new())),
            events,
        }
    }

    /// Line callback; `None` marks end-of-stream for `source`
    ///
    /// Returns false once the reader for `source` should stop.
    pub(crate) fn on_line(&self, source: LogSource, line: Option<String>) -> bool {
        match line {
            Some(line) => {
                if let Some(buffer) = self.buffer(source) {
                    let mut buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
                    buffer.push_str(&line);
                    buffer.push('\n');
                }
                self.emit(ProcessEvent::new_with_data(self.pid, source.line_event(), line));
                true
            }
            None => {
                self.clear_pending(source);
                self.emit(ProcessEvent::new(
                    self.pid,
                    ProcessEventType::StreamClosed(source),
                ));
                false
            }
        }
    }

    fn clear_pending(&self, source: LogSource) {
        let bit = source.pending_bit();
        let mut current = self.pending.load(Ordering::Acquire);
        while current & bit != 0 {
            match self.pending.compare_exchange_weak(
                current,
                current & !bit,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    fn buffer(&self, source: LogSource) -> Option<&Mutex<String>> {
        match source {
            LogSource::Stdout => self.stdout.as_ref(),
            LogSource::Stderr => self.stderr.as_ref(),
        }
    }

    fn text(&self, source: LogSource) -> Option<String> {
        self.buffer(source)
            .map(|buffer| buffer.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    pub(crate) fn emit(&self, event: ProcessEvent) {
        if let Some(events) = &self.events {
            // Full or closed sinks lose the event; the buffers stay authoritative
            if events.try_send(event).is_err() {
                trace!("Dropped event for process {}", self.pid);
            }
        }
    }
}

async fn read_lines<R>(state: Arc<CaptureState>, source: LogSource, stream: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if !state.on_line(source, Some(line)) {
                    return;
                }
            }
            Err(e) => {
                debug!("Error reading {:?} of process {}: {}", source, state.pid, e);
                break;
            }
        }
    }
    state.on_line(source, None);
}

/// A started process and the output it produced so far
///
/// The exit status stays unset until the executor (or [`ProcessHandle::wait`])
/// records it. Dropping the result disposes it: the stream readers are
/// cancelled and the child handle is released, which does not kill the
/// process.
pub struct RunResult {
    child: Option<Child>,
    pid: u32,
    name: String,
    exit_status: Option<ExitStatus>,
    capture: Arc<CaptureState>,
    readers: Vec<smol::Task<()>>,
}

impl RunResult {
    pub(crate) fn start(mut child: Child, name: String, events: Option<Sender<ProcessEvent>>) -> Self {
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let capture = Arc::new(CaptureState::new(
            pid,
            stdout.is_some(),
            stderr.is_some(),
            events,
        ));
        capture.emit(ProcessEvent::new(pid, ProcessEventType::Started));

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = stdout {
            readers.push(smol::spawn(read_lines(capture.clone(), LogSource::Stdout, stdout)));
        }
        if let Some(stderr) = stderr {
            readers.push(smol::spawn(read_lines(capture.clone(), LogSource::Stderr, stderr)));
        }

        Self {
            child: Some(child),
            pid,
            name,
            exit_status: None,
            capture,
            readers,
        }
    }

    /// Process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Program name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while any captured stream has not reported end-of-stream
    pub fn has_pending_data(&self) -> bool {
        self.capture.pending.load(Ordering::Acquire) != 0
    }

    /// Captured stdout so far, `None` when stdout is not captured
    pub fn stdout(&self) -> Option<String> {
        self.capture.text(LogSource::Stdout)
    }

    /// Captured stderr so far, `None` when stderr is not captured
    pub fn stderr(&self) -> Option<String> {
        self.capture.text(LogSource::Stderr)
    }

    /// Recorded exit status, `None` until finalised
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Recorded exit code, `None` until finalised or when ended by a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.and_then(|status| status.code)
    }

    /// Ask the OS whether the process has exited, without recording anything
    pub fn poll_exit(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }
        let child = self.child_mut()?;
        Ok(child.try_status()?.map(ExitStatus::from))
    }

    /// Whether the process has exited
    pub fn has_exited(&mut self) -> Result<bool> {
        Ok(self.poll_exit()?.is_some())
    }

    /// Whether [`dispose`](Self::dispose) already ran
    pub fn is_disposed(&self) -> bool {
        self.child.is_none()
    }

    /// Cancel the stream readers and release the child handle
    ///
    /// Safe to call any number of times.
    pub fn dispose(&mut self) {
        self.readers.clear();
        if self.child.take().is_some() {
            trace!("Disposed {} process {}", self.name, self.pid);
        }
    }

    pub(crate) fn finalize(&mut self, status: ExitStatus) {
        if self.exit_status.is_none() {
            self.exit_status = Some(status);
            self.capture.emit(ProcessEvent::new(
                self.pid,
                ProcessEventType::Exited {
                    code: status.code,
                    signal: status.signal,
                },
            ));
        }
    }

    pub(crate) fn child_mut(&mut self) -> Result<&mut Child> {
        self.child
            .as_mut()
            .ok_or(Error::ProcessNotFound { pid: self.pid })
    }

    /// Synchronous kill used when abandoning a wait
    pub(crate) fn kill_now(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.kill() {
                debug!("Failed to kill {} process {}: {}", self.name, self.pid, e);
            }
        }
    }
}

impl std::fmt::Debug for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunResult")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("exit_status", &self.exit_status)
            .field("has_pending_data", &self.has_pending_data())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for RunResult {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[async_trait]
impl ProcessHandle for RunResult {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let status = ExitStatus::from(self.child_mut()?.status().await?);
        self.finalize(status);
        Ok(status)
    }

    async fn terminate(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            crate::signal::request_close(self.pid)
        }

        #[cfg(not(unix))]
        {
            self.child_mut()?
                .kill()
                .map_err(|e| Error::signal_failed(-1, e.to_string()))
        }
    }

    async fn kill(&mut self) -> Result<()> {
        self.child_mut()?
            .kill()
            .map_err(|e| Error::signal_failed(9, e.to_string()))
    }

    async fn interrupt(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGINT)
                .map_err(|e| Error::signal_failed(2, e.to_string()))
        }

        #[cfg(not(unix))]
        {
            // Windows doesn't have SIGINT equivalent
            self.terminate().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(stdout: bool, stderr: bool) -> CaptureState {
        CaptureState::new(7, stdout, stderr, None)
    }

    #[test]
    fn test_lines_are_appended_per_stream() {
        let state = state(true, true);
        assert!(state.on_line(LogSource::Stdout, Some("1.2.3".into())));
        assert!(state.on_line(LogSource::Stderr, Some("warning".into())));
        assert!(state.on_line(LogSource::Stdout, Some("done".into())));

        assert_eq!(state.text(LogSource::Stdout).unwrap(), "1.2.3\ndone\n");
        assert_eq!(state.text(LogSource::Stderr).unwrap(), "warning\n");
    }

    #[test]
    fn test_pending_clears_only_after_both_streams_close() {
        let state = state(true, true);
        assert_eq!(state.pending.load(Ordering::Acquire), 0b11);

        assert!(!state.on_line(LogSource::Stdout, None));
        assert_eq!(state.pending.load(Ordering::Acquire), 0b10);

        // A repeated end-of-stream must not flip the bit back
        state.on_line(LogSource::Stdout, None);
        assert_eq!(state.pending.load(Ordering::Acquire), 0b10);

        state.on_line(LogSource::Stderr, None);
        assert_eq!(state.pending.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_uncaptured_stream_has_no_buffer() {
        let state = state(true, false);
        assert_eq!(state.pending.load(Ordering::Acquire), 0b01);
        state.on_line(LogSource::Stderr, Some("ignored".into()));
        assert!(state.text(LogSource::Stderr).is_none());
    }

    #[test]
    fn test_concurrent_end_of_stream() {
        for _ in 0..100 {
            let state = Arc::new(state(true, true));
            let a = {
                let state = state.clone();
                std::thread::spawn(move || state.on_line(LogSource::Stdout, None))
            };
            let b = {
                let state = state.clone();
                std::thread::spawn(move || state.on_line(LogSource::Stderr, None))
            };
            a.join().unwrap();
            b.join().unwrap();
            assert_eq!(state.pending.load(Ordering::Acquire), 0);
        }
    }

    #[test]
    fn test_events_forwarded_to_sink() {
        let (tx, rx) = async_channel::unbounded();
        let state = CaptureState::new(7, true, false, Some(tx));
        state.on_line(LogSource::Stdout, Some("hello".into()));
        state.on_line(LogSource::Stdout, None);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.event_type, ProcessEventType::Stdout);
        assert_eq!(first.data.as_deref(), Some("hello"));
        assert_eq!(
            rx.try_recv().unwrap().event_type,
            ProcessEventType::StreamClosed(LogSource::Stdout)
        );
    }
}
