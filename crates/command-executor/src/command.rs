//! Command type describing a child process invocation

use crate::args::{self, Argument};
use crate::cancel::CancelSignal;
use crate::event::ProcessEvent;
use async_channel::Sender;
use async_process::{Command as AsyncCommand, Stdio};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on draining captured output after the process exited
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(10);

/// A command to be executed
///
/// Built through [`Command::builder`] and immutable afterwards. Unlike
/// `async_process::Command` this type is `Clone` and can be launched any
/// number of times.
#[derive(Clone)]
pub struct Command {
    /// The program to execute
    program: PathBuf,
    /// Flattened argument tokens, passed to the OS unquoted
    args: Vec<String>,
    /// Environment variables merged over the inherited environment
    env: HashMap<String, String>,
    /// Working directory for the command
    current_dir: Option<PathBuf>,
    capture_stdout: bool,
    capture_stderr: bool,
    wait_for_exit: bool,
    /// Zero means unbounded
    execution_timeout: Duration,
    /// Zero means unbounded
    termination_timeout: Duration,
    cancel: Option<CancelSignal>,
    events: Option<Sender<ProcessEvent>>,
}

impl Command {
    /// Create a builder for the given program
    pub fn builder<P: AsRef<Path>>(program: P) -> CommandBuilder {
        CommandBuilder(Command {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: HashMap::new(),
            current_dir: None,
            capture_stdout: true,
            capture_stderr: true,
            wait_for_exit: true,
            execution_timeout: Duration::ZERO,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
            cancel: None,
            events: None,
        })
    }

    /// Get the program path
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the flattened arguments
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the environment overrides
    pub fn get_envs(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Get the working directory
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Whether stdout is buffered into the result
    pub fn captures_stdout(&self) -> bool {
        self.capture_stdout
    }

    /// Whether stderr is buffered into the result
    pub fn captures_stderr(&self) -> bool {
        self.capture_stderr
    }

    /// Whether the executor waits for the process to exit
    pub fn waits_for_exit(&self) -> bool {
        self.wait_for_exit
    }

    /// Copy of this command that returns as soon as the process is started
    pub fn detached(&self) -> Command {
        Command {
            wait_for_exit: false,
            ..self.clone()
        }
    }

    /// Bound on the exit wait, `None` when unbounded
    pub fn execution_timeout(&self) -> Option<Duration> {
        non_zero(self.execution_timeout)
    }

    /// Bound on the output drain wait, `None` when unbounded
    pub fn termination_timeout(&self) -> Option<Duration> {
        non_zero(self.termination_timeout)
    }

    /// Cancellation signal observed by the executor's waits
    pub fn cancel_signal(&self) -> Option<&CancelSignal> {
        self.cancel.as_ref()
    }

    pub(crate) fn event_sink(&self) -> Option<Sender<ProcessEvent>> {
        self.events.clone()
    }

    /// Program name as shown in logs
    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Render the full command line with quoting applied
    pub fn command_line(&self) -> String {
        args::command_line(&self.program.to_string_lossy(), &self.args)
    }

    /// Prepare this command for execution by converting to an `async_process::Command`
    pub fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(&self.env);

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(if self.capture_stdout { Stdio::piped() } else { Stdio::inherit() });
        cmd.stderr(if self.capture_stderr { Stdio::piped() } else { Stdio::inherit() });
        cmd
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("current_dir", &self.current_dir)
            .field("capture_stdout", &self.capture_stdout)
            .field("capture_stderr", &self.capture_stderr)
            .field("wait_for_exit", &self.wait_for_exit)
            .field("execution_timeout", &self.execution_timeout)
            .field("termination_timeout", &self.termination_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder wrapper for command construction
pub struct CommandBuilder(Command);

impl CommandBuilder {
    /// Add an argument; absent and empty values are skipped
    pub fn arg<A: Into<Argument>>(mut self, arg: A) -> Self {
        self.0.args.extend(args::flatten([arg]));
        self
    }

    /// Add multiple arguments
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.0.args.extend(args::flatten(args));
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.0.env.insert(key.into(), val.into());
        self
    }

    /// Set multiple environment variables
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, val) in vars {
            self.0.env.insert(key.into(), val.into());
        }
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.0.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Buffer stdout into the run result (default on)
    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.0.capture_stdout = capture;
        self
    }

    /// Buffer stderr into the run result (default on)
    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.0.capture_stderr = capture;
        self
    }

    /// Wait for exit (default) or return right after spawning
    pub fn wait_for_exit(mut self, wait: bool) -> Self {
        self.0.wait_for_exit = wait;
        self
    }

    /// Shorthand for `wait_for_exit(false)`, used for long-lived servers
    pub fn serve(self) -> Self {
        self.wait_for_exit(false)
    }

    /// Bound the exit wait; zero means unbounded
    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.0.execution_timeout = timeout;
        self
    }

    /// Bound the output drain wait; zero means unbounded
    pub fn termination_timeout(mut self, timeout: Duration) -> Self {
        self.0.termination_timeout = timeout;
        self
    }

    /// Abandon waits when the signal fires
    pub fn cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.0.cancel = Some(signal);
        self
    }

    /// Forward lifecycle and output events to a channel
    pub fn event_sink(mut self, sender: Sender<ProcessEvent>) -> Self {
        self.0.events = Some(sender);
        self
    }

    /// Build the command
    pub fn build(self) -> Command {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_defaults() {
        let cmd = Command::builder("charon").build();
        assert_eq!(cmd.get_program(), Path::new("charon"));
        assert!(cmd.get_args().is_empty());
        assert!(cmd.captures_stdout());
        assert!(cmd.captures_stderr());
        assert!(cmd.waits_for_exit());
        assert_eq!(cmd.execution_timeout(), None);
        assert_eq!(cmd.termination_timeout(), Some(DEFAULT_TERMINATION_TIMEOUT));
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::builder("/opt/tools/charon")
            .arg("DATA")
            .arg("EXPORT")
            .args(["--dataBase", "game data.json"])
            .arg(None::<&str>)
            .env("CHARON_API_KEY", "secret")
            .current_dir("/tmp")
            .execution_timeout(Duration::from_secs(30))
            .termination_timeout(Duration::ZERO)
            .serve()
            .build();

        assert_eq!(cmd.get_args(), ["DATA", "EXPORT", "--dataBase", "game data.json"]);
        assert_eq!(cmd.get_envs().get("CHARON_API_KEY").map(String::as_str), Some("secret"));
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/tmp")));
        assert_eq!(cmd.execution_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cmd.termination_timeout(), None);
        assert!(!cmd.waits_for_exit());
        assert_eq!(cmd.display_name(), "charon");
        assert_eq!(
            cmd.to_string(),
            "/opt/tools/charon DATA EXPORT --dataBase \"game data.json\""
        );
    }

    #[test]
    fn test_debug_hides_env_values() {
        let cmd = Command::builder("charon").env("CHARON_API_KEY", "secret").build();
        let debug = format!("{:?}", cmd);
        assert!(debug.contains("CHARON_API_KEY"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_command_clone() {
        let cmd1 = Command::builder("test").arg("arg1").env("KEY", "VALUE").build();
        let cmd2 = cmd1.clone();

        assert_eq!(cmd1.get_program(), cmd2.get_program());
        assert_eq!(cmd1.get_args(), cmd2.get_args());
        assert_eq!(cmd1.get_envs(), cmd2.get_envs());
    }
}
