//! Shared setup for commands that run the tool

use anyhow::{Context, Result};
use async_trait::async_trait;
use charon_config::{Config, HostPaths};
use charon_orchestration::{
    CharonTool, DirectoryFeed, Progress, RoutineHooks, RoutineQueue, Routines, Updater,
};
use command_executor::{CancelSignal, cancel_pair};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Configuration plus the tool bound to the interrupt signal
pub struct Host {
    pub config: Config,
    pub paths: HostPaths,
    pub tool: CharonTool,
    pub cancel: CancelSignal,
}

impl Host {
    /// Resolve `config` and cancel tool runs on Ctrl+C
    pub fn new(config: Config) -> Result<Self> {
        let paths = config.host_paths();
        let tool = config.charon_tool().context("Invalid tool settings")?;

        let (handle, cancel) = cancel_pair();
        ctrlc::set_handler(move || {
            eprintln!("Interrupted, cancelling...");
            handle.cancel();
        })
        .context("Failed to install interrupt handler")?;

        Ok(Self {
            tool: tool.with_cancel_signal(cancel.clone()),
            config,
            paths,
            cancel,
        })
    }

    pub fn updater(&self) -> Updater {
        let feed = Arc::new(DirectoryFeed::new(&self.paths.feed_dir));
        Updater::new(self.tool.clone(), feed)
    }

    pub fn routines(&self) -> Routines {
        Routines::new(Arc::new(RoutineQueue::new()), self.updater())
            .with_hooks(Arc::new(ConsoleHooks))
    }
}

/// Progress printed on stderr, one line per step
pub fn progress() -> Progress {
    Progress::new(|message, done| {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r\x1B[2K[{:>3.0}%] {}", done * 100.0, message);
        if done >= 1.0 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    })
}

struct ConsoleHooks;

#[async_trait]
impl RoutineHooks for ConsoleHooks {
    async fn reimport(&self, data_base: &Path) -> charon_orchestration::Result<()> {
        println!("Game data changed: {}", data_base.display());
        Ok(())
    }

    async fn on_code_generated(&self, output_directory: &Path) -> charon_orchestration::Result<()> {
        println!("Sources written to {}", output_directory.display());
        Ok(())
    }
}

pub async fn version(config: Config) -> Result<()> {
    let host = Host::new(config)?;
    let version = host
        .tool
        .version()
        .await
        .context("Failed to query the tool version")?;
    println!("{}", version);
    Ok(())
}

pub async fn init(config: Config, data_base: &Path) -> Result<()> {
    let host = Host::new(config)?;
    host.tool
        .init(data_base)
        .await
        .with_context(|| format!("Failed to create {}", data_base.display()))?;
    println!("Created {}", data_base.display());
    Ok(())
}
