use super::host::Host;
use anyhow::{Context, Result};
use async_io::Timer;
use charon_config::Config;
use charon_orchestration::{RetryPolicy, prune_shadow_copies, shadow_copy};
use clap::Subcommand;
use process_registry::{
    LockFileState, ProcessList, find_and_end_gracefully, inspect_lock_file, lock_file_path,
    try_read_lock_file,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Subcommand)]
pub enum ServerCommands {
    /// Start a server for a game data file
    Start {
        /// Game data file
        data_base: PathBuf,
        /// Address to listen on instead of the configured one
        #[arg(short, long)]
        address: Option<Url>,
        /// Stay attached and stop the server on Ctrl+C
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the server announced for a game data file
    Stop {
        /// Game data file
        data_base: PathBuf,
    },

    /// Show the server announced for a game data file
    Status {
        /// Game data file
        data_base: PathBuf,
    },
}

pub async fn run(config: Config, command: ServerCommands) -> Result<()> {
    match command {
        ServerCommands::Start {
            data_base,
            address,
            foreground,
        } => start(config, &data_base, address, foreground).await,
        ServerCommands::Stop { data_base } => stop(&config, &data_base).await,
        ServerCommands::Status { data_base } => status(&config, &data_base).await,
    }
}

async fn start(config: Config, data_base: &Path, address: Option<Url>, foreground: bool) -> Result<()> {
    let host = Host::new(config)?;
    let lock_path = lock_file_path(&host.paths.lock_dir, data_base)?;
    if let Some(running) = try_read_lock_file(&lock_path).await {
        println!(
            "Server {} already listening on {}",
            running.pid, running.address
        );
        return Ok(());
    }

    let address = match address {
        Some(address) => address,
        None => host.config.listen_address()?,
    };
    let mut tool = host.tool.clone();
    if host.config.servers.shadow_copy {
        let copy = shadow_copy(tool.executable(), &host.paths.shadow_dir, &RetryPolicy::default())
            .await
            .context("Failed to create a shadow copy of the tool")?;
        let pruned = prune_shadow_copies(&host.paths.shadow_dir, Some(&copy)).await;
        debug!("Pruned {} shadow copies", pruned);
        tool = tool.with_executable(copy);
    }

    let server = tool
        .start_server(data_base, address, &host.paths.lock_dir)
        .await
        .context("Failed to start the server")?;
    println!(
        "Server {} listening on {}",
        server.pid(),
        server.listen_address()
    );
    if !foreground {
        return Ok(());
    }

    let list = Arc::new(ProcessList::with_retention(host.config.retention()));
    list.track(server).await?;
    let reconciler = list.spawn_reconciler(host.config.reconcile_interval());

    let exited = async {
        loop {
            Timer::after(EXIT_POLL_INTERVAL).await;
            match list.get(data_base).await {
                Some(info) if info.exited_at.is_none() => continue,
                _ => break false,
            }
        }
    };
    let interrupted = async {
        host.cancel.cancelled().await;
        true
    };
    let interrupted = futures_lite::future::or(exited, interrupted).await;
    drop(reconciler);

    list.end_all(host.config.grace_period()).await;
    if interrupted {
        println!("Server stopped");
    } else {
        println!("Server exited");
    }
    Ok(())
}

async fn stop(config: &Config, data_base: &Path) -> Result<()> {
    let lock_path = lock_file_path(&config.host_paths().lock_dir, data_base)?;
    if find_and_end_gracefully(&lock_path, config.grace_period()).await? {
        println!("Server stopped");
    } else {
        println!("No server running for {}", data_base.display());
    }
    Ok(())
}

async fn status(config: &Config, data_base: &Path) -> Result<()> {
    let lock_path = lock_file_path(&config.host_paths().lock_dir, data_base)?;
    match inspect_lock_file(&lock_path).await {
        LockFileState::Missing => println!("No server running for {}", data_base.display()),
        LockFileState::Valid(content) => {
            println!("Server {} listening on {}", content.pid, content.address)
        }
        LockFileState::Orphaned => {
            // Reading an orphaned lock file removes it
            let _ = try_read_lock_file(&lock_path).await;
            println!(
                "Removed stale lock file {}, no server running",
                lock_path.display()
            );
        }
    }
    Ok(())
}
