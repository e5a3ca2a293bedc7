use super::host::{Host, progress};
use anyhow::{Context, Result};
use charon_config::Config;
use semver::Version;

pub async fn run(config: Config, version: Option<Version>, check: bool) -> Result<()> {
    let host = Host::new(config)?;
    let requested = version.or_else(|| host.config.updates.version.clone());

    if check {
        let updater = host.updater();
        match updater.check_for_update().await.context("Update check failed")? {
            Some(build) => println!("Update available: {}", build.version),
            None => println!("Tool is up to date"),
        }
        return Ok(());
    }

    let installed = host
        .routines()
        .update_tool(requested.as_ref(), &progress(), &host.cancel)
        .await
        .with_context(|| {
            format!(
                "Failed to install the tool from {}",
                host.paths.feed_dir.display()
            )
        })?;
    println!("Tool {} installed at {}", installed, host.paths.executable.display());
    Ok(())
}
