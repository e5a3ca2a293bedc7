use anyhow::{Context, Result};
use charon_config::Config;
use std::path::Path;

pub fn run(config_path: &Path, config: &Config) -> Result<()> {
    if config_path.exists() {
        println!("✓ Configuration valid: {}", config_path.display());
    } else {
        println!("No configuration at {}, using defaults", config_path.display());
    }
    println!("  Version: {}", config.version);

    let paths = config.host_paths();
    println!("  Executable: {}", paths.executable.display());
    println!("  Lock files: {}", paths.lock_dir.display());
    println!("  Shadow copies: {}", paths.shadow_dir.display());
    if let Some(runtime) = &config.tool.runtime {
        println!("  Runtime: {}", runtime);
    }
    println!("  Release feed: {}", paths.feed_dir.display());
    println!(
        "  Servers: {} (grace {}s, refresh every {}s)",
        config.listen_address().context("Invalid listen address")?,
        config.servers.grace_period,
        config.servers.reconcile_interval
    );

    let tool = config.charon_tool()?;
    if let Err(e) = tool.check_requirements() {
        println!("  ⚠ {}", e);
    }
    Ok(())
}
