use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;

use commands::{data::DataCommands, generate::GenerateCommands, server::ServerCommands};

#[derive(Parser)]
#[command(name = "charon-host")]
#[command(about = "Charon tool host - runs, serves and updates the game data tool")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "charon.yaml")]
    config: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate,

    /// Print the installed tool version
    Version,

    /// Create an empty game data file
    Init {
        /// Game data file to create
        data_base: PathBuf,
    },

    /// Work with documents in a game data file
    Data {
        #[command(subcommand)]
        command: DataCommands,
    },

    /// Generate source code or templates
    Generate {
        #[command(subcommand)]
        command: GenerateCommands,
    },

    /// Manage tool servers
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },

    /// Install or update the tool from the release feed
    Update {
        /// Version to install instead of the latest
        #[arg(long)]
        version: Option<semver::Version>,

        /// Only report whether an update is available
        #[arg(long)]
        check: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = charon_config::parser::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let level = match cli.verbose {
        0 => match config.log_level.as_deref() {
            Some(level) => level
                .parse::<Level>()
                .with_context(|| format!("Invalid log level '{}'", level))?,
            None => Level::WARN,
        },
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    smol::block_on(async move {
        match cli.command {
            Commands::Validate => commands::validate::run(&cli.config, &config),
            Commands::Version => commands::host::version(config).await,
            Commands::Init { data_base } => commands::host::init(config, &data_base).await,
            Commands::Data { command } => commands::data::run(config, command).await,
            Commands::Generate { command } => commands::generate::run(config, command).await,
            Commands::Server { command } => commands::server::run(config, command).await,
            Commands::Update { version, check } => {
                commands::update::run(config, version, check).await
            }
        }
    })
}
