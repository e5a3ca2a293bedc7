use super::host::{Host, progress};
use anyhow::{Context, Result};
use charon_config::Config;
use charon_orchestration::{DataFormat, ImportMode, ValidationOption};
use clap::Subcommand;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum DataCommands {
    /// Print one document
    Find {
        /// Game data file
        data_base: PathBuf,
        /// Schema name
        schema: String,
        /// Document id
        id: String,
    },

    /// Print every document of a schema
    List {
        /// Game data file
        data_base: PathBuf,
        /// Schema name
        schema: String,
    },

    /// Add a document read from a JSON file
    Create {
        /// Game data file
        data_base: PathBuf,
        /// Schema name
        schema: String,
        /// JSON document
        document: PathBuf,
    },

    /// Replace a document with one read from a JSON file
    Update {
        /// Game data file
        data_base: PathBuf,
        /// Schema name
        schema: String,
        /// JSON document
        document: PathBuf,
    },

    /// Remove a document
    Delete {
        /// Game data file
        data_base: PathBuf,
        /// Schema name
        schema: String,
        /// Document id
        id: String,
    },

    /// Import documents and report the changed game data
    Import {
        /// Game data file
        data_base: PathBuf,
        /// File to import
        input: PathBuf,
        /// Format of the input
        #[arg(short, long, default_value = "json")]
        format: DataFormat,
        /// How imported documents are merged
        #[arg(short, long, default_value = "CreateAndUpdate")]
        mode: ImportMode,
    },

    /// Export documents into a file
    Export {
        /// Game data file
        data_base: PathBuf,
        /// Destination file
        output: PathBuf,
        /// Format of the output
        #[arg(short, long, default_value = "json")]
        format: DataFormat,
        /// Schemas to export (empty means all)
        #[arg(short, long)]
        schemas: Vec<String>,
    },

    /// Validate game data and print the report
    Validate {
        /// Game data file
        data_base: PathBuf,
        /// Validation options
        #[arg(short, long = "option")]
        options: Vec<ValidationOption>,
    },

    /// Back up the whole game data file
    Backup {
        /// Game data file
        data_base: PathBuf,
        /// Destination file
        output: PathBuf,
        /// Format of the backup
        #[arg(short, long, default_value = "json")]
        format: DataFormat,
    },

    /// Restore game data from a backup
    Restore {
        /// Game data file
        data_base: PathBuf,
        /// Backup file
        input: PathBuf,
        /// Format of the backup
        #[arg(short, long, default_value = "json")]
        format: DataFormat,
    },

    /// Print the patch turning one game data file into another
    CreatePatch {
        /// Game data file
        data_base: PathBuf,
        /// Game data file to compare with
        other: PathBuf,
    },

    /// Apply a JSON patch
    ApplyPatch {
        /// Game data file
        data_base: PathBuf,
        /// JSON patch
        patch: PathBuf,
    },

    /// Print the revision hash of a game data file
    Version {
        /// Game data file
        data_base: PathBuf,
    },
}

pub async fn run(config: Config, command: DataCommands) -> Result<()> {
    let host = Host::new(config)?;
    let tool = &host.tool;

    match command {
        DataCommands::Find {
            data_base,
            schema,
            id,
        } => match tool.find_document(&data_base, &schema, &id).await? {
            Some(document) => print_json(&document)?,
            None => anyhow::bail!("Document '{}' of '{}' not found", id, schema),
        },
        DataCommands::List { data_base, schema } => {
            print_json(&tool.list_documents(&data_base, &schema).await?)?
        }
        DataCommands::Create {
            data_base,
            schema,
            document,
        } => {
            let document = read_json(&document).await?;
            print_json(&tool.create_document(&data_base, &schema, &document).await?)?
        }
        DataCommands::Update {
            data_base,
            schema,
            document,
        } => {
            let document = read_json(&document).await?;
            print_json(&tool.update_document(&data_base, &schema, &document).await?)?
        }
        DataCommands::Delete {
            data_base,
            schema,
            id,
        } => print_json(&tool.delete_document(&data_base, &schema, &id).await?)?,
        DataCommands::Import {
            data_base,
            input,
            format,
            mode,
        } => {
            host.routines()
                .import(&data_base, &input, format, mode, &progress(), &host.cancel)
                .await
                .context("Import failed")?;
        }
        DataCommands::Export {
            data_base,
            output,
            format,
            schemas,
        } => {
            let schemas: Vec<&str> = schemas.iter().map(String::as_str).collect();
            tool.export_file(&data_base, &schemas, &output, format).await?;
            println!("Exported to {}", output.display());
        }
        DataCommands::Validate { data_base, options } => {
            let report = host
                .routines()
                .validate(&data_base, &options, &progress(), &host.cancel)
                .await
                .context("Validation failed")?;
            print_json(&report)?
        }
        DataCommands::Backup {
            data_base,
            output,
            format,
        } => {
            host.routines()
                .backup(&data_base, &output, format, &progress(), &host.cancel)
                .await
                .context("Backup failed")?;
            println!("Backed up to {}", output.display());
        }
        DataCommands::Restore {
            data_base,
            input,
            format,
        } => {
            tool.restore(&data_base, &input, format).await?;
            println!("Restored {}", data_base.display());
        }
        DataCommands::CreatePatch { data_base, other } => {
            print_json(&tool.create_patch(&data_base, &other).await?)?
        }
        DataCommands::ApplyPatch { data_base, patch } => {
            let patch = read_json(&patch).await?;
            tool.apply_patch(&data_base, &patch).await?;
            println!("Patched {}", data_base.display());
        }
        DataCommands::Version { data_base } => {
            println!("{}", tool.data_version(&data_base).await?)
        }
    }
    Ok(())
}

async fn read_json(path: &Path) -> Result<Value> {
    let text = async_fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
