use super::host::{Host, progress};
use anyhow::{Context, Result};
use charon_config::Config;
use charon_orchestration::CodeGenerationOptions;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum GenerateCommands {
    /// Generate C# classes for a game data file
    Code {
        /// Game data file
        data_base: PathBuf,
        /// Directory receiving the sources
        #[arg(short, long)]
        output: PathBuf,
        /// Namespace of the generated classes
        #[arg(long)]
        namespace: Option<String>,
        /// Name of the root game data class
        #[arg(long)]
        game_data_class: Option<String>,
        /// Name of the document base class
        #[arg(long)]
        document_class: Option<String>,
        /// Remove stale files from the output directory first
        #[arg(long)]
        clear: bool,
    },

    /// Generate source code templates
    Templates {
        /// Directory receiving the templates
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub async fn run(config: Config, command: GenerateCommands) -> Result<()> {
    let host = Host::new(config)?;

    match command {
        GenerateCommands::Code {
            data_base,
            output,
            namespace,
            game_data_class,
            document_class,
            clear,
        } => {
            let options = CodeGenerationOptions {
                output_directory: output,
                namespace,
                game_data_class_name: game_data_class,
                document_class_name: document_class,
                clear_output_directory: clear,
            };
            host.routines()
                .generate_code(&data_base, &options, &progress(), &host.cancel)
                .await
                .context("Code generation failed")?;
        }
        GenerateCommands::Templates { output } => {
            host.tool
                .generate_templates(&output)
                .await
                .context("Template generation failed")?;
            println!("Templates written to {}", output.display());
        }
    }
    Ok(())
}
