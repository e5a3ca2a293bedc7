use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use command_executor::{Command, Executor, ProcessEvent, ProcessEventType};

#[derive(Args)]
pub struct CiArgs {
    #[command(subcommand)]
    cmd: CiCommand,
}

#[derive(Subcommand)]
pub enum CiCommand {
    /// Run all CI checks
    All,
    /// Format check (read-only)
    #[command(name = "fmt-check")]
    FmtCheck,
    /// Clippy lints
    Clippy,
    /// Workspace test suite
    Test,
}

pub async fn run(args: CiArgs) -> Result<()> {
    match args.cmd {
        CiCommand::All => run_all().await,
        CiCommand::FmtCheck => run_fmt().await,
        CiCommand::Clippy => run_clippy().await,
        CiCommand::Test => run_tests().await,
    }
}

async fn run_all() -> Result<()> {
    println!("Running all CI checks\n");

    println!("Checking code formatting...");
    run_fmt().await?;
    println!("Format check passed\n");

    println!("Running clippy lints...");
    run_clippy().await?;
    println!("Clippy check passed\n");

    println!("Running tests...");
    run_tests().await?;
    println!("Tests passed\n");

    println!("All CI checks passed!");
    Ok(())
}

async fn run_fmt() -> Result<()> {
    if !run_cargo_command(&["fmt", "--all", "--", "--check"]).await? {
        bail!("Format check failed. Run 'cargo fmt --all' to fix.");
    }
    Ok(())
}

async fn run_clippy() -> Result<()> {
    let success = run_cargo_command(&[
        "clippy",
        "--workspace",
        "--all-targets",
        "--",
        "-D",
        "warnings",
    ])
    .await?;
    if !success {
        bail!("Clippy check failed");
    }
    Ok(())
}

async fn run_tests() -> Result<()> {
    let (sender, receiver) = async_channel::unbounded();
    let cmd = Command::builder("cargo")
        .args(["test", "--workspace"])
        .event_sink(sender)
        .build();

    let printer = smol::spawn(print_events(receiver));
    let result = Executor::new("xtask").run(&cmd).await?;
    let success = result.exit_status().is_some_and(|status| status.success());
    // The printer finishes once every sender is gone
    drop(result);
    drop(cmd);
    let failures = printer.await;

    if !success || failures > 0 {
        bail!("Tests failed ({} failures)", failures);
    }
    println!("\nAll tests passed");
    Ok(())
}

/// Echo captured lines, counting failed tests
async fn print_events(events: async_channel::Receiver<ProcessEvent>) -> usize {
    let mut failures = 0;
    while let Ok(event) = events.recv().await {
        match &event.event_type {
            ProcessEventType::Stdout | ProcessEventType::Stderr => {
                if let Some(line) = &event.data {
                    println!("{}", line);
                    if line.ends_with("... FAILED") {
                        failures += 1;
                    }
                }
            }
            ProcessEventType::Started => eprintln!("Test process started (PID: {})", event.pid),
            ProcessEventType::Exited { code, signal } => match (code, signal) {
                (Some(0), _) => {}
                (Some(code), _) => eprintln!("\nTests exited with code: {}", code),
                (_, Some(sig)) => eprintln!("\nTests terminated by signal: {}", sig),
                _ => eprintln!("\nTests exited abnormally"),
            },
            ProcessEventType::StreamClosed(_) => {}
        }
    }
    failures
}

/// Run cargo with inherited output, returning whether it succeeded
async fn run_cargo_command(args: &[&str]) -> Result<bool> {
    let cmd = Command::builder("cargo")
        .args(args.iter().copied())
        .capture_stdout(false)
        .capture_stderr(false)
        .build();
    let result = Executor::new("xtask").run(&cmd).await?;
    Ok(result.exit_status().is_some_and(|status| status.success()))
}
