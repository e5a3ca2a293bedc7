//! Multi-step flows serialised through one [`RoutineQueue`]

use crate::error::Result;
use crate::formats::{DataFormat, ImportMode, ValidationOption};
use crate::progress::Progress;
use crate::queue::RoutineQueue;
use crate::tool::{CharonTool, CodeGenerationOptions};
use crate::updater::{Updater, check_cancelled};
use async_trait::async_trait;
use command_executor::CancelSignal;
use semver::Version;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Follow-up actions the host runs after a routine changed files
#[async_trait]
pub trait RoutineHooks: Send + Sync {
    /// Game data at `data_base` changed and should be reloaded
    async fn reimport(&self, data_base: &Path) -> Result<()> {
        let _ = data_base;
        Ok(())
    }

    /// Sources were generated into `output_directory`
    async fn on_code_generated(&self, output_directory: &Path) -> Result<()> {
        let _ = output_directory;
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl RoutineHooks for NoHooks {}

/// Tool routines sharing one queue
pub struct Routines {
    queue: Arc<RoutineQueue>,
    updater: Updater,
    hooks: Arc<dyn RoutineHooks>,
}

impl Routines {
    /// Routines for the tool managed by `updater`
    pub fn new(queue: Arc<RoutineQueue>, updater: Updater) -> Self {
        Self {
            queue,
            updater,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Install follow-up hooks
    pub fn with_hooks(mut self, hooks: Arc<dyn RoutineHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Shared queue
    pub fn queue(&self) -> &Arc<RoutineQueue> {
        &self.queue
    }

    /// Underlying updater
    pub fn updater(&self) -> &Updater {
        &self.updater
    }

    /// Install `requested` (or the latest build) unless it is already installed
    ///
    /// Without `requested`, an installed version at least as new as the
    /// feed's latest build is kept. Returns the version reported by the tool afterwards.
    pub async fn update_tool(
        &self,
        requested: Option<&Version>,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<Version> {
        self.queue
            .schedule_with_cancel(self.run_update(requested, progress, cancel), cancel)
            .await?
    }

    /// Generate C# sources for `data_base`
    pub async fn generate_code(
        &self,
        data_base: &Path,
        options: &CodeGenerationOptions,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<()> {
        self.queue
            .schedule_with_cancel(
                self.run_generate_code(data_base, options, progress, cancel),
                cancel,
            )
            .await?
    }

    /// Validate `data_base`, returning the tool's report
    ///
    /// When `options` include [`ValidationOption::Repair`] the game data is
    /// reimported afterwards.
    pub async fn validate(
        &self,
        data_base: &Path,
        options: &[ValidationOption],
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<Value> {
        self.queue
            .schedule_with_cancel(self.run_validate(data_base, options, progress, cancel), cancel)
            .await?
    }

    /// Back up `data_base` into `output`
    pub async fn backup(
        &self,
        data_base: &Path,
        output: &Path,
        format: DataFormat,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<()> {
        self.queue
            .schedule_with_cancel(
                self.run_backup(data_base, output, format, progress, cancel),
                cancel,
            )
            .await?
    }

    /// Import documents from `input` and reload the game data
    pub async fn import(
        &self,
        data_base: &Path,
        input: &Path,
        format: DataFormat,
        mode: ImportMode,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<()> {
        self.queue
            .schedule_with_cancel(
                self.run_import(data_base, input, format, mode, progress, cancel),
                cancel,
            )
            .await?
    }

    async fn run_update(
        &self,
        requested: Option<&Version>,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<Version> {
        let tool = self.updater.tool().with_cancel_signal(cancel.clone());
        progress.report("Checking installed version", 0.0);
        if let Some(current) = self.updater.current_version().await? {
            let up_to_date = match requested {
                Some(requested) => &current == requested,
                None => self.updater.check_for_update().await?.is_none(),
            };
            if up_to_date {
                info!("Tool {} is already installed", current);
                progress.report("Already up to date", 1.0);
                return Ok(current);
            }
        }
        check_cancelled(cancel)?;

        self.updater
            .install(requested, &progress.sub_range(0.1, 0.9), cancel)
            .await?;
        check_cancelled(cancel)?;

        progress.report("Checking new version", 0.95);
        let installed = tool.version().await?;
        progress.report(&format!("Tool {} installed", installed), 1.0);
        Ok(installed)
    }

    async fn run_generate_code(
        &self,
        data_base: &Path,
        options: &CodeGenerationOptions,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<()> {
        let tool = self.prepared_tool(progress, cancel)?;
        progress.report("Generating source code", 0.2);
        tool.generate_csharp_code(data_base, options).await?;
        check_cancelled(cancel)?;

        progress.report("Refreshing generated sources", 0.9);
        self.hooks.on_code_generated(&options.output_directory).await?;
        progress.report("Source code generated", 1.0);
        Ok(())
    }

    async fn run_validate(
        &self,
        data_base: &Path,
        options: &[ValidationOption],
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<Value> {
        let tool = self.prepared_tool(progress, cancel)?;
        progress.report("Validating game data", 0.1);
        let report = tool.validate(data_base, options).await?;
        if options.contains(&ValidationOption::Repair) {
            check_cancelled(cancel)?;
            progress.report("Reloading repaired data", 0.9);
            self.hooks.reimport(data_base).await?;
        }
        progress.report("Validation finished", 1.0);
        Ok(report)
    }

    async fn run_backup(
        &self,
        data_base: &Path,
        output: &Path,
        format: DataFormat,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<()> {
        let tool = self.prepared_tool(progress, cancel)?;
        progress.report("Backing up game data", 0.1);
        tool.backup(data_base, output, format).await?;
        progress.report("Backup finished", 1.0);
        Ok(())
    }

    async fn run_import(
        &self,
        data_base: &Path,
        input: &Path,
        format: DataFormat,
        mode: ImportMode,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<()> {
        let tool = self.prepared_tool(progress, cancel)?;
        progress.report("Importing documents", 0.1);
        tool.import_file(data_base, &[], input, format, mode).await?;
        check_cancelled(cancel)?;

        progress.report("Reloading game data", 0.9);
        self.hooks.reimport(data_base).await?;
        progress.report("Import finished", 1.0);
        Ok(())
    }

    /// Tool bound to `cancel`, after the requirement check
    fn prepared_tool(&self, progress: &Progress, cancel: &CancelSignal) -> Result<CharonTool> {
        progress.report("Checking requirements", 0.0);
        let tool = self.updater.tool().with_cancel_signal(cancel.clone());
        tool.check_requirements()?;
        check_cancelled(cancel)?;
        Ok(tool)
    }
}

impl std::fmt::Debug for Routines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routines")
            .field("queue", &self.queue)
            .field("updater", &self.updater)
            .finish_non_exhaustive()
    }
}
