//! Narrative site composition.

use std::sync::Arc;

use crate::error::BuildError;
use crate::paths::BuildPaths;
use crate::task::{GenerationTask, ProcessOutcome, ProcessRunner};

/// Settings for the external narrative-site builder.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Builder executable
    pub command: String,

    /// Flag selecting the build mode
    pub mode_flag: String,

    /// Output format passed after the mode flag
    pub builder: String,

    /// Extra arguments appended after source and destination
    pub extra_args: Vec<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            command: "sphinx-build".to_string(),
            mode_flag: "-b".to_string(),
            builder: "html".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Builds the narrative docs into the output root.
pub struct SiteComposer {
    paths: BuildPaths,
    settings: SiteSettings,
    runner: Arc<dyn ProcessRunner>,
}

impl SiteComposer {
    pub fn new(paths: BuildPaths, settings: SiteSettings, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            paths,
            settings,
            runner,
        }
    }

    pub fn task(&self) -> GenerationTask {
        GenerationTask::new(&self.settings.command, self.paths.output_root())
            .arg(&self.settings.mode_flag)
            .arg(&self.settings.builder)
            .arg(self.paths.narrative_source_root().to_string_lossy())
            .arg(self.paths.output_root().to_string_lossy())
            .args(self.settings.extra_args.iter().cloned())
    }

    /// Run the site builder and wait for it to exit.
    pub async fn compose(&self) -> Result<ProcessOutcome, BuildError> {
        let task = self.task();
        tracing::info!("Composing site: {}", task);

        let outcome = self.runner.run(&task).await?;
        if !outcome.success() {
            tracing::warn!("Site builder finished with {}", outcome);
        }

        Ok(outcome)
    }
}
