//! API reference generation.

use std::future::Future;
use std::sync::Arc;

use crate::error::BuildError;
use crate::layout::{flatten_nested, remove_any};
use crate::paths::BuildPaths;
use crate::svg::repair_svg_labels;
use crate::task::{GenerationTask, ProcessOutcome, ProcessRunner};

/// Sentinel written into the reference directory once generation fully succeeded.
pub const COMPLETION_MARKER: &str = ".stitch-complete";

/// Settings for the external reference generator.
#[derive(Debug, Clone)]
pub struct ReferenceSettings {
    /// Generator executable
    pub command: String,

    /// Config file passed as the only argument, relative to the project root
    pub config_file: String,

    /// Environment variable that tells the generator where to write
    pub output_env: String,

    /// Subdirectory the generator nests its pages in
    pub nested_dir: String,

    /// Repair escaped brackets in generated SVG graphs
    pub postprocess_svg: bool,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            command: "doxygen".to_string(),
            config_file: "doxyfile".to_string(),
            output_env: "BUILD_DIR".to_string(),
            nested_dir: "html".to_string(),
            postprocess_svg: true,
        }
    }
}

/// What the reference step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceOutcome {
    /// A completed artifact was already present
    Skipped,

    /// The generator ran and exited
    Generated(ProcessOutcome),
}

impl ReferenceOutcome {
    /// Whether the artifact is usable by later steps.
    pub fn is_usable(&self) -> bool {
        match self {
            ReferenceOutcome::Skipped => true,
            ReferenceOutcome::Generated(outcome) => outcome.success(),
        }
    }
}

/// Runs the reference generator into `output_root/doxygen`.
pub struct ReferenceGenerator {
    paths: BuildPaths,
    settings: ReferenceSettings,
    runner: Arc<dyn ProcessRunner>,
}

impl ReferenceGenerator {
    pub fn new(
        paths: BuildPaths,
        settings: ReferenceSettings,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            paths,
            settings,
            runner,
        }
    }

    /// The task that would be spawned for this project.
    pub fn task(&self) -> GenerationTask {
        let out = self.paths.reference_output_dir();
        GenerationTask::new(&self.settings.command, self.paths.reference_working_dir())
            .arg(
                self.paths
                    .project_root()
                    .join(&self.settings.config_file)
                    .to_string_lossy(),
            )
            .env(&self.settings.output_env, out.to_string_lossy())
    }

    /// Whether a previous run left a complete artifact.
    pub async fn is_complete(&self) -> Result<bool, BuildError> {
        let marker = self.paths.reference_output_dir().join(COMPLETION_MARKER);
        Ok(tokio::fs::try_exists(marker).await?)
    }

    /// Remove any previous artifact so the next run regenerates it.
    pub async fn clean(&self) -> Result<(), BuildError> {
        remove_any(self.paths.reference_output_dir()).await?;
        Ok(())
    }

    /// Generate the reference docs unless a complete artifact already exists.
    ///
    /// On a zero exit the nested output is flattened, SVGs are repaired and
    /// the completion marker is written, in that order. A non-zero exit
    /// leaves no marker, so the next run starts over.
    pub async fn generate(&self) -> Result<ReferenceOutcome, BuildError> {
        let dir = self.paths.reference_output_dir();

        if self.is_complete().await? {
            tracing::info!(
                "Reference docs already exist at {} and will not be regenerated",
                dir.display()
            );
            return Ok(ReferenceOutcome::Skipped);
        }

        if tokio::fs::try_exists(dir).await? {
            tracing::warn!(
                "Found incomplete reference docs at {}, regenerating",
                dir.display()
            );
            remove_any(dir).await?;
        }

        tokio::fs::create_dir_all(dir).await?;

        let task = self.task();
        tracing::info!("Generating reference docs: {}", task);
        let outcome = self.runner.run(&task).await?;

        if !outcome.success() {
            tracing::error!("Reference generator failed with {}", outcome);
            return Ok(ReferenceOutcome::Generated(outcome));
        }

        if !flatten_nested(dir, &self.settings.nested_dir).await? {
            tracing::warn!(
                "No {}/ directory under {}, assuming output is already flat",
                self.settings.nested_dir,
                dir.display()
            );
        }

        if self.settings.postprocess_svg {
            let svg_dir = dir.to_path_buf();
            let repaired = tokio::task::spawn_blocking(move || repair_svg_labels(&svg_dir)).await??;
            if repaired > 0 {
                tracing::info!("Repaired {} SVG diagrams", repaired);
            }
        }

        tokio::fs::write(dir.join(COMPLETION_MARKER), b"").await?;

        Ok(ReferenceOutcome::Generated(outcome))
    }

    /// Generate, then hand the outcome to `on_complete`.
    ///
    /// `on_complete` runs for skipped and generated artifacts alike, and only
    /// after the child has exited and every fixup has finished.
    pub async fn generate_then<F, Fut, T>(&self, on_complete: F) -> Result<T, BuildError>
    where
        F: FnOnce(ReferenceOutcome) -> Fut,
        Fut: Future<Output = Result<T, BuildError>>,
    {
        let outcome = self.generate().await?;
        on_complete(outcome).await
    }
}
