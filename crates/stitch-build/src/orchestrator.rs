//! Two-phase documentation build.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::error::BuildError;
use crate::paths::BuildPaths;
use crate::reference::{ReferenceGenerator, ReferenceOutcome, ReferenceSettings};
use crate::site::{SiteComposer, SiteSettings};
use crate::task::{ProcessOutcome, ProcessRunner, SystemRunner};

/// Configuration for a build.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// Reference generator settings
    pub reference: ReferenceSettings,

    /// Narrative site builder settings
    pub site: SiteSettings,

    /// Discard existing reference docs before building
    pub force_reference: bool,
}

/// Result of a build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// What the reference step did
    pub reference: ReferenceOutcome,

    /// How the site builder exited
    pub site: ProcessOutcome,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildReport {
    /// Whether both steps produced usable output.
    pub fn success(&self) -> bool {
        self.reference.is_usable() && self.site.success()
    }
}

/// Runs the reference generator, then the site builder, into one output tree.
pub struct BuildOrchestrator {
    paths: BuildPaths,
    force_reference: bool,
    reference: ReferenceGenerator,
    site: SiteComposer,
}

impl BuildOrchestrator {
    /// Create an orchestrator that spawns real processes.
    pub fn new(paths: BuildPaths, config: BuildConfig) -> Self {
        Self::with_runner(paths, config, Arc::new(SystemRunner))
    }

    /// Create an orchestrator with a custom process runner.
    pub fn with_runner(
        paths: BuildPaths,
        config: BuildConfig,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            reference: ReferenceGenerator::new(
                paths.clone(),
                config.reference,
                Arc::clone(&runner),
            ),
            site: SiteComposer::new(paths.clone(), config.site, runner),
            force_reference: config.force_reference,
            paths,
        }
    }

    /// Create the output root and its parents. Succeeds if it already exists.
    pub async fn ensure_output_root(&self) -> Result<(), BuildError> {
        tokio::fs::create_dir_all(self.paths.output_root()).await?;
        Ok(())
    }

    /// Build the whole site.
    ///
    /// Resolves once both external processes have exited. The site builder is
    /// only spawned after the reference step's continuation fires; a failed
    /// reference run aborts the build before that.
    pub async fn run_build(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();

        self.ensure_output_root().await?;

        if self.force_reference {
            tracing::info!("Discarding existing reference docs");
            self.reference.clean().await?;
        }

        let site = &self.site;
        let (reference, site) = self
            .reference
            .generate_then(|reference| async move {
                if let ReferenceOutcome::Generated(outcome) = reference {
                    if !outcome.success() {
                        return Err(BuildError::ReferenceFailed { code: outcome.code });
                    }
                }
                let site = site.compose().await?;
                Ok((reference, site))
            })
            .await?;

        Ok(BuildReport {
            reference,
            site,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.paths.output_root().to_path_buf(),
        })
    }
}
