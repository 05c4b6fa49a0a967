//! Documentation build command.

use std::path::Path;

use anyhow::Result;
use stitch_build::{BuildConfig, BuildOrchestrator, ReferenceOutcome};

use crate::config::ConfigFile;

/// Run the build command.
pub async fn run(project_root: &Path, file_config: &ConfigFile, force: bool) -> Result<()> {
    tracing::info!("Building documentation...");

    let paths = file_config.build_paths(project_root);
    let config = BuildConfig {
        reference: file_config.reference_settings(),
        site: file_config.site_settings(),
        force_reference: force,
    };

    let report = BuildOrchestrator::new(paths, config).run_build().await?;

    match report.reference {
        ReferenceOutcome::Skipped => tracing::info!("Reference docs: up to date"),
        ReferenceOutcome::Generated(outcome) => {
            tracing::info!("Reference docs: generated ({})", outcome)
        }
    }

    if report.site.success() {
        tracing::info!("Built site in {}ms", report.duration_ms);
    } else {
        tracing::warn!(
            "Site builder finished with {} after {}ms; output may be incomplete",
            report.site,
            report.duration_ms
        );
    }

    tracing::info!("Output: {}", report.output_dir.display());

    Ok(())
}
