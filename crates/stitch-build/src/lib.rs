//! Build orchestration for stitch documentation.
//!
//! Runs an external API reference generator and an external narrative-site
//! builder, in that order, into one output tree.

pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod paths;
pub mod reference;
pub mod site;
pub mod svg;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use error::BuildError;
pub use orchestrator::{BuildConfig, BuildOrchestrator, BuildReport};
pub use paths::BuildPaths;
pub use reference::{ReferenceGenerator, ReferenceOutcome, ReferenceSettings, COMPLETION_MARKER};
pub use site::{SiteComposer, SiteSettings};
pub use task::{GenerationTask, ProcessOutcome, ProcessRunner, SystemRunner};
