//! Filesystem locations shared by every build step.

use std::path::{Path, PathBuf};

/// Directory under the output root that receives the reference docs.
pub const REFERENCE_DIR_NAME: &str = "doxygen";

/// Default narrative source directory, relative to the project root.
pub const DEFAULT_NARRATIVE_DIR: &str = "sphinx";

/// Default output directory, relative to the project root.
pub const DEFAULT_OUTPUT_DIR: &str = "../docs";

/// Resolved build locations.
///
/// Constructed once at startup and handed to each component. The reference
/// output directory is always `output_root/doxygen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    project_root: PathBuf,
    narrative_source_root: PathBuf,
    output_root: PathBuf,
    reference_output_dir: PathBuf,
}

impl BuildPaths {
    /// Create paths from explicit roots.
    pub fn new(
        project_root: impl Into<PathBuf>,
        narrative_source_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        let output_root = output_root.into();
        let reference_output_dir = output_root.join(REFERENCE_DIR_NAME);

        Self {
            project_root: project_root.into(),
            narrative_source_root: narrative_source_root.into(),
            output_root,
            reference_output_dir,
        }
    }

    /// Derive paths from a project root using directories relative to it.
    pub fn from_project_root(
        project_root: impl Into<PathBuf>,
        narrative_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Self {
        let project_root = project_root.into();
        let narrative = project_root.join(narrative_dir);
        let output = normalize(&project_root.join(output_dir));
        Self::new(project_root, narrative, output)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn narrative_source_root(&self) -> &Path {
        &self.narrative_source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn reference_output_dir(&self) -> &Path {
        &self.reference_output_dir
    }

    /// Working directory for the reference generator: the project root's parent.
    pub fn reference_working_dir(&self) -> &Path {
        self.project_root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(&self.project_root)
    }
}

/// Lexically collapse `.` and `..` so `project/../docs` reads as `docs`.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reference_dir_lives_under_output_root() {
        let paths = BuildPaths::new("/work/project", "/work/project/sphinx", "/work/docs");

        assert_eq!(
            paths.reference_output_dir(),
            Path::new("/work/docs/doxygen")
        );
        assert!(paths
            .reference_output_dir()
            .starts_with(paths.output_root()));
    }

    #[test]
    fn derives_default_layout_from_project_root() {
        let paths = BuildPaths::from_project_root(
            "/work/project",
            DEFAULT_NARRATIVE_DIR,
            DEFAULT_OUTPUT_DIR,
        );

        assert_eq!(paths.narrative_source_root(), Path::new("/work/project/sphinx"));
        assert_eq!(paths.output_root(), Path::new("/work/docs"));
        assert_eq!(paths.reference_working_dir(), Path::new("/work"));
    }

    #[test]
    fn working_dir_falls_back_to_root_without_parent() {
        let paths = BuildPaths::new("/", "/sphinx", "/docs");
        assert_eq!(paths.reference_working_dir(), Path::new("/"));
    }

    #[test]
    fn normalize_keeps_leading_parent_dirs() {
        assert_eq!(normalize(Path::new("../a/./b/../c")), PathBuf::from("../a/c"));
    }
}
