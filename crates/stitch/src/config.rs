//! Configuration file (stitch.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use stitch_build::paths::{DEFAULT_NARRATIVE_DIR, DEFAULT_OUTPUT_DIR};
use stitch_build::{BuildPaths, ReferenceSettings, SiteSettings};
use stitch_server::{Mount, PreviewConfig};

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub paths: PathsConfig,
    pub reference: ReferenceConfig,
    pub site: SiteConfig,
    pub serve: ServeConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Narrative sources, relative to the project root
    pub narrative_dir: String,
    /// Build output, relative to the project root
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            narrative_dir: DEFAULT_NARRATIVE_DIR.to_string(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub command: String,
    pub config_file: String,
    pub output_env: String,
    pub nested_dir: String,
    pub postprocess_svg: bool,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        let defaults = ReferenceSettings::default();
        Self {
            command: defaults.command,
            config_file: defaults.config_file,
            output_env: defaults.output_env,
            nested_dir: defaults.nested_dir,
            postprocess_svg: defaults.postprocess_svg,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub command: String,
    pub mode_flag: String,
    pub builder: String,
    pub args: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let defaults = SiteSettings::default();
        Self {
            command: defaults.command,
            mode_flag: defaults.mode_flag,
            builder: defaults.builder,
            args: defaults.extra_args,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub fallback: String,
    /// Quiet period before reloading, in milliseconds
    pub wait_ms: u64,
    pub open: bool,
    pub live_reload: bool,
    pub ignore: Vec<String>,
    pub mounts: Vec<MountConfig>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        let defaults = PreviewConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            fallback: defaults.fallback_file,
            wait_ms: defaults.debounce_ms,
            open: defaults.open,
            live_reload: defaults.live_reload,
            ignore: defaults.ignore,
            mounts: Vec::new(),
        }
    }
}

/// A `[[serve.mounts]]` entry.
#[derive(Debug, Deserialize)]
pub struct MountConfig {
    /// Route prefix, e.g. "/components"
    pub route: String,
    /// Directory, relative to the project root
    pub dir: String,
}

impl ConfigFile {
    /// Load configuration if the file exists.
    /// Returns an error if the file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve build locations against the project root.
    pub fn build_paths(&self, project_root: &Path) -> BuildPaths {
        BuildPaths::from_project_root(
            project_root,
            &self.paths.narrative_dir,
            &self.paths.output_dir,
        )
    }

    pub fn reference_settings(&self) -> ReferenceSettings {
        ReferenceSettings {
            command: self.reference.command.clone(),
            config_file: self.reference.config_file.clone(),
            output_env: self.reference.output_env.clone(),
            nested_dir: self.reference.nested_dir.clone(),
            postprocess_svg: self.reference.postprocess_svg,
        }
    }

    pub fn site_settings(&self) -> SiteSettings {
        SiteSettings {
            command: self.site.command.clone(),
            mode_flag: self.site.mode_flag.clone(),
            builder: self.site.builder.clone(),
            extra_args: self.site.args.clone(),
        }
    }

    /// Preview settings serving `document_root`.
    pub fn preview_config(&self, project_root: &Path, document_root: PathBuf) -> PreviewConfig {
        PreviewConfig {
            host: self.serve.host.clone(),
            port: self.serve.port,
            document_root,
            mounts: self
                .serve
                .mounts
                .iter()
                .map(|m| Mount::new(&m.route, project_root.join(&m.dir)))
                .collect(),
            fallback_file: self.serve.fallback.clone(),
            debounce_ms: self.serve.wait_ms,
            open: self.serve.open,
            live_reload: self.serve.live_reload,
            ignore: self.serve.ignore.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();

        assert_eq!(config.paths.narrative_dir, "sphinx");
        assert_eq!(config.paths.output_dir, "../docs");
        assert_eq!(config.reference.command, "doxygen");
        assert_eq!(config.reference.output_env, "BUILD_DIR");
        assert_eq!(config.site.command, "sphinx-build");
        assert_eq!(config.serve.port, 3000);
        assert_eq!(config.serve.wait_ms, 1000);
        assert_eq!(config.serve.fallback, "index.html");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ConfigFile = toml::from_str(
            r#"
[reference]
postprocess_svg = false

[site]
args = ["-q"]

[serve]
port = 8080
ignore = ["*.tmp"]

[[serve.mounts]]
route = "/components"
dir = "../node_modules"
"#,
        )
        .unwrap();

        assert!(!config.reference.postprocess_svg);
        assert_eq!(config.reference.config_file, "doxyfile");
        assert_eq!(config.site_settings().extra_args, vec!["-q".to_string()]);

        let preview = config.preview_config(Path::new("/work/project"), PathBuf::from("/work/docs"));
        assert_eq!(preview.port, 8080);
        assert_eq!(preview.ignore, vec!["*.tmp".to_string()]);
        assert_eq!(
            preview.mounts,
            vec![Mount::new("/components", "/work/project/../node_modules")]
        );
    }

    #[test]
    fn missing_file_loads_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = ConfigFile::load(&temp.path().join("stitch.toml")).unwrap();
        assert_eq!(config.serve.host, "127.0.0.1");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("stitch.toml");
        fs::write(&path, "[serve]\nport = \"not a number\"").unwrap();

        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn resolves_paths_from_project_root() {
        let config = ConfigFile::default();
        let paths = config.build_paths(Path::new("/work/project"));

        assert_eq!(paths.output_root(), Path::new("/work/docs"));
        assert_eq!(paths.reference_output_dir(), Path::new("/work/docs/doxygen"));
    }
}
