//! Preview server command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use stitch_server::PreviewServer;

use crate::config::ConfigFile;

/// Overrides from the command line.
pub struct ServeArgs {
    pub port: Option<u16>,
    pub dir: Option<PathBuf>,
    pub open: bool,
    pub live_reload: bool,
}

/// Run the serve command.
pub async fn run(project_root: &Path, file_config: &ConfigFile, args: ServeArgs) -> Result<()> {
    let document_root = match args.dir {
        Some(dir) => project_root.join(dir),
        None => file_config
            .build_paths(project_root)
            .output_root()
            .to_path_buf(),
    };

    let mut config = file_config.preview_config(project_root, document_root);
    if let Some(port) = args.port {
        config.port = port;
    }
    config.open = config.open && args.open;
    config.live_reload = config.live_reload && args.live_reload;

    PreviewServer::new(config).start().await?;

    Ok(())
}
