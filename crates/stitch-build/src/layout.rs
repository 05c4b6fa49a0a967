//! Output tree fixups.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::BuildError;

/// Move everything under `dir/nested` up into `dir` and remove `dir/nested`.
///
/// Entries already present in `dir` with the same name are replaced. Returns
/// `false` when there was no nested directory to flatten.
pub async fn flatten_nested(dir: &Path, nested: &str) -> Result<bool, BuildError> {
    let nested_dir = dir.join(nested);
    if !tokio::fs::try_exists(&nested_dir).await? {
        return Ok(false);
    }

    // Stage under a private name so a child called `nested` can move up too.
    let staging = dir.join(format!(".{}.staging", nested));
    remove_any(&staging).await?;
    tokio::fs::rename(&nested_dir, &staging).await?;

    let mut entries = tokio::fs::read_dir(&staging).await?;
    let mut moved = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        let name: OsString = entry.file_name();
        let target = dir.join(&name);
        remove_any(&target).await?;
        move_entry(entry.path(), target).await?;
        moved += 1;
    }

    tokio::fs::remove_dir_all(&staging).await?;
    tracing::debug!("Flattened {} entries from {}", moved, nested_dir.display());

    Ok(true)
}

/// Remove a file or directory if it exists.
pub async fn remove_any(path: &Path) -> io::Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Rename, falling back to copy + delete when a rename is not possible.
async fn move_entry(from: PathBuf, to: PathBuf) -> Result<(), BuildError> {
    if tokio::fs::rename(&from, &to).await.is_ok() {
        return Ok(());
    }

    tokio::task::spawn_blocking(move || -> io::Result<()> {
        copy_tree(&from, &to)?;
        if from.is_dir() {
            fs::remove_dir_all(&from)
        } else {
            fs::remove_file(&from)
        }
    })
    .await??;

    Ok(())
}

/// Recursively copy a file or directory tree.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_file() {
        fs::copy(from, to)?;
        return Ok(());
    }

    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
