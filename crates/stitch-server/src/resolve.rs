//! Mapping request paths onto files across several static roots.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Default document for directory requests.
pub const INDEX_FILE: &str = "index.html";

/// An extra static root served under a route prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// URL prefix, e.g. `/components`
    pub route_prefix: String,

    /// Directory served under the prefix
    pub target_dir: PathBuf,
}

impl Mount {
    pub fn new(route_prefix: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            route_prefix: route_prefix.into(),
            target_dir: target_dir.into(),
        }
    }

    /// The part of `relative` below this mount's prefix, if it matches.
    fn strip<'a>(&self, relative: &'a Path) -> Option<&'a Path> {
        let prefix = sanitize(&self.route_prefix)?;
        relative.strip_prefix(prefix).ok()
    }
}

/// A file found for a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The path named a file
    File(PathBuf),

    /// The path named a directory; this is its index document
    DirectoryIndex(PathBuf),
}

impl Resolved {
    pub fn path(&self) -> &Path {
        match self {
            Resolved::File(path) | Resolved::DirectoryIndex(path) => path,
        }
    }
}

/// Resolves request paths against the document root, then each mount in order.
#[derive(Debug, Clone)]
pub struct Resolver {
    document_root: PathBuf,
    mounts: Vec<Mount>,
}

impl Resolver {
    pub fn new(document_root: impl Into<PathBuf>, mounts: Vec<Mount>) -> Self {
        Self {
            document_root: document_root.into(),
            mounts,
        }
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Find the file for a request path. The first root holding it wins.
    pub async fn resolve(&self, request_path: &str) -> Option<Resolved> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        let relative = sanitize(&decoded)?;

        if let Some(found) = lookup(&self.document_root, &relative).await {
            return Some(found);
        }

        for mount in &self.mounts {
            if let Some(rest) = mount.strip(&relative) {
                if let Some(found) = lookup(&mount.target_dir, rest).await {
                    return Some(found);
                }
            }
        }

        None
    }
}

/// Turn a URL path into a relative filesystem path.
///
/// Returns `None` for anything that could step outside a root.
fn sanitize(path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => out.push(part),
            (Some(Component::CurDir), None) => {}
            _ => return None,
        }
    }
    Some(out)
}

async fn lookup(root: &Path, relative: &Path) -> Option<Resolved> {
    let candidate = root.join(relative);
    let meta = tokio::fs::metadata(&candidate).await.ok()?;

    if meta.is_file() {
        return Some(Resolved::File(candidate));
    }

    if meta.is_dir() {
        let index = candidate.join(INDEX_FILE);
        if tokio::fs::metadata(&index).await.ok()?.is_file() {
            return Some(Resolved::DirectoryIndex(index));
        }
    }

    None
}
