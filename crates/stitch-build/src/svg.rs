//! Repair of generated SVG diagrams.
//!
//! Doxygen's collaboration graphs for templated types end their labels with
//! an escaped `<`, which renders as a stray bracket.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

const BROKEN_LABEL_END: &str = "&lt;</text>";
const LABEL_END: &str = "</text>";

/// Repair every `.svg` file directly inside `dir`.
///
/// Returns the number of files that were rewritten.
pub fn repair_svg_labels(dir: &Path) -> io::Result<usize> {
    let svgs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("svg"))
        .collect();

    let results: Vec<io::Result<bool>> = svgs.par_iter().map(|p| repair_file(p)).collect();

    let mut repaired = 0;
    for result in results {
        if result? {
            repaired += 1;
        }
    }

    Ok(repaired)
}

fn repair_file(path: &Path) -> io::Result<bool> {
    let content = fs::read_to_string(path)?;
    if !content.contains(BROKEN_LABEL_END) {
        return Ok(false);
    }

    tracing::debug!("Postprocessing svg: {}", path.display());
    fs::write(path, content.replace(BROKEN_LABEL_END, LABEL_END))?;
    Ok(true)
}
