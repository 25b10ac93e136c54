use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::writer::TEMP_MARKER;

/// Extensions treated as photos (case-insensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

/// A directory or entry that could not be read. Its subtree is skipped.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalError {
    pub path: Option<PathBuf>,
    pub message: String,
}

/// Result of walking the root directory
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Photos in traversal order (directories sorted by name)
    pub files: Vec<PathBuf>,
    /// Temporary copies left behind by an interrupted earlier run
    pub orphans: Vec<PathBuf>,
    pub errors: Vec<TraversalError>,
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(e))
        })
}

pub fn is_temp_artifact(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.contains(TEMP_MARKER)
}

/// Recursively collect photos below `root`. Symlinks are not followed.
pub fn scan_images(root: &Path) -> ScanResult {
    let mut result = ScanResult::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf);
                tracing::warn!(
                    path = %path.as_deref().unwrap_or(root).display(),
                    "skipping unreadable entry: {err}"
                );
                result.errors.push(TraversalError {
                    path,
                    message: err.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if is_temp_artifact(&entry.file_name().to_string_lossy()) {
            tracing::warn!(path = %entry.path().display(), "orphaned temporary file from an interrupted run");
            result.orphans.push(entry.into_path());
            continue;
        }

        if is_image(entry.path()) {
            result.files.push(entry.into_path());
        }
    }

    tracing::debug!(
        root = %root.display(),
        files = result.files.len(),
        "scan complete"
    );
    result
}
