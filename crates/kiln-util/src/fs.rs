use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// List every regular file under `root`, as paths relative to `root`, sorted.
///
/// A missing root yields an empty list.
///
/// # Errors
/// Returns an error if a directory cannot be traversed.
pub fn list_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            if let Ok(rel) = entry.path().strip_prefix(root) {
                files.push(rel.to_path_buf());
            }
        }
    }
    Ok(files)
}

/// Convert a path to a forward-slash string (stable across platforms).
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .replace("//", "/")
}
