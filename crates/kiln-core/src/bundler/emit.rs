//! All-or-nothing artifact emission.
//!
//! Artifacts are first written to a staging directory next to the output
//! directory. Only when every write succeeded are they moved into place;
//! files they replace are backed up and restored if a move fails.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// What an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Script,
    Style,
    Asset,
    SourceMap,
    Html,
    Manifest,
    Stats,
}

/// A file to write, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl Artifact {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ArtifactKind, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes: bytes.into(),
        }
    }
}

/// Emission failure. The output directory is left as it was.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("permission denied writing {}", .path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid artifact name '{0}'")]
    InvalidName(String),

    #[error("two artifacts are named '{0}'")]
    Duplicate(String),
}

impl EmitError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                path: path.to_path_buf(),
                source,
            }
        } else {
            Self::Write {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Write { .. } => "EMIT_WRITE_ERROR",
            Self::PermissionDenied { .. } => "EMIT_PERMISSION_DENIED",
            Self::InvalidName(_) => "EMIT_INVALID_NAME",
            Self::Duplicate(_) => "EMIT_DUPLICATE_ARTIFACT",
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Write { path, .. } | Self::PermissionDenied { path, .. } => Some(path),
            Self::InvalidName(_) | Self::Duplicate(_) => None,
        }
    }
}

/// What was written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitResult {
    /// Output-relative names, in artifact order.
    pub written: Vec<String>,
    pub bytes: u64,
}

/// Write `artifacts` into `out_dir` atomically as a set.
///
/// With `clean`, files from earlier builds that are not part of this set are
/// removed as well.
pub fn emit(artifacts: &[Artifact], out_dir: &Path, clean: bool) -> Result<EmitResult, EmitError> {
    validate(artifacts)?;

    let parent = out_dir.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| EmitError::io(parent, e))?;
    let dir_name = out_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("out");
    let staging = parent.join(format!(".{dir_name}.kiln-staging-{}", std::process::id()));
    let backup = parent.join(format!(".{dir_name}.kiln-backup-{}", std::process::id()));
    remove_if_exists(&staging);
    remove_if_exists(&backup);

    let _span = tracing::debug_span!("emit", out = %out_dir.display(), count = artifacts.len()).entered();

    if let Err(e) = stage(artifacts, &staging) {
        remove_if_exists(&staging);
        return Err(e);
    }

    let committed = if clean {
        commit_replace(&staging, out_dir, &backup)
    } else {
        commit_merge(artifacts, &staging, out_dir, &backup)
    };
    remove_if_exists(&staging);
    remove_if_exists(&backup);
    committed?;

    Ok(EmitResult {
        written: artifacts.iter().map(|a| a.name.clone()).collect(),
        bytes: artifacts.iter().map(|a| a.bytes.len() as u64).sum(),
    })
}

fn validate(artifacts: &[Artifact]) -> Result<(), EmitError> {
    let mut seen = BTreeSet::new();
    for artifact in artifacts {
        let path = Path::new(&artifact.name);
        let valid = !artifact.name.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(EmitError::InvalidName(artifact.name.clone()));
        }
        if !seen.insert(artifact.name.as_str()) {
            return Err(EmitError::Duplicate(artifact.name.clone()));
        }
    }
    Ok(())
}

fn stage(artifacts: &[Artifact], staging: &Path) -> Result<(), EmitError> {
    fs::create_dir_all(staging).map_err(|e| EmitError::io(staging, e))?;
    for artifact in artifacts {
        let path = staging.join(&artifact.name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| EmitError::io(dir, e))?;
        }
        fs::write(&path, &artifact.bytes).map_err(|e| EmitError::io(&path, e))?;
    }
    Ok(())
}

/// Swap the whole directory: `out_dir` → backup, staging → `out_dir`.
fn commit_replace(staging: &Path, out_dir: &Path, backup: &Path) -> Result<(), EmitError> {
    let had_previous = out_dir.exists();
    if had_previous {
        fs::rename(out_dir, backup).map_err(|e| EmitError::io(out_dir, e))?;
    }
    if let Err(e) = fs::rename(staging, out_dir) {
        if had_previous {
            let _ = fs::rename(backup, out_dir);
        }
        return Err(EmitError::io(out_dir, e));
    }
    Ok(())
}

/// Move staged files over their targets one by one, undoing every move on failure.
fn commit_merge(artifacts: &[Artifact], staging: &Path, out_dir: &Path, backup: &Path) -> Result<(), EmitError> {
    let mut placed: Vec<&str> = Vec::new();
    let mut backed_up: Vec<&str> = Vec::new();

    let result = (|| -> Result<(), EmitError> {
        fs::create_dir_all(out_dir).map_err(|e| EmitError::io(out_dir, e))?;
        for artifact in artifacts {
            let name = artifact.name.as_str();
            let target = out_dir.join(name);
            if target.exists() {
                let saved = backup.join(name);
                if let Some(dir) = saved.parent() {
                    fs::create_dir_all(dir).map_err(|e| EmitError::io(dir, e))?;
                }
                fs::rename(&target, &saved).map_err(|e| EmitError::io(&target, e))?;
                backed_up.push(name);
            }
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir).map_err(|e| EmitError::io(dir, e))?;
            }
            fs::rename(staging.join(name), &target).map_err(|e| EmitError::io(&target, e))?;
            placed.push(name);
        }
        Ok(())
    })();

    if result.is_err() {
        tracing::warn!(out = %out_dir.display(), "emit failed, restoring previous output");
        for name in placed {
            let _ = fs::remove_file(out_dir.join(name));
        }
        for name in backed_up {
            let _ = fs::rename(backup.join(name), out_dir.join(name));
        }
    }
    result
}

fn remove_if_exists(path: &Path) {
    if path.is_dir() {
        let _ = fs::remove_dir_all(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_util::fs::list_files;
    use tempfile::tempdir;

    fn script(name: &str, body: &str) -> Artifact {
        Artifact::new(name, ArtifactKind::Script, body.as_bytes())
    }

    #[test]
    fn test_emit_writes_nested_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("dist");
        let result = emit(
            &[script("index.js", "a"), Artifact::new("img/logo.png", ArtifactKind::Asset, vec![1, 2])],
            &out,
            false,
        )
        .unwrap();

        assert_eq!(result.written, vec!["index.js", "img/logo.png"]);
        assert_eq!(result.bytes, 3);
        assert_eq!(fs::read_to_string(out.join("index.js")).unwrap(), "a");
        assert_eq!(fs::read(out.join("img/logo.png")).unwrap(), vec![1, 2]);
        // No staging or backup directory left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failure_leaves_previous_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("dist");
        emit(&[script("old.js", "old"), script("index.js", "v1")], &out, false).unwrap();

        // `a.js` as a file and as a directory cannot both be written.
        let err = emit(
            &[script("index.js", "v2"), script("a.js", "x"), script("a.js/b.js", "y")],
            &out,
            false,
        )
        .unwrap_err();
        assert_eq!(err.code(), "EMIT_WRITE_ERROR");

        assert_eq!(fs::read_to_string(out.join("index.js")).unwrap(), "v1");
        assert_eq!(
            list_files(&out).unwrap(),
            vec![PathBuf::from("index.js"), PathBuf::from("old.js")]
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_merge_keeps_other_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("dist");
        emit(&[script("old.js", "old")], &out, false).unwrap();
        emit(&[script("new.js", "new")], &out, false).unwrap();

        assert_eq!(
            list_files(&out).unwrap(),
            vec![PathBuf::from("new.js"), PathBuf::from("old.js")]
        );
    }

    #[test]
    fn test_clean_replaces_directory() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("dist");
        emit(&[script("old.js", "old")], &out, false).unwrap();
        emit(&[script("new.js", "new")], &out, true).unwrap();

        assert_eq!(list_files(&out).unwrap(), vec![PathBuf::from("new.js")]);
    }

    #[test]
    fn test_invalid_and_duplicate_names() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("dist");

        let err = emit(&[script("../escape.js", "x")], &out, false).unwrap_err();
        assert_eq!(err.code(), "EMIT_INVALID_NAME");
        let err = emit(&[script("/abs.js", "x")], &out, false).unwrap_err();
        assert_eq!(err.code(), "EMIT_INVALID_NAME");
        let err = emit(&[script("a.js", "x"), script("a.js", "y")], &out, false).unwrap_err();
        assert_eq!(err.code(), "EMIT_DUPLICATE_ARTIFACT");
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_code() {
        let err = EmitError::io(
            Path::new("/x"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.code(), "EMIT_PERMISSION_DENIED");
        assert_eq!(err.path(), Some(Path::new("/x")));
    }
}
