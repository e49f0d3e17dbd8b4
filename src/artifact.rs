//! Discovery of report artifacts on disk by naming convention.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::{Result, TiaError};
use crate::format::ArtifactFormat;

/// Collect every file of kind `format` under `paths`.
///
/// Directories are walked recursively without a depth limit, entries in
/// file-name order; plain files are checked directly. Input order is kept.
/// Linked directories are followed, each real directory at most once.
pub fn filter_by_format<P: AsRef<Path>>(paths: &[P], format: ArtifactFormat) -> Result<Vec<PathBuf>> {
    let mut matched = Vec::new();
    let mut visited = HashSet::new();
    for path in paths {
        let path = path.as_ref();
        let meta = fs::metadata(path).map_err(|e| with_path(path, e))?;
        if meta.is_dir() {
            collect_dir(path, format, &mut visited, &mut matched)?;
        } else if format.matches(path) {
            matched.push(path.to_path_buf());
        }
    }
    Ok(matched)
}

/// Read every matching file as a JSON array of `T` and concatenate them.
/// The first file that fails to parse aborts the read.
pub fn read_objects<T, P>(paths: &[P], format: ArtifactFormat) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let mut objects = Vec::new();
    for file in filter_by_format(paths, format)? {
        let content = fs::read(&file).map_err(|e| with_path(&file, e))?;
        let parsed: Vec<T> = serde_json::from_slice(&content)
            .map_err(|source| TiaError::MalformedArtifact { path: file, source })?;
        objects.extend(parsed);
    }
    Ok(objects)
}

fn collect_dir(
    dir: &Path,
    format: ArtifactFormat,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let canonical = fs::canonicalize(dir).map_err(|e| with_path(dir, e))?;
    if !visited.insert(canonical) {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .map_err(|e| with_path(dir, e))?
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| with_path(dir, e))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        // Follows symlinks, so a linked directory is walked like a real one.
        let meta = fs::metadata(&path).map_err(|e| with_path(&path, e))?;
        if meta.is_dir() {
            collect_dir(&path, format, visited, out)?;
        } else if format.matches(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn with_path(path: &Path, err: io::Error) -> TiaError {
    TiaError::Io(io::Error::new(
        err.kind(),
        format!("{}: {}", path.display(), err),
    ))
}
