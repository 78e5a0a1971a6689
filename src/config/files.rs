//! Test file discovery
//!
//! Turns the command-line paths into the work list handed to the coordinator.
//! Files named explicitly are always kept; directories are searched
//! recursively for files whose name ends with the configured pattern.
//! Symbolic links to directories are not followed.

use crate::Result;
use anyhow::Context;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect test files from `paths`.
///
/// Directory contents are returned in sorted path order. Duplicates are
/// dropped, keeping the first occurrence.
pub fn discover(paths: &[PathBuf], pattern: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for path in paths {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Test path not found: {}", path.display()))?;

        let found = if metadata.is_dir() {
            collect_test_files(path, pattern)
                .with_context(|| format!("Failed to search directory: {}", path.display()))?
        } else {
            vec![path.clone()]
        };

        for file in found {
            let item = file.to_string_lossy().into_owned();
            if seen.insert(item.clone()) {
                files.push(item);
            }
        }
    }

    Ok(files)
}

/// Recursively collect files under `dir` matching `pattern`.
fn collect_test_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        // Links to files count; links to directories are skipped
        let path = entry.into_path();
        if path.is_file() && matches_pattern(&path, pattern) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// True when the file name, with or without its extension, ends with `pattern`.
fn matches_pattern(path: &Path, pattern: &str) -> bool {
    let ends_with = |part: Option<&std::ffi::OsStr>| {
        part.and_then(|p| p.to_str())
            .is_some_and(|p| p.ends_with(pattern))
    };

    ends_with(path.file_stem()) || ends_with(path.file_name())
}
