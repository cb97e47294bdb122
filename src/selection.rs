use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SelectionConfig;
use crate::models::{Content, DocumentHandle};

/// Turn command-line paths into document handles.
///
/// Files named explicitly are always selected. Directories are walked and
/// filtered through the include/exclude globs, matched against the path
/// relative to that directory. Content is not read here; it is read when the
/// document is uploaded.
pub fn select_paths(paths: &[PathBuf], config: &SelectionConfig) -> Result<Vec<DocumentHandle>> {
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut handles = Vec::new();

    for root in paths {
        if root.is_file() {
            handles.push(file_to_handle(root));
            continue;
        }
        if !root.is_dir() {
            bail!("Selected path does not exist: {}", root.display());
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) {
                continue;
            }
            if !include_set.is_match(&rel_str) {
                continue;
            }

            found.push(file_to_handle(path));
        }

        // Sort for deterministic ordering
        found.sort_by(|a, b| a.name.cmp(&b.name));
        handles.extend(found);
    }

    Ok(handles)
}

fn file_to_handle(path: &Path) -> DocumentHandle {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    DocumentHandle {
        name,
        modified,
        content: Content::Path(path.to_path_buf()),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
