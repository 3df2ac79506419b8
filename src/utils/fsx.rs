//! Small filesystem helpers shared by the sync and template stages.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Copy `src` to `dst`, replacing whatever was there.
///
/// The target is removed first so stale metadata never leaks through.
pub fn copy_file(dst: &Path, src: &Path) -> Result<()> {
    match fs::symlink_metadata(dst) {
        Ok(meta) => {
            let removed = if meta.is_dir() {
                fs::remove_dir_all(dst)
            } else {
                fs::remove_file(dst)
            };
            removed.with_context(|| format!("unable to replace {}", dst.display()))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("unable to replace {}", dst.display()));
        }
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("unable to create {}", parent.display()))?;
    }

    fs::copy(src, dst).with_context(|| {
        format!("unable to copy {} -> {}", src.display(), dst.display())
    })?;

    Ok(())
}

/// List every regular file below `root`, skipping dot-prefixed directories.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("cannot list files: {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("cannot list files: {}", dir.display()))?;
        let name = entry.file_name();
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("cannot stat {}", path.display()))?;

        if file_type.is_dir() {
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }

    Ok(())
}
