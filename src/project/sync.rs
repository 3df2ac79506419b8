//! Layered merge of module static trees into the target directory.

use super::{Project, STATIC_FOLDER};
use crate::debug;
use crate::hashtree::{find_file, put_top};
use crate::utils::fsx;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

impl Project {
    /// Write only differing files from the source overlay to the
    /// target, then prune everything the overlay does not account for.
    ///
    /// The overlay is assembled dependencies-first so that, for equal
    /// relative paths, the main module (index 0) shadows every
    /// dependency. Returns the number of files copied.
    pub(super) fn sync(&mut self) -> Result<usize> {
        let mut src_tree = Vec::new();
        for part in self.parts.iter().rev() {
            let static_dir = part.module.dir.join(STATIC_FOLDER);
            src_tree = put_top(src_tree, part.tree.flatten(&static_dir));
        }

        // pre-order is not strictly lexicographic (`a.b` sorts between
        // `a` and `a/x`), both lookups below need a real sort
        let mut dst_tree = self.dst.flatten(&self.dst_path);
        dst_tree.sort_by(|a, b| a.filename.cmp(&b.filename));

        // copy only files which differ in content or do not exist yet
        let mut copied = 0;
        for file in &src_tree {
            let known = find_file(&dst_tree, &file.filename);
            if known.is_some_and(|i| dst_tree[i].hash == file.hash) {
                debug!("sync"; "unmodified: {}", file.filename);
                continue;
            }

            let to = self.dst_path.join(&file.filename);
            if file.mode.is_dir() {
                fs::create_dir_all(&to).with_context(|| {
                    format!("unable to create target folder: {}", to.display())
                })?;
                continue;
            }

            let from = file.abs_path();
            debug!("sync"; "copy modified file {} -> {}", from.display(), to.display());
            fsx::copy_file(&to, &from)?;
            copied += 1;
        }

        // remove extra files which have no source counterpart
        'next_file: for file in &dst_tree {
            if find_file(&src_tree, &file.filename).is_some() {
                continue;
            }

            let target = file.abs_path();
            for extra in &self.extra_dst_files {
                if &target == extra {
                    continue 'next_file;
                }
            }

            debug!("sync"; "removing extra file: {}", target.display());
            remove_all(&target)?;
        }

        Ok(copied)
    }
}

/// Remove a file or directory tree; already-gone targets are fine
/// (a pruned parent takes its children with it).
fn remove_all(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to remove extra file: {}", path.display()));
        }
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove extra file: {}", path.display())),
    }
}
