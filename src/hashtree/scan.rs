//! Incremental directory scanning.

use super::node::{Digest, FileMode, Node};
use crate::debug;
use anyhow::{Context, Result};
use sha2::{Digest as _, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// Update `parent` in place so it reflects the contents of `root`.
///
/// Entries whose base name starts with a dot are ignored entirely,
/// including their subtrees. A regular file whose mode and mtime match
/// the cached child keeps its hash without rereading the content;
/// `force` disables that shortcut. Children that no longer exist on
/// disk are removed, and the directory hash is recomputed over all
/// remaining children in sorted-name order.
///
/// Note that the shortcut misfires on filesystems where mtime is not
/// updated or the timer resolution is too coarse.
pub fn read_dir(root: &Path, parent: &mut Node, force: bool) -> Result<()> {
    let listing =
        fs::read_dir(root).with_context(|| format!("unable to list directory: {}", root.display()))?;

    let mut entries = Vec::new();
    for entry in listing {
        let entry =
            entry.with_context(|| format!("unable to list directory: {}", root.display()))?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                debug!("hashtree"; "{}: skipping non-utf8 name {:?}", root.display(), raw);
                continue;
            }
        };
        if name.starts_with('.') {
            continue;
        }

        let meta = entry
            .metadata()
            .with_context(|| format!("unable to stat: {}", entry.path().display()))?;
        if !meta.is_file() && !meta.is_dir() {
            // sockets, fifos, dangling symlinks: nothing to hash or copy
            continue;
        }

        entries.push((name, meta));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut seen = Vec::with_capacity(entries.len());
    for (name, meta) in entries {
        let mode = FileMode::of(&meta);
        let mtime = meta.modified().ok();
        let path = root.join(&name);
        seen.push(name.clone());

        // ModTime shortcut: an unchanged regular file keeps its hash.
        if !force {
            if let Some(known) = parent.find(&name) {
                if known.mode.is_file()
                    && known.mode == mode
                    && mtime.is_some()
                    && known.mtime == mtime
                {
                    debug!("hashtree"; "{}: file not changed, hash reused: {}", root.display(), name);
                    continue;
                }
            }
        }

        // keep the node when the kind matches (directories retain their
        // children so nested shortcuts stay hot), start fresh otherwise
        let mut node = match parent.take(&name) {
            Some(known) if known.mode.dir == mode.dir => known,
            _ => Node::new(name.clone(), mode, mtime),
        };
        node.mode = mode;
        node.mtime = mtime;

        if mode.is_file() {
            node.hash = hash_file(&path)
                .with_context(|| format!("unable to hash file: {}", path.display()))?;
            node.children.clear();
        } else {
            read_dir(&path, &mut node, force)
                .with_context(|| format!("unable to read node dir: {}", path.display()))?;
        }

        parent.insert(node);
    }

    // purge children which are absent from the filesystem
    parent
        .children
        .retain(|child| seen.binary_search(&child.name).is_ok());

    // update the merkle hash over all children, sorted by name
    let mut hasher = Sha256::new();
    for child in &parent.children {
        hasher.update(child.hash);
    }
    parent.hash = hasher.finalize().into();

    Ok(())
}

/// SHA-256 of a single file's contents.
pub fn hash_file(path: &Path) -> Result<Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scan(root: &Path, force: bool) -> Node {
        let mut tree = Node::root();
        read_dir(root, &mut tree, force).unwrap();
        tree
    }

    #[test]
    fn test_file_hash_is_sha256_of_contents() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hello.txt"), b"hello world").unwrap();

        let tree = scan(dir.path(), false);
        let expected: Digest = Sha256::digest(b"hello world").into();
        assert_eq!(tree.find("hello.txt").unwrap().hash, expected);
    }

    #[test]
    fn test_dot_entries_are_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("visible.txt"), "v").unwrap();
        fs::write(dir.path().join(".hidden"), "h").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/config"), "c").unwrap();

        let tree = scan(dir.path(), false);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "visible.txt");
    }

    #[test]
    fn test_directory_hash_covers_children_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let tree = scan(dir.path(), false);

        let mut hasher = Sha256::new();
        hasher.update(tree.find("a.txt").unwrap().hash);
        hasher.update(tree.find("b.txt").unwrap().hash);
        let expected: Digest = hasher.finalize().into();
        assert_eq!(tree.hash, expected);
    }

    #[test]
    fn test_rescan_is_deterministic() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("sub/b.txt"), "b").unwrap();

        let first = scan(dir.path(), false);
        let second = scan(dir.path(), false);
        let forced = scan(dir.path(), true);
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.hash, forced.hash);
    }

    #[test]
    fn test_modtime_shortcut_reuses_cached_hash() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let mut tree = Node::root();
        read_dir(dir.path(), &mut tree, false).unwrap();

        // tamper with the cached hash; an unchanged file must keep it
        let idx = tree.index_of("a.txt").unwrap();
        tree.children[idx].hash = [0xee; 32];
        read_dir(dir.path(), &mut tree, false).unwrap();
        assert_eq!(tree.find("a.txt").unwrap().hash, [0xee; 32]);

        // force recomputes regardless of mtime
        read_dir(dir.path(), &mut tree, true).unwrap();
        let expected: Digest = Sha256::digest(b"a").into();
        assert_eq!(tree.find("a.txt").unwrap().hash, expected);
    }

    #[test]
    fn test_absent_children_are_purged() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.txt"), "k").unwrap();
        fs::write(dir.path().join("gone.txt"), "g").unwrap();

        let mut tree = Node::root();
        read_dir(dir.path(), &mut tree, false).unwrap();
        assert_eq!(tree.children.len(), 2);

        fs::remove_file(dir.path().join("gone.txt")).unwrap();
        read_dir(dir.path(), &mut tree, false).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "keep.txt");
    }

    #[test]
    fn test_kind_change_replaces_node() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("entry"), "file").unwrap();

        let mut tree = Node::root();
        read_dir(dir.path(), &mut tree, false).unwrap();
        assert!(tree.find("entry").unwrap().mode.is_file());

        fs::remove_file(dir.path().join("entry")).unwrap();
        fs::create_dir(dir.path().join("entry")).unwrap();
        fs::write(dir.path().join("entry/inner.txt"), "i").unwrap();

        read_dir(dir.path(), &mut tree, false).unwrap();
        let entry = tree.find("entry").unwrap();
        assert!(entry.mode.is_dir());
        assert_eq!(entry.children.len(), 1);
    }

    #[test]
    fn test_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let mut tree = Node::root();
        assert!(read_dir(&dir.path().join("nope"), &mut tree, false).is_err());
    }
}
