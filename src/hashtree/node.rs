//! Hash tree node type and flattened views.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// 32-byte SHA-256 digest.
pub type Digest = [u8; 32];

/// File kind plus unix permission bits (zero where unsupported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileMode {
    pub dir: bool,
    pub perm: u32,
}

impl FileMode {
    /// Mode of an on-disk entry.
    pub fn of(meta: &fs::Metadata) -> Self {
        Self {
            dir: meta.is_dir(),
            perm: permission_bits(meta),
        }
    }

    /// Plain directory mode, used for synthetic tree roots.
    pub const fn directory() -> Self {
        Self { dir: true, perm: 0 }
    }

    pub const fn is_dir(&self) -> bool {
        self.dir
    }

    pub const fn is_file(&self) -> bool {
        !self.dir
    }
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(_meta: &fs::Metadata) -> u32 {
    0
}

/// One element of the hash tree, mirroring a filesystem entry.
///
/// `children` is kept sorted ascending by name with at most one child
/// per name; every sorted-order lookup below relies on that.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub mode: FileMode,
    pub mtime: Option<SystemTime>,
    pub hash: Digest,
    pub children: Vec<Node>,
}

impl Node {
    /// Fresh node carrying observed metadata and no hash yet.
    pub fn new(name: String, mode: FileMode, mtime: Option<SystemTime>) -> Self {
        Self {
            name,
            mode,
            mtime,
            hash: [0; 32],
            children: Vec::new(),
        }
    }

    /// Unnamed directory root for a tree that is read in later.
    pub fn root() -> Self {
        Self::new(String::new(), FileMode::directory(), None)
    }

    /// Index of the child with the given name, by binary search.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.children
            .binary_search_by(|c| c.name.as_str().cmp(name))
            .ok()
    }

    /// Borrow the child with the given name.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.index_of(name).map(|i| &self.children[i])
    }

    /// Remove and return the child with the given name.
    pub fn take(&mut self, name: &str) -> Option<Node> {
        self.index_of(name).map(|i| self.children.remove(i))
    }

    /// Insert the given child, replacing any child of the same name.
    pub fn insert(&mut self, child: Node) {
        match self
            .children
            .binary_search_by(|c| c.name.as_str().cmp(&child.name))
        {
            Ok(i) => self.children[i] = child,
            Err(i) => self.children.insert(i, child),
        }
    }

    /// Pre-order flattening of this subtree.
    ///
    /// `prefix` is the filesystem root the tree was read from; every
    /// returned entry carries a forward-slash relative `filename`. The
    /// root node itself is emitted first with an empty filename.
    pub fn flatten(&self, prefix: &Path) -> Vec<HashFile> {
        let mut out = Vec::with_capacity(self.children.len() + 1);
        self.flatten_into(prefix, "", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &Path, root: &str, out: &mut Vec<HashFile>) {
        let filename = join_rel(root, &self.name);
        out.push(HashFile {
            prefix: prefix.to_owned(),
            filename: filename.clone(),
            hash: self.hash,
            mode: self.mode,
        });

        for child in &self.children {
            child.flatten_into(prefix, &filename, out);
        }
    }
}

/// Join two relative path segments with `/`, ignoring empty parts.
fn join_rel(root: &str, name: &str) -> String {
    if root.is_empty() {
        name.to_owned()
    } else if name.is_empty() {
        root.to_owned()
    } else {
        format!("{root}/{name}")
    }
}

/// Flattened view of one tree entry: where it was read from, its path
/// relative to that root, and the node's hash and mode.
#[derive(Debug, Clone)]
pub struct HashFile {
    pub prefix: PathBuf,
    pub filename: String,
    pub hash: Digest,
    pub mode: FileMode,
}

impl HashFile {
    /// Absolute location of this entry on disk.
    pub fn abs_path(&self) -> PathBuf {
        self.prefix.join(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, hash: u8) -> Node {
        let mut node = Node::new(name.into(), FileMode::default(), None);
        node.hash = [hash; 32];
        node
    }

    #[test]
    fn test_insert_keeps_sorted_order() {
        let mut root = Node::root();
        root.insert(file("c", 1));
        root.insert(file("a", 2));
        root.insert(file("b", 3));

        let names: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut root = Node::root();
        root.insert(file("a", 1));
        root.insert(file("a", 9));

        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].hash, [9; 32]);
    }

    #[test]
    fn test_find_and_take() {
        let mut root = Node::root();
        root.insert(file("a", 1));
        root.insert(file("b", 2));

        assert!(root.find("a").is_some());
        assert!(root.find("z").is_none());

        let taken = root.take("a").unwrap();
        assert_eq!(taken.hash, [1; 32]);
        assert!(root.find("a").is_none());
    }

    #[test]
    fn test_flatten_pre_order_with_relative_names() {
        let mut sub = Node::new("sub".into(), FileMode::directory(), None);
        sub.insert(file("inner.txt", 2));

        let mut root = Node::root();
        root.insert(file("a.txt", 1));
        root.insert(sub);

        let flat = root.flatten(Path::new("/prefix"));
        let names: Vec<_> = flat.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["", "a.txt", "sub", "sub/inner.txt"]);
        assert_eq!(
            flat[3].abs_path(),
            PathBuf::from("/prefix").join("sub/inner.txt")
        );
    }
}
