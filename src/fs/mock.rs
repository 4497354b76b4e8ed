use super::{DirEntry, EntryKind, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
enum Node {
    File(String),
    /// Exists but every read fails, like a manifest without read permission.
    Unreadable,
    Dir,
}

/// In-memory repository used by tests.
///
/// Relative paths are resolved against `/mock`, which is also the repository root most
/// tests hand to detectors.
#[derive(Debug)]
pub struct MockFileSystem {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
    root: PathBuf,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::with_root("/mock")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let fs = Self {
            nodes: RwLock::new(BTreeMap::new()),
            root: root.into(),
        };
        fs.insert(&fs.root.clone(), Node::Dir);
        fs
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &str) {
        self.insert(path.as_ref(), Node::File(content.to_string()));
    }

    pub fn add_unreadable_file(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), Node::Unreadable);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), Node::Dir);
    }

    fn insert(&self, path: &Path, node: Node) {
        let path = self.resolve(path);
        let mut nodes = self.write();

        let mut ancestor = PathBuf::new();
        if let Some(parent) = path.parent() {
            for component in parent.components() {
                ancestor.push(component);
                nodes.entry(ancestor.clone()).or_insert(Node::Dir);
            }
        }
        nodes.insert(path, node);
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn node(&self, path: &Path) -> Option<Node> {
        self.read().get(&self.resolve(path)).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.node(path), Some(Node::Dir))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.node(path), Some(Node::File(_) | Node::Unreadable))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.node(path) {
            Some(Node::File(content)) => Ok(content),
            Some(Node::Unreadable) => Err(anyhow!("Permission denied: {}", path.display())),
            Some(Node::Dir) => Err(anyhow!("Is a directory: {}", path.display())),
            None => Err(anyhow!("File not found: {}", path.display())),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let dir = self.resolve(path);
        let nodes = self.read();
        if !matches!(nodes.get(&dir), Some(Node::Dir)) {
            return Err(anyhow!("Directory not found: {}", path.display()));
        }

        Ok(nodes
            .iter()
            .filter(|(child, _)| child.parent() == Some(dir.as_path()))
            .filter_map(|(child, node)| {
                let name = child.file_name()?.to_str()?.to_string();
                let kind = match node {
                    Node::Dir => EntryKind::Dir,
                    Node::File(_) | Node::Unreadable => EntryKind::File,
                };
                Some(DirEntry { name, kind })
            })
            .collect())
    }
}
