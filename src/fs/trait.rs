use anyhow::Result;
use std::path::{Path, PathBuf};

/// Directories never descended into while walking a repository.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".gradle",
    ".idea",
    ".mvn",
    "build",
    "dist",
    "node_modules",
    "out",
    "target",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks to nothing, sockets and the like. Never followed.
    Other,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Read-only view of a repository.
pub trait FileSystem: Send + Sync {
    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Children of `path` in no particular order.
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Read a file only if it exists.
    ///
    /// `Ok(None)` means the file is absent; an `Err` means it exists but could not be read.
    fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        if !self.is_file(path) {
            return Ok(None);
        }
        self.read_to_string(path).map(Some)
    }

    /// Names of the regular files directly inside `dir`, sorted. An unlistable directory
    /// yields an empty list.
    fn file_names(&self, dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = self
            .read_dir(dir)
            .map(|entries| {
                entries
                    .into_iter()
                    .filter(|e| e.kind == EntryKind::File)
                    .map(|e| e.name)
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Walk `root` depth-first in lexicographic order and return the files found,
    /// relative to `root`.
    ///
    /// A file directly under `root` has depth 1; files deeper than `max_depth` are skipped,
    /// as is everything under [`EXCLUDED_DIRS`].
    fn walk(&self, root: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        walk_dir(self, root, Path::new(""), 1, max_depth, &mut files)?;
        Ok(files)
    }
}

fn walk_dir<F: FileSystem + ?Sized>(
    fs: &F,
    root: &Path,
    relative: &Path,
    depth: usize,
    max_depth: usize,
    files: &mut Vec<PathBuf>,
) -> Result<()> {
    if depth > max_depth {
        return Ok(());
    }

    let mut entries = fs.read_dir(&root.join(relative))?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    for entry in entries {
        let child = relative.join(&entry.name);
        match entry.kind {
            EntryKind::File => files.push(child),
            EntryKind::Dir if !EXCLUDED_DIRS.contains(&entry.name.as_str()) => {
                walk_dir(fs, root, &child, depth + 1, max_depth, files)?
            }
            _ => {}
        }
    }

    Ok(())
}
