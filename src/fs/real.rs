use super::{DirEntry, EntryKind, FileSystem, EXCLUDED_DIRS};
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// The local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        fs::read_dir(path)
            .with_context(|| format!("Failed to list {}", path.display()))?
            .map(|entry| -> Result<DirEntry> {
                let entry = entry.context("Failed to read directory entry")?;
                // Follows symlinks, so a link to a manifest counts as a file.
                let target = entry.path();
                let kind = if target.is_file() {
                    EntryKind::File
                } else if target.is_dir() {
                    EntryKind::Dir
                } else {
                    EntryKind::Other
                };
                Ok(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    kind,
                })
            })
            .collect()
    }

    /// Walks with the `ignore` crate so `.gitignore`d trees are skipped the same way
    /// `git` would skip them.
    fn walk(&self, root: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            anyhow::bail!("Repository path is not a directory: {:?}", root);
        }

        let mut files = Vec::new();
        let walker = WalkBuilder::new(root)
            .max_depth(Some(max_depth))
            .hidden(false)
            .git_ignore(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .map(|name| EXCLUDED_DIRS.contains(&name))
                        .unwrap_or(false))
            })
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };

            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }

        Ok(files)
    }
}
