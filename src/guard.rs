//! Guarded access facade over the merged view
//!
//! Exposes a fixed, read-only allow-list of filesystem primitives. Absolute
//! paths bypass layer resolution and hit the native filesystem directly;
//! relative paths route through the resolver (single-file operations) or the
//! listing merger (directory operations). Every mutating primitive is
//! rejected before any filesystem access, regardless of underlying
//! permissions.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::locate::Location;
use crate::merger::{FileMeta, MergeFs};
use crate::walk::{Entry, EntryOptions};

/// The operations the guarded facade lets through
pub const ALLOWED_OPERATIONS: [&str; 10] = [
    "exists",
    "metadata",
    "symlink_metadata",
    "read_file",
    "read_dir",
    "read_dir_async",
    "read_file_meta",
    "entries",
    "at",
    "locate",
];

/// Read-only, allow-listed facade over a [`MergeFs`]
pub struct GuardedFs<'a> {
    merger: &'a MergeFs,
}

impl MergeFs {
    /// The guarded facade for this merged view
    pub fn guard(&self) -> GuardedFs<'_> {
        GuardedFs { merger: self }
    }
}

impl GuardedFs<'_> {
    /// Route a path argument: absolute paths pass straight through,
    /// relative paths go through layer resolution (with the scratch-dir
    /// fallback supplying native errors for misses).
    fn route(&self, path: &str) -> PathBuf {
        if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.merger.resolve(path)
        }
    }

    /// Whether the path exists in any layer (or natively, for absolute paths)
    pub fn exists(&self, path: &str) -> bool {
        self.route(path).exists()
    }

    /// Stat, following symlinks; native errors propagate verbatim
    pub fn metadata(&self, path: &str) -> Result<Metadata> {
        Ok(fs::metadata(self.route(path))?)
    }

    /// Stat, without following symlinks
    pub fn symlink_metadata(&self, path: &str) -> Result<Metadata> {
        Ok(fs::symlink_metadata(self.route(path))?)
    }

    /// Read a single file; a relative path missing from every layer fails
    /// with the native not-found error
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.route(path))?)
    }

    /// [`read_file`](Self::read_file) decoded as UTF-8
    pub fn read_file_utf8(&self, path: &str) -> Result<String> {
        Ok(fs::read_to_string(self.route(path))?)
    }

    /// List direct child names: merged union for relative paths, native
    /// listing for absolute ones
    pub fn read_dir(&self, path: &str) -> Result<Vec<String>> {
        if Path::new(path).is_absolute() {
            let mut names = Vec::new();
            for entry in fs::read_dir(path)? {
                names.push(entry?.file_name().to_string_lossy().into_owned());
            }
            Ok(names)
        } else {
            self.merger.read_dir_names(path)
        }
    }

    /// Asynchronous [`read_dir`](Self::read_dir)
    pub async fn read_dir_async(&self, path: &str) -> Result<Vec<String>> {
        if Path::new(path).is_absolute() {
            let mut names = Vec::new();
            let mut reader = tokio::fs::read_dir(path).await?;
            while let Some(entry) = reader.next_entry().await? {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            Ok(names)
        } else {
            self.merger.read_dir_names_async(path).await
        }
    }

    /// Merge-specific: where a relative path lives or would live
    pub fn read_file_meta(&self, path: &str, base_path: Option<&Path>) -> Option<FileMeta> {
        self.merger.read_file_meta(path, base_path)
    }

    /// Merge-specific: deep enumeration
    pub fn entries(&self, dir: &str) -> Result<Vec<Entry>> {
        self.merger.entries(dir)
    }

    /// Merge-specific: deep enumeration with options
    pub fn entries_with(&self, dir: &str, options: &EntryOptions) -> Result<Vec<Entry>> {
        self.merger.entries_with(dir, options)
    }

    /// Merge-specific: sub-merge scoped to one layer
    pub fn at(&self, index: usize) -> Result<MergeFs> {
        self.merger.at(index)
    }

    /// Merge-specific: reverse lookup of an absolute path
    pub fn locate(&self, path: &Path) -> Result<Option<Location>> {
        self.merger.locate(path)
    }

    // Default-deny branch: the merged view is read-only, so every mutating
    // primitive fails before touching the filesystem.

    /// Always fails: the merged view is read-only
    pub fn write_file(&self, _path: &str, _contents: &[u8]) -> Result<()> {
        Err(forbidden("write_file"))
    }

    /// Always fails: the merged view is read-only
    pub fn append_file(&self, _path: &str, _contents: &[u8]) -> Result<()> {
        Err(forbidden("append_file"))
    }

    /// Always fails: the merged view is read-only
    pub fn create_dir(&self, _path: &str) -> Result<()> {
        Err(forbidden("create_dir"))
    }

    /// Always fails: the merged view is read-only
    pub fn remove_file(&self, _path: &str) -> Result<()> {
        Err(forbidden("remove_file"))
    }

    /// Always fails: the merged view is read-only
    pub fn remove_dir(&self, _path: &str) -> Result<()> {
        Err(forbidden("remove_dir"))
    }

    /// Always fails: the merged view is read-only
    pub fn rename(&self, _from: &str, _to: &str) -> Result<()> {
        Err(forbidden("rename"))
    }
}

fn forbidden(operation: &str) -> Error {
    debug!("rejecting {} through the guarded filesystem", operation);
    Error::ForbiddenOperation {
        operation: operation.to_string(),
    }
}
