//! Deep enumeration of the merged view
//!
//! Walks each layer in registration order, rewrites layer-relative paths
//! through the layer's rename transform and prefix, and collapses entries
//! that land on the same final path: the later layer's entry replaces the
//! earlier one, mirroring single-file read precedence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;
use crate::merger::{combined, MergeFs};

/// One file or directory record from deep enumeration.
///
/// Directory records carry a trailing `/` on `relative_path`, which keeps
/// a directory sorted immediately before its own children under ordinary
/// string comparison.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Final relative path, after rename and prefix transforms
    pub relative_path: String,
    /// Absolute path of the underlying file in the layer that supplied it
    pub source_path: PathBuf,
    /// Underlying metadata, passed through unchanged
    pub metadata: Metadata,
}

impl Entry {
    /// True if this entry is a directory
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir()
    }

    /// Size of the underlying file in bytes
    pub fn size(&self) -> u64 {
        self.metadata.len()
    }
}

/// Options for [`MergeFs::entries_with`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryOptions {
    /// Emit directory records as well as files (default true)
    pub directories: bool,
}

impl Default for EntryOptions {
    fn default() -> Self {
        EntryOptions { directories: true }
    }
}

impl MergeFs {
    /// Deep enumeration of `dir` across all layers with default options
    pub fn entries(&self, dir: &str) -> Result<Vec<Entry>> {
        self.entries_with(dir, &EntryOptions::default())
    }

    /// Deep enumeration of `dir` across all layers.
    ///
    /// Walks layers in registration order; a later layer's entry replaces an
    /// earlier one at the same final relative path. Results come back sorted
    /// by ascending ordinary string comparison of `relative_path`. When no
    /// layer has the directory, the bare path is walked directly so the
    /// native not-found error propagates; when at least one layer has it but
    /// all are empty, the result is an empty vec.
    pub fn entries_with(&self, dir: &str, options: &EntryOptions) -> Result<Vec<Entry>> {
        debug!("entries(dir={})", dir);
        let mut table: BTreeMap<String, Entry> = BTreeMap::new();
        let mut found = false;
        for layer in &self.layers {
            let base = combined(&layer.root, dir);
            if !base.exists() {
                continue;
            }
            found = true;
            for (mut relative, source_path, metadata) in walk_tree(&base, options)? {
                if let Some(rename) = &layer.rename {
                    relative = rename(&relative);
                }
                if let Some(prefix) = &layer.prefix {
                    relative = join_prefix(prefix, &relative);
                }
                table.insert(
                    relative.clone(),
                    Entry {
                        relative_path: relative,
                        source_path,
                        metadata,
                    },
                );
            }
        }
        if !found {
            // No layer supplies the directory: walk the bare path so the
            // caller sees the native error for it.
            let bare = PathBuf::from(dir.trim_end_matches('/'));
            for (relative, source_path, metadata) in walk_tree(&bare, options)? {
                table.insert(
                    relative.clone(),
                    Entry {
                        relative_path: relative,
                        source_path,
                        metadata,
                    },
                );
            }
        }
        Ok(table.into_values().collect())
    }
}

/// Recursive walk of one layer directory, producing layer-relative paths
/// with `/` separators and a trailing `/` on directories.
fn walk_tree(
    base: &Path,
    options: &EntryOptions,
) -> Result<Vec<(String, PathBuf, Metadata)>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(base).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(walkdir_io_error)?;
        let metadata = entry.metadata().map_err(walkdir_io_error)?;
        let relative = match entry.path().strip_prefix(base) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let mut relative: String = relative
            .iter()
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if metadata.is_dir() {
            if !options.directories {
                continue;
            }
            relative.push('/');
        }
        out.push((relative, entry.path().to_path_buf(), metadata));
    }
    Ok(out)
}

fn walkdir_io_error(err: walkdir::Error) -> io::Error {
    err.into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop during walk"))
}

/// Join a layer prefix onto an already-transformed relative path, keeping
/// the trailing `/` that marks directory entries.
fn join_prefix(prefix: &str, relative: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), relative)
}
