//! Merged read view over an ordered list of layers
//!
//! Later-registered layers win single-file lookups; directory listings are
//! the deduplicated union across all layers. Nothing is cached: every call
//! re-reads the underlying filesystem, so results always reflect current
//! on-disk state.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::layer::{normalize, Layer, LayerSpec, RenameFn};

/// Process-wide empty scratch directory.
///
/// Lookups that miss every layer resolve into this directory so the
/// downstream read fails with the native not-found error instead of a
/// bespoke one. Created once, reused, never deleted while the process runs.
static SCRATCH_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let dir = std::env::temp_dir().join(format!("mergefs-empty-{}", std::process::id()));
    // If creation fails the joined paths still point at nothing, which is
    // exactly the not-found behavior callers rely on.
    let _ = fs::create_dir_all(&dir);
    dir
});

/// Where a relative path would materialize, and with which transforms
pub struct FileMeta {
    /// Full path under the owning layer's root
    pub path: PathBuf,
    /// The owning layer's prefix
    pub prefix: Option<String>,
    /// The owning layer's rename transform
    pub rename: Option<RenameFn>,
}

impl fmt::Debug for FileMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileMeta")
            .field("path", &self.path)
            .field("prefix", &self.prefix)
            .field("rename", &self.rename.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Read-only merged view over an ordered set of directory layers
pub struct MergeFs {
    /// Layers in registration order
    pub(crate) layers: Vec<Layer>,
    /// Normalized root -> registration index, for exact-root meta lookups
    pub(crate) by_root: HashMap<PathBuf, usize>,
}

impl MergeFs {
    /// Build a merged view from one or more layer descriptors.
    ///
    /// The registry is built eagerly here; layers are immutable afterwards,
    /// so the view is freely shareable for reads.
    pub fn new<I>(specs: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<LayerSpec>,
    {
        let layers = specs
            .into_iter()
            .map(|spec| spec.into().into_layer())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_layers(layers))
    }

    /// Build a merged view over a single layer descriptor
    pub fn single(spec: impl Into<LayerSpec>) -> Result<Self> {
        Self::new([spec.into()])
    }

    pub(crate) fn from_layers(layers: Vec<Layer>) -> Self {
        let by_root = layers
            .iter()
            .enumerate()
            .map(|(index, layer)| (layer.root.clone(), index))
            .collect();
        MergeFs { layers, by_root }
    }

    /// Layers in registration order
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// A merged view scoped to the single layer at `index`
    pub fn at(&self, index: usize) -> Result<MergeFs> {
        let layer = self.layers.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "layer index {index} out of range ({} layers)",
                self.layers.len()
            ))
        })?;
        Ok(MergeFs::from_layers(vec![layer.clone()]))
    }

    /// Resolve a relative path to the highest-precedence existing candidate.
    ///
    /// Scans layers from last-registered to first and returns the first
    /// `root/relative` that exists. When no layer has the path, returns a
    /// path inside the process-wide empty scratch directory so the caller's
    /// read fails with the native not-found error.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        for layer in self.layers.iter().rev() {
            let candidate = combined(&layer.root, relative);
            if candidate.exists() {
                return candidate;
            }
        }
        combined(scratch_dir(), relative)
    }

    /// Read a single file, last-registered layer winning.
    ///
    /// Returns `Ok(None)` when the path exists in no layer. Read failures
    /// from the layer that supplies the file propagate verbatim.
    pub fn read_file(&self, relative: &str) -> Result<Option<Vec<u8>>> {
        debug!("read_file(path={})", relative);
        for layer in self.layers.iter().rev() {
            let candidate = combined(&layer.root, relative);
            if candidate.exists() {
                return Ok(Some(fs::read(&candidate)?));
            }
        }
        Ok(None)
    }

    /// [`read_file`](Self::read_file) decoded as UTF-8
    pub fn read_file_utf8(&self, relative: &str) -> Result<Option<String>> {
        debug!("read_file_utf8(path={})", relative);
        for layer in self.layers.iter().rev() {
            let candidate = combined(&layer.root, relative);
            if candidate.exists() {
                return Ok(Some(fs::read_to_string(&candidate)?));
            }
        }
        Ok(None)
    }

    /// Where `relative` lives, or would live, and with which transforms.
    ///
    /// When `base_path` exactly matches a registered root the answer is
    /// pinned to that layer even if the file does not exist there yet; this
    /// backs "where should a new file be written" queries. Otherwise scans
    /// last-registered to first for an existing candidate.
    pub fn read_file_meta(&self, relative: &str, base_path: Option<&Path>) -> Option<FileMeta> {
        let base = base_path.map(normalize);
        if let Some(base) = &base {
            if let Some(&index) = self.by_root.get(base) {
                let layer = &self.layers[index];
                return Some(FileMeta {
                    path: layer.root.join(relative),
                    prefix: layer.prefix.clone(),
                    rename: layer.rename.clone(),
                });
            }
        }
        for layer in self.layers.iter().rev() {
            let full = layer.root.join(relative);
            let pinned = base.as_deref() == Some(layer.root.as_path());
            if pinned || full.exists() {
                return Some(FileMeta {
                    path: full,
                    prefix: layer.prefix.clone(),
                    rename: layer.rename.clone(),
                });
            }
        }
        None
    }

    /// Union of direct child names of `dir` across all layers, deduplicated.
    ///
    /// Order is stable per call (registration order, then layer listing
    /// order) but otherwise unspecified. When the directory exists in no
    /// layer, the native read of the last combined path supplies the error;
    /// when it exists but is empty everywhere, the result is an empty vec.
    pub fn read_dir_names(&self, dir: &str) -> Result<Vec<String>> {
        debug!("read_dir_names(dir={})", dir);
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut missing = 0;
        let mut last = PathBuf::new();
        for layer in &self.layers {
            let full = combined(&layer.root, dir);
            if full.exists() {
                for entry in fs::read_dir(&full)? {
                    let name = entry?.file_name().to_string_lossy().into_owned();
                    if seen.insert(name.clone()) {
                        names.push(name);
                    }
                }
            } else {
                missing += 1;
            }
            last = full;
        }
        if missing == self.layers.len() {
            // Reproduce the native error (not-found, or whatever the
            // filesystem reports) for a directory no layer supplies.
            fs::read_dir(&last)?;
        }
        Ok(names)
    }

    /// Asynchronous [`read_dir_names`](Self::read_dir_names).
    ///
    /// Per-layer reads are issued concurrently. The aggregate completes
    /// exactly once: after every layer read succeeds, or on the first
    /// failure. First error wins; results from already-finished layers are
    /// discarded and the remaining reads are dropped.
    pub async fn read_dir_names_async(&self, dir: &str) -> Result<Vec<String>> {
        debug!("read_dir_names_async(dir={})", dir);
        let mut existing = Vec::new();
        let mut last = PathBuf::new();
        for layer in &self.layers {
            let full = combined(&layer.root, dir);
            if full.exists() {
                existing.push(full.clone());
            }
            last = full;
        }
        if existing.is_empty() {
            // Delegate to the native read of the last combined path. Usually
            // this reproduces the native error; if the directory appeared
            // between the existence scan and this read, pass its listing on.
            return Ok(read_dir_names_native(&last).await?);
        }
        let reads = existing
            .into_iter()
            .map(|path| async move { read_dir_names_native(&path).await });
        let per_layer = futures::future::try_join_all(reads).await?;
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        for list in per_layer {
            for name in list {
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }
}

impl fmt::Debug for MergeFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeFs").field("layers", &self.layers).finish()
    }
}

/// Drain one directory's child names through the async native primitive
async fn read_dir_names_native(path: &Path) -> std::io::Result<Vec<String>> {
    let mut reader = tokio::fs::read_dir(path).await?;
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// The process-wide empty scratch directory
pub(crate) fn scratch_dir() -> &'static Path {
    SCRATCH_DIR.as_path()
}

/// Join a caller-supplied relative path onto a layer root.
///
/// Accepts `""`, `"."`, `"/"` and trailing-slash forms as the layer root
/// itself, mirroring how callers address the merged root.
pub(crate) fn combined(root: &Path, relative: &str) -> PathBuf {
    let trimmed = relative.trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        root.to_path_buf()
    } else {
        root.join(trimmed)
    }
}
