//! Reverse lookup from an absolute path to the layer that owns it

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::merger::MergeFs;

/// An absolute path mapped back onto the layer that contains it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path relative to the owning layer's root
    pub relative_path: PathBuf,
    /// Registration index of the owning layer
    pub layer_index: usize,
}

impl MergeFs {
    /// Map an absolute path back to an owning layer and layer-relative path.
    ///
    /// Layers are scanned in registration order and the first containing
    /// root wins; this answers "who owns this path", the opposite direction
    /// from read precedence. Matching is directory-boundary aware, so a root
    /// `dir/a` never matches `dir/ab/...`. The target is not required to
    /// exist. Returns `Ok(None)` when no layer contains the path.
    pub fn locate(&self, path: &Path) -> Result<Option<Location>> {
        debug!("locate(path={})", path.display());
        if !path.is_absolute() {
            return Err(Error::InvalidArgument(format!(
                "locate expects an absolute path, got {}",
                path.display()
            )));
        }
        for (layer_index, layer) in self.layers.iter().enumerate() {
            // Roots registered as relative paths are owned relative to the
            // current working directory.
            let root = if layer.root().is_absolute() {
                layer.root().to_path_buf()
            } else {
                std::env::current_dir()?.join(layer.root())
            };
            if let Ok(relative) = path.strip_prefix(&root) {
                return Ok(Some(Location {
                    relative_path: relative.to_path_buf(),
                    layer_index,
                }));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn relative_input_is_rejected() {
        let merger = MergeFs::new(Vec::<crate::layer::LayerSpec>::new()).unwrap();
        let err = merger.locate(Path::new("some/relative")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn first_containing_layer_wins() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        let b = dir.path().join("B");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        let merger = MergeFs::new([a.clone(), b.clone()]).unwrap();

        let hit = merger.locate(&a.join("x/y.txt")).unwrap().unwrap();
        assert_eq!(hit.layer_index, 0);
        assert_eq!(hit.relative_path, PathBuf::from("x/y.txt"));

        let hit = merger.locate(&b.join("z.txt")).unwrap().unwrap();
        assert_eq!(hit.layer_index, 1);
    }

    #[test]
    fn matching_respects_directory_boundaries() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("dir/a");
        fs::create_dir_all(&a).unwrap();
        let merger = MergeFs::new([a]).unwrap();
        let sibling = dir.path().join("dir/ab/file.txt");
        assert!(merger.locate(&sibling).unwrap().is_none());
    }

    #[test]
    fn target_need_not_exist() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        fs::create_dir_all(&a).unwrap();
        let merger = MergeFs::new([a.clone()]).unwrap();
        assert!(merger.locate(&a.join("ghost.txt")).unwrap().is_some());
    }

    #[test]
    fn unowned_path_returns_none() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        fs::create_dir_all(&a).unwrap();
        let merger = MergeFs::new([a]).unwrap();
        assert!(merger.locate(Path::new("/definitely/elsewhere")).unwrap().is_none());
    }

    #[test]
    fn locate_then_at_reproduces_the_read() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        let b = dir.path().join("B");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("a.txt"), "1").unwrap();
        fs::write(b.join("a.txt"), "2").unwrap();
        let merger = MergeFs::new([a, b]).unwrap();

        let resolved = merger.resolve("a.txt");
        let location = merger.locate(&resolved).unwrap().unwrap();
        let scoped = merger.at(location.layer_index).unwrap();
        let via_locate = scoped
            .read_file_utf8(location.relative_path.to_str().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(via_locate, merger.read_file_utf8("a.txt").unwrap().unwrap());
    }
}
