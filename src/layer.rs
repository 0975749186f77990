//! Layer descriptors and the normalized layer record
//!
//! A layer is one physical directory contributing to the merged view,
//! optionally carrying a prefix and a rename transform that rewrite the
//! relative paths it emits during deep enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Pure relative-path rewrite applied to a layer's enumerated entries.
///
/// The function receives a layer-relative path (directories carry a trailing
/// `/`) and must return a relative path, preserving separators.
pub type RenameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Collaborator that resolves an opaque external node to its output directory.
///
/// Build pipelines often describe inputs as graph nodes rather than plain
/// paths; the merged view treats those as black boxes and only asks where
/// their output lives.
pub trait NodeRoot: Send + Sync {
    /// Resolve this node to the directory that holds its output.
    fn resolve_root(&self) -> Result<PathBuf>;
}

/// Explicit layer descriptor: root plus optional path transforms.
///
/// `root` and `prefix` round-trip through serde so layer lists can live in
/// pipeline config files; `rename` is a function and is skipped.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Directory supplying this layer's content
    pub root: PathBuf,

    /// Prepended to every relative path this layer emits from `entries`
    #[serde(default)]
    pub prefix: Option<String>,

    /// Rewrites every relative path this layer emits from `entries`
    #[serde(skip)]
    pub rename: Option<RenameFn>,
}

impl fmt::Debug for LayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerConfig")
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .field("rename", &self.rename.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// One layer descriptor, in any of the three accepted shapes
pub enum LayerSpec {
    /// Bare directory path
    Root(PathBuf),
    /// Explicit `{root, prefix?, rename?}` record
    Config(LayerConfig),
    /// Opaque external node resolved through [`NodeRoot`]
    Node(Box<dyn NodeRoot>),
}

impl LayerSpec {
    /// Normalize this descriptor into a [`Layer`] record.
    ///
    /// Fails with [`Error::InvalidLayer`] when the resolved root is empty.
    pub(crate) fn into_layer(self) -> Result<Layer> {
        let (root, prefix, rename) = match self {
            LayerSpec::Root(root) => (root, None, None),
            LayerSpec::Config(config) => (config.root, config.prefix, config.rename),
            LayerSpec::Node(node) => (node.resolve_root()?, None, None),
        };
        let root = normalize(&root);
        if root.as_os_str().is_empty() {
            return Err(Error::InvalidLayer(
                "layer root resolved to an empty path".to_string(),
            ));
        }
        let prefix = prefix.filter(|p| !p.is_empty());
        Ok(Layer {
            root,
            prefix,
            rename,
        })
    }
}

impl From<&str> for LayerSpec {
    fn from(root: &str) -> Self {
        LayerSpec::Root(PathBuf::from(root))
    }
}

impl From<String> for LayerSpec {
    fn from(root: String) -> Self {
        LayerSpec::Root(PathBuf::from(root))
    }
}

impl From<PathBuf> for LayerSpec {
    fn from(root: PathBuf) -> Self {
        LayerSpec::Root(root)
    }
}

impl From<&Path> for LayerSpec {
    fn from(root: &Path) -> Self {
        LayerSpec::Root(root.to_path_buf())
    }
}

impl From<LayerConfig> for LayerSpec {
    fn from(config: LayerConfig) -> Self {
        LayerSpec::Config(config)
    }
}

impl From<Box<dyn NodeRoot>> for LayerSpec {
    fn from(node: Box<dyn NodeRoot>) -> Self {
        LayerSpec::Node(node)
    }
}

/// Normalized, immutable layer record
#[derive(Clone)]
pub struct Layer {
    /// Normalized root directory
    pub(crate) root: PathBuf,
    /// Optional prefix joined onto enumerated relative paths
    pub(crate) prefix: Option<String>,
    /// Optional rename transform applied to enumerated relative paths
    pub(crate) rename: Option<RenameFn>,
}

impl Layer {
    /// The layer's normalized root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The layer's prefix, if any
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The layer's rename transform, if any
    pub fn rename(&self) -> Option<&RenameFn> {
        self.rename.as_ref()
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .field("rename", &self.rename.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Lexically normalize a path: strip `.` components and fold `..` onto a
/// preceding normal component. No filesystem access.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_curdir_and_folds_parent() {
        assert_eq!(normalize(Path::new("a/./b")), PathBuf::from("a/b"));
        assert_eq!(normalize(Path::new("a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize(Path::new("/x/./y")), PathBuf::from("/x/y"));
    }

    #[test]
    fn bare_path_descriptor() {
        let layer = LayerSpec::from("fixtures/base").into_layer().unwrap();
        assert_eq!(layer.root(), Path::new("fixtures/base"));
        assert!(layer.prefix().is_none());
        assert!(layer.rename().is_none());
    }

    #[test]
    fn config_descriptor_keeps_prefix_and_rename() {
        let spec = LayerSpec::Config(LayerConfig {
            root: PathBuf::from("fixtures/addon/"),
            prefix: Some("addon".to_string()),
            rename: Some(Arc::new(|rel| rel.replace("src/", "lib/"))),
        });
        let layer = spec.into_layer().unwrap();
        assert_eq!(layer.root(), Path::new("fixtures/addon"));
        assert_eq!(layer.prefix(), Some("addon"));
        let rename = layer.rename().unwrap();
        assert_eq!(rename("src/index.js"), "lib/index.js");
    }

    #[test]
    fn empty_prefix_is_dropped() {
        let spec = LayerSpec::Config(LayerConfig {
            root: PathBuf::from("fixtures/base"),
            prefix: Some(String::new()),
            rename: None,
        });
        assert!(spec.into_layer().unwrap().prefix().is_none());
    }

    #[test]
    fn empty_root_is_rejected() {
        let err = LayerSpec::from("").into_layer().unwrap_err();
        assert!(matches!(err, Error::InvalidLayer(_)));
    }

    #[test]
    fn node_descriptor_resolves_through_collaborator() {
        struct FakeNode(PathBuf);
        impl NodeRoot for FakeNode {
            fn resolve_root(&self) -> Result<PathBuf> {
                Ok(self.0.clone())
            }
        }
        let node: Box<dyn NodeRoot> = Box::new(FakeNode(PathBuf::from("out/tree")));
        let layer = LayerSpec::from(node).into_layer().unwrap();
        assert_eq!(layer.root(), Path::new("out/tree"));
    }

    #[test]
    fn failing_node_surfaces_invalid_layer() {
        struct BrokenNode;
        impl NodeRoot for BrokenNode {
            fn resolve_root(&self) -> Result<PathBuf> {
                Err(Error::InvalidLayer("node has no output directory".into()))
            }
        }
        let node: Box<dyn NodeRoot> = Box::new(BrokenNode);
        assert!(LayerSpec::from(node).into_layer().is_err());
    }

    #[test]
    fn layer_config_parses_from_json() {
        let configs: Vec<LayerConfig> =
            serde_json::from_str(r#"[{"root": "base"}, {"root": "addon", "prefix": "addon"}]"#)
                .unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].prefix.as_deref(), Some("addon"));
        assert!(configs[1].rename.is_none());
    }
}
