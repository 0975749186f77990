//! mergefs - a read-only merged view over an ordered set of directory layers
//!
//! Build pipelines compose override/base directory trees without copying or
//! symlinking: callers address files by relative path and the merged view
//! decides which physical layer supplies the content. Later-registered
//! layers win single-file lookups; directory listings union across layers;
//! deep enumeration rewrites paths through per-layer prefix/rename
//! transforms. The guarded facade constrains access to a read-only
//! allow-list of filesystem primitives.

pub mod error;
pub mod guard;
pub mod layer;
pub mod locate;
pub mod merger;
pub mod walk;

pub use error::{Error, Result};
pub use guard::{GuardedFs, ALLOWED_OPERATIONS};
pub use layer::{Layer, LayerConfig, LayerSpec, NodeRoot, RenameFn};
pub use locate::Location;
pub use merger::{FileMeta, MergeFs};
pub use walk::{Entry, EntryOptions};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::layer::{LayerConfig, LayerSpec};
    pub use crate::merger::MergeFs;
    pub use crate::walk::Entry;
}
