//! Deep tree utilities
//!
//! Generic recursive operations over nested mapping/sequence structures.
//! Declarations are trees of [`Tree`] nodes; stored documents are
//! `serde_json::Value`s addressed with the same dotted paths.
//!
//! # Design Principles
//!
//! - Pure functions, no model knowledge
//! - Declaration order is preserved (ordered maps)
//! - Opaque values (bytes, timestamps, patterns) are copied whole
//! - Deep clone is `Clone`

mod node;
mod ops;
mod path;

pub use node::Tree;
pub use ops::{
    any_node, deep_map_keys, deep_map_values, deep_merge, deep_traverse, extend_with_context,
    get_path, retain_keys_deep,
};
pub use path::{join_path, json_get, json_get_mut, json_remove, json_set, Segment, TreePath};
