// Capability-relative path handling.

pub mod normalize;

pub use normalize::{normalize_path, split_parent, split_segments, PathError};
