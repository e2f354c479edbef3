//! Virtual path handling: segment encoding and resolution.

pub mod resolver;
pub mod segment;

pub use resolver::{PathResolver, Resolution, MAX_ANCESTOR_DEPTH, ROOT_LABEL};
pub use segment::{encode_segment, parse_path, parse_segment, PathSegment};
