//! Message body handling: part-tree traversal and payload transfer encoding.

pub mod encoding;
pub mod parts;
