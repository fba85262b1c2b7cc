//! Writing retrieved data to disk.

pub mod attachment;
