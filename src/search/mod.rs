//! Message selection: fallback pattern search and recency ranking.

pub mod rank;
pub mod resolver;

pub use rank::rank_by_recency;
pub use resolver::{resolve, Resolution};
