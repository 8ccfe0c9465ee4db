// Database module
// Text records live in a relational store, their embeddings in a usearch index file

pub mod index;
pub mod store;

pub use index::{Neighbor, VectorIndex};
pub use store::{TEXT_TABLE, TextRecord, TextStore};
