//! Sakhi Memory - Long-Term Fact Memory
//!
//! Fact extraction from user messages and semantic storage/retrieval,
//! partitioned hard by user. Extraction is quota-gated and best-effort;
//! storage attaches embeddings and answers top-k similarity queries.

pub mod extractor;
pub mod store;

pub use extractor::FactExtractor;
pub use store::{FactStore, InMemoryFactStore};
