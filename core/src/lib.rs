//! quarry-core -- the indexing and ranking engine behind quarry, a local
//! TF-IDF full-text search tool.
//!
//! A directory of documents is walked, text is extracted per file format,
//! tokenized (lowercased, stopword-filtered, stemmed and expanded with
//! character n-grams), and streamed into one of two [`TfIndex`] backends:
//!
//! - [`MemoryIndex`], a nested `docId -> token -> frequency` map persisted
//!   as a single JSON object, computing document frequencies on demand;
//! - [`SqliteIndex`], a single-table SQLite index updated with batched
//!   transactional upserts and queried with one aggregated statement, so
//!   the postings never need to be loaded into memory.
//!
//! Both backends score a document as the sum of `tf * ln(totalDocs / df)`
//! over the distinct query tokens and return hits in descending score
//! order, omitting zero scores.

pub mod extract;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod sqlite;
pub mod tokenizer;

pub use index::{
    open_index, term_frequency, DocTokens, QueryResult, TfIndex, UnsupportedIndexExtension,
};
pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;
