use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::memory::MemoryIndex;
use crate::sqlite::SqliteIndex;

/// A single ranked hit: the document id and its summed TF-IDF score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub score: f64,
}

/// One document's worth of tokenized text, handed from the ingestion
/// pipeline to an index backend.
#[derive(Debug, Clone)]
pub struct DocTokens {
    pub doc_id: String,
    pub tokens: Vec<String>,
}

/// Collapse a token sequence into per-token occurrence counts.
pub fn term_frequency(tokens: &[String]) -> HashMap<String, u64> {
    let mut frequencies = HashMap::new();
    for token in tokens {
        *frequencies.entry(token.clone()).or_insert(0) += 1;
    }
    frequencies
}

/// The capability set every index backend exposes.
///
/// `update` and `bulk_update` are provided in terms of `bulk_update_chan`,
/// so a backend only has to implement the streaming path; backends with a
/// cheaper direct route override them. Query methods take `&mut self`
/// because the SQLite backend opens its connection lazily.
pub trait TfIndex: Send + fmt::Debug {
    /// Index a single document. Equivalent to a one-entry `bulk_update`.
    fn update(&mut self, doc_id: &str, tokens: Vec<String>) -> Result<()> {
        self.bulk_update(HashMap::from([(doc_id.to_string(), tokens)]))
    }

    /// Index the given documents as one batch.
    fn bulk_update(&mut self, docs: HashMap<String, Vec<String>>) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        for (doc_id, tokens) in docs {
            tx.send(DocTokens { doc_id, tokens })
                .map_err(|_| anyhow!("bulk update: the document stream closed early"))?;
        }
        drop(tx);
        self.bulk_update_chan(rx)
    }

    /// Consume a finite stream of documents and commit them as one batch.
    /// On any error the backend leaves its state as if the whole batch had
    /// never been applied.
    fn bulk_update_chan(&mut self, docs: Receiver<DocTokens>) -> Result<()>;

    /// Every document with a strictly positive summed TF-IDF score over
    /// the distinct query tokens, sorted by score descending.
    fn query(&mut self, tokens: &[String]) -> Result<Vec<QueryResult>>;

    /// As `query`, truncated to the first `top_n` results.
    fn query_top_n(&mut self, tokens: &[String], top_n: usize) -> Result<Vec<QueryResult>>;
}

/// An index-file path whose extension names no known backend. This is a
/// configuration failure: the CLI recognizes the type and prints usage
/// before exiting non-zero.
#[derive(Debug)]
pub struct UnsupportedIndexExtension {
    path: PathBuf,
}

impl UnsupportedIndexExtension {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for UnsupportedIndexExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported index file `{}`: expected a .db or .json extension",
            self.path.display()
        )
    }
}

impl std::error::Error for UnsupportedIndexExtension {}

/// Open an existing index, picking the backend from the file extension:
/// `.db` is the SQLite index, `.json` the in-memory index dump.
pub fn open_index(path: &Path) -> Result<Box<dyn TfIndex>> {
    if !path.is_file() {
        bail!("index file `{}` does not exist", path.display());
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("db") => Ok(Box::new(SqliteIndex::new(path))),
        Some("json") => Ok(Box::new(MemoryIndex::load(path)?)),
        _ => Err(UnsupportedIndexExtension::new(path).into()),
    }
}
