use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::mpsc::Receiver;

use anyhow::{Context, Result};

use crate::index::{term_frequency, DocTokens, QueryResult, TfIndex};

/// In-memory TF-IDF index: `docId -> token -> frequency`.
///
/// Document frequencies and IDF are computed on demand from the live map,
/// so nothing derived is stored. The whole map round-trips through a JSON
/// object of objects via [`MemoryIndex::dump`] and [`MemoryIndex::load`].
#[derive(Debug, Default)]
pub struct MemoryIndex {
    index: HashMap<String, HashMap<String, u64>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an index previously written by [`MemoryIndex::dump`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("memory index: cannot read `{}`", path.display()))?;
        let index = serde_json::from_slice(&bytes).with_context(|| {
            format!("memory index: `{}` is not a valid index dump", path.display())
        })?;
        Ok(Self { index })
    }

    /// Write the nested map as a single JSON object: document ids map to
    /// objects from token to frequency, nothing else.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let bytes =
            serde_json::to_vec(&self.index).context("memory index: cannot serialize the index")?;
        fs::write(path, bytes)
            .with_context(|| format!("memory index: cannot write `{}`", path.display()))?;
        Ok(())
    }

    fn document_frequency(&self, token: &str) -> usize {
        self.index
            .values()
            .filter(|frequencies| frequencies.contains_key(token))
            .count()
    }
}

impl TfIndex for MemoryIndex {
    /// Replaces the document's posting map wholesale: tokens from an
    /// earlier ingestion of the same document do not survive.
    fn update(&mut self, doc_id: &str, tokens: Vec<String>) -> Result<()> {
        self.index.insert(doc_id.to_string(), term_frequency(&tokens));
        Ok(())
    }

    fn bulk_update(&mut self, docs: HashMap<String, Vec<String>>) -> Result<()> {
        for (doc_id, tokens) in docs {
            self.update(&doc_id, tokens)?;
        }
        Ok(())
    }

    fn bulk_update_chan(&mut self, docs: Receiver<DocTokens>) -> Result<()> {
        for doc in docs {
            self.update(&doc.doc_id, doc.tokens)?;
        }
        Ok(())
    }

    fn query(&mut self, tokens: &[String]) -> Result<Vec<QueryResult>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let total_documents = self.index.len();
        // Tokens appearing in no document contribute nothing; leaving them
        // out also keeps ln(n/0) from ever being evaluated.
        let mut idfs: HashMap<&str, f64> = HashMap::new();
        for token in tokens {
            if idfs.contains_key(token.as_str()) {
                continue;
            }
            let document_frequency = self.document_frequency(token);
            if document_frequency > 0 {
                let idf = (total_documents as f64 / document_frequency as f64).ln();
                idfs.insert(token, idf);
            }
        }
        let mut results = Vec::new();
        for (doc_id, frequencies) in &self.index {
            let score: f64 = idfs
                .iter()
                .map(|(token, idf)| {
                    frequencies.get(*token).copied().unwrap_or(0) as f64 * idf
                })
                .sum();
            if score > 0.0 {
                results.push(QueryResult {
                    doc_id: doc_id.clone(),
                    score,
                });
            }
        }
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        Ok(results)
    }

    fn query_top_n(&mut self, tokens: &[String], top_n: usize) -> Result<Vec<QueryResult>> {
        let mut results = self.query(tokens)?;
        results.truncate(top_n);
        Ok(results)
    }
}
