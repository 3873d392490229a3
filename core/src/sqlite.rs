use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};

use crate::index::{term_frequency, DocTokens, QueryResult, TfIndex};

/// Rows buffered per upsert statement during bulk ingestion.
const BATCH_SIZE: usize = 1000;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS termFrequenciesIndex (
        filePath            TEXT    NOT NULL,
        token               TEXT    NOT NULL,
        frequency           INTEGER,
        docFrequency        INTEGER,
        totalDocuments      INTEGER,
        inverseDocFrequency REAL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS ux_filePath_token
        ON termFrequenciesIndex(filePath, token);
";

// The cast keeps the division floating-point; SQLite truncates
// INTEGER / INTEGER silently.
const REFRESH_STATS: &str = "
    WITH docFrequencyByToken AS (
        SELECT token, COUNT(DISTINCT filePath) AS docFrequency
        FROM termFrequenciesIndex
        GROUP BY token
    )
    UPDATE termFrequenciesIndex
    SET docFrequency = (
            SELECT docFrequency
            FROM docFrequencyByToken
            WHERE token = termFrequenciesIndex.token
        ),
        totalDocuments = (SELECT COUNT(DISTINCT filePath) FROM termFrequenciesIndex);

    UPDATE termFrequenciesIndex
    SET inverseDocFrequency = LN(CAST(totalDocuments AS REAL) / docFrequency);
";

/// TF-IDF index stored in a single SQLite table keyed by
/// `(filePath, token)`, with derived document-frequency statistics
/// refreshed at the end of every ingestion batch. The index can be updated
/// incrementally and queried without loading the postings into memory.
pub struct SqliteIndex {
    db_path: PathBuf,
    conn: Option<Connection>,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("db_path", &self.db_path)
            .field("conn", &self.conn.is_some())
            .finish()
    }
}

impl SqliteIndex {
    /// Does not touch the filesystem; the connection is opened on first use.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            conn: None,
        }
    }

    /// One logical handle, opened lazily and reused until [`Self::close`].
    fn connect(&mut self) -> Result<&mut Connection> {
        if self.conn.is_none() {
            let conn = Connection::open(&self.db_path).with_context(|| {
                format!("sqlite index: cannot open `{}`", self.db_path.display())
            })?;
            conn.create_scalar_function(
                "LN",
                1,
                FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
                |ctx| {
                    let value: f64 = ctx.get(0)?;
                    Ok(value.ln())
                },
            )
            .context("sqlite index: cannot register the LN function")?;
            self.conn = Some(conn);
        }
        Ok(self.conn.as_mut().expect("connection was just opened"))
    }

    pub fn close(mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, err)| err)
                .context("sqlite index: cannot close the database connection")?;
        }
        Ok(())
    }

    fn flush_batch(tx: &Transaction<'_>, rows: &mut Vec<(String, String, u64)>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["(?, ?, ?)"; rows.len()].join(", ");
        let statement = format!(
            "INSERT INTO termFrequenciesIndex (filePath, token, frequency) VALUES {placeholders}
             ON CONFLICT(filePath, token) DO UPDATE SET frequency = excluded.frequency"
        );
        let mut args = Vec::with_capacity(rows.len() * 3);
        for (file_path, token, frequency) in rows.drain(..) {
            args.push(Value::Text(file_path));
            args.push(Value::Text(token));
            args.push(Value::Integer(frequency as i64));
        }
        tx.execute(&statement, params_from_iter(args))
            .context("sqlite index: cannot execute the batch upsert")?;
        Ok(())
    }

    fn query_helper(
        &mut self,
        tokens: &[String],
        top_n: Option<usize>,
    ) -> Result<Vec<QueryResult>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let mut seen = HashSet::new();
        let mut args = Vec::new();
        for token in tokens {
            if seen.insert(token.as_str()) {
                args.push(token.as_str());
            }
        }
        let mut sql = format!(
            "SELECT filePath, SUM(frequency * inverseDocFrequency) AS tfidf
             FROM termFrequenciesIndex
             WHERE token IN (?{})
             GROUP BY filePath
             ORDER BY tfidf DESC, filePath ASC",
            ", ?".repeat(args.len() - 1)
        );
        if let Some(top_n) = top_n {
            sql.push_str(&format!(" LIMIT {top_n}"));
        }
        let conn = self.connect()?;
        // An index nothing was ever written to has no table yet; creating
        // it here lets the query answer empty instead of erroring.
        conn.execute_batch(CREATE_SCHEMA)
            .context("sqlite index: cannot create the termFrequenciesIndex table")?;
        let mut statement = conn
            .prepare(&sql)
            .with_context(|| format!("sqlite index: cannot prepare the ranking query `{sql}`"))?;
        let rows = statement
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(QueryResult {
                    doc_id: row.get(0)?,
                    score: row.get(1)?,
                })
            })
            .context("sqlite index: cannot run the ranking query")?;
        let mut results = Vec::new();
        for row in rows {
            let result = row.context("sqlite index: cannot decode a ranking row")?;
            // Ordering is descending, so once a zero score shows up every
            // remaining row is zero as well; dropping them after the LIMIT
            // cannot hide a positive hit.
            if result.score > 0.0 {
                results.push(result);
            }
        }
        Ok(results)
    }
}

impl TfIndex for SqliteIndex {
    fn bulk_update_chan(&mut self, docs: Receiver<DocTokens>) -> Result<()> {
        let conn = self.connect()?;
        let tx = conn
            .transaction()
            .context("sqlite index: cannot begin the ingestion transaction")?;
        tx.execute_batch(CREATE_SCHEMA)
            .context("sqlite index: cannot create the termFrequenciesIndex table")?;
        let mut rows: Vec<(String, String, u64)> = Vec::with_capacity(BATCH_SIZE);
        for doc in docs {
            // Re-ingesting a document replaces its postings wholesale;
            // stale (filePath, token) rows must not survive.
            tx.execute(
                "DELETE FROM termFrequenciesIndex WHERE filePath = ?1",
                [&doc.doc_id],
            )
            .with_context(|| {
                format!("sqlite index: cannot clear prior postings for `{}`", doc.doc_id)
            })?;
            for (token, frequency) in term_frequency(&doc.tokens) {
                rows.push((doc.doc_id.clone(), token, frequency));
                if rows.len() == BATCH_SIZE {
                    Self::flush_batch(&tx, &mut rows)?;
                }
            }
        }
        Self::flush_batch(&tx, &mut rows)?;
        tx.execute_batch(REFRESH_STATS)
            .context("sqlite index: cannot refresh the document frequency statistics")?;
        tx.commit()
            .context("sqlite index: cannot commit the ingestion transaction")?;
        Ok(())
    }

    fn query(&mut self, tokens: &[String]) -> Result<Vec<QueryResult>> {
        self.query_helper(tokens, None)
    }

    fn query_top_n(&mut self, tokens: &[String], top_n: usize) -> Result<Vec<QueryResult>> {
        self.query_helper(tokens, Some(top_n))
    }
}
