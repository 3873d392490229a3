use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::extract;
use crate::index::{DocTokens, TfIndex};
use crate::tokenizer::tokenize;

/// Capacity of the bounded hand-off channels between the pipeline stages.
/// Ingestion memory stays bounded by this many in-flight documents.
pub const FILE_BUFFER_SIZE: usize = 100;

/// One extracted file on its way to the tokenizer: the text, or whatever
/// kept it from being read.
struct FileText {
    path: PathBuf,
    text: Result<String>,
}

/// The regular files under `dir`, as canonical absolute paths. Walk
/// failures are fatal; per-file problems surface later, inside the
/// pipeline.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry
            .with_context(|| format!("ingest: cannot walk the directory `{}`", dir.display()))?;
        if entry.file_type().is_file() {
            let path = entry.path().canonicalize().with_context(|| {
                format!("ingest: cannot resolve the path `{}`", entry.path().display())
            })?;
            files.push(path);
        }
    }
    Ok(files)
}

/// Walk `dir`, extract text from every regular file on parallel workers,
/// tokenize, and stream the documents into `index` as one bulk update.
/// Unreadable files are logged and skipped; the batch commits only after
/// the last document has been consumed. Returns how many documents were
/// handed to the backend.
pub fn ingest_directory(index: &mut dyn TfIndex, dir: &Path) -> Result<usize> {
    let files = list_files(dir)?;
    tracing::info!(files = files.len(), dir = %dir.display(), "starting ingestion");

    let workers = thread::available_parallelism().map(usize::from).unwrap_or(4);
    let pending = Mutex::new(files.into_iter());
    let indexed = AtomicUsize::new(0);
    let (file_tx, file_rx) = mpsc::sync_channel::<FileText>(FILE_BUFFER_SIZE);
    let (doc_tx, doc_rx) = mpsc::sync_channel::<DocTokens>(FILE_BUFFER_SIZE);

    let result = thread::scope(|scope| {
        for _ in 0..workers {
            let file_tx = file_tx.clone();
            let pending = &pending;
            scope.spawn(move || loop {
                let Some(path) = pending.lock().next() else { break };
                let text = extract::from_path(&path);
                if file_tx.send(FileText { path, text }).is_err() {
                    // The consumer went away; stop producing.
                    break;
                }
            });
        }
        drop(file_tx);

        let indexed = &indexed;
        scope.spawn(move || {
            for file in file_rx {
                match file.text {
                    Ok(text) => {
                        let doc_id = file.path.to_string_lossy().into_owned();
                        let tokens = tokenize(&text);
                        if doc_tx.send(DocTokens { doc_id, tokens }).is_err() {
                            break;
                        }
                        indexed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(error) => {
                        tracing::warn!(path = %file.path.display(), %error, "skipping document");
                    }
                }
            }
        });

        index.bulk_update_chan(doc_rx)
    });
    result?;

    let count = indexed.load(Ordering::Relaxed);
    tracing::info!(documents = count, "ingestion finished");
    Ok(count)
}
