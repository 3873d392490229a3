use std::fs;
use std::panic;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Extract indexable text from a file, dispatched on its lowercased
/// extension: markup formats are stripped to their character data, PDFs go
/// through the PDF library, everything else is read as UTF-8 text.
pub fn from_path(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "xhtml" | "html" | "xml" | "svg" => read_markup(path),
        "pdf" => match read_pdf(path) {
            Some(text) => Ok(text),
            None => {
                tracing::info!(
                    path = %path.display(),
                    "pdf extraction failed, reading the file as plain text"
                );
                read_text(path)
            }
        },
        _ => read_text(path),
    }
}

/// Streams the document and collects only the character data between
/// markup, separated by single spaces.
fn read_markup(path: &Path) -> Result<String> {
    let mut reader = Reader::from_file(path)
        .with_context(|| format!("markup extraction: cannot open `{}`", path.display()))?;
    let config = reader.config_mut();
    config.check_end_names = false;
    config.trim_text_start = true;
    config.trim_text_end = true;

    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(data)) => {
                let chunk = data.unescape().with_context(|| {
                    format!("markup extraction: bad character data in `{}`", path.display())
                })?;
                if !chunk.is_empty() {
                    text.push_str(&chunk);
                    text.push(' ');
                }
            }
            Ok(Event::CData(data)) => {
                text.push_str(&String::from_utf8_lossy(&data));
                text.push(' ');
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("markup extraction: cannot parse `{}`", path.display())
                })
            }
        }
        buf.clear();
    }
    Ok(text)
}

/// `None` signals a soft failure: the library rejected the file or
/// panicked. Panics are contained here so a single bad PDF cannot take the
/// whole ingestion down.
fn read_pdf(path: &Path) -> Option<String> {
    match panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(Ok(text)) => Some(text),
        Ok(Err(error)) => {
            tracing::warn!(path = %path.display(), %error, "pdf extraction error");
            None
        }
        Err(_) => {
            tracing::warn!(path = %path.display(), "pdf extraction panicked");
            None
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .with_context(|| format!("text extraction: cannot read `{}`", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
