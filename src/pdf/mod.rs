//! Best-effort PDF text extraction. Strategies are tried in order until one
//! succeeds; the final placeholder strategy cannot fail, so extraction never
//! raises to the caller.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config;

const PDF_SIGNATURE: &[u8] = b"%PDF-";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PdfValidationError {
    #[error("Empty document")]
    Empty,

    #[error("Document too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("Not a PDF document")]
    BadSignature,
}

/// Pre-extraction validation: size and signature checks only, no parsing.
pub fn validate(buffer: &[u8]) -> Result<(), PdfValidationError> {
    if buffer.is_empty() {
        return Err(PdfValidationError::Empty);
    }

    let limit = config::config().extraction.max_pdf_bytes;
    if buffer.len() > limit {
        return Err(PdfValidationError::TooLarge {
            size: buffer.len(),
            limit,
        });
    }

    if !buffer.starts_with(PDF_SIGNATURE) {
        return Err(PdfValidationError::BadSignature);
    }

    Ok(())
}

/// Why a single strategy was rejected. Internal: strategy failures are
/// logged and swallowed, never surfaced to callers.
#[derive(Debug, Error)]
enum ExtractFailure {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("failed to spawn extractor: {0}")]
    Spawn(String),

    #[error("extractor exceeded time limit")]
    Timeout,

    #[error("extractor exited with status {0:?}")]
    NonZeroExit(Option<i32>),

    #[error("extractor produced no output file")]
    MissingOutput,

    #[error("extracted text too short ({0} chars)")]
    TooShort(usize),
}

/// Extract plain text from a PDF buffer. Never fails: a scanned or broken
/// document degrades to a descriptive placeholder.
pub async fn extract_text(buffer: &[u8]) -> String {
    match extract_with_library(buffer) {
        Ok(text) => return text,
        Err(reason) => {
            tracing::debug!("in-process extraction failed: {}", reason);
        }
    }

    match extract_with_pdftotext(buffer).await {
        Ok(text) => return text,
        Err(reason) => {
            tracing::debug!("pdftotext extraction failed: {}", reason);
        }
    }

    fallback_placeholder(buffer)
}

/// Strategy 1: parse in-process with lopdf. Text shorter than the minimum
/// is treated as failure (likely a scanned or image-only document).
fn extract_with_library(buffer: &[u8]) -> Result<String, ExtractFailure> {
    let document =
        lopdf::Document::load_mem(buffer).map_err(|e| ExtractFailure::Parse(e.to_string()))?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    let raw = document
        .extract_text(&pages)
        .map_err(|e| ExtractFailure::Parse(e.to_string()))?;

    accept_normalized(&raw)
}

/// Strategy 2: write the buffer to a scratch file and run the external
/// pdftotext binary against it, bounded by a hard timeout.
async fn extract_with_pdftotext(buffer: &[u8]) -> Result<String, ExtractFailure> {
    let extraction = &config::config().extraction;
    let dir = tempfile::tempdir().map_err(|e| ExtractFailure::Io(e.to_string()))?;

    run_pdftotext(
        dir.path(),
        &extraction.pdftotext_bin,
        buffer,
        Duration::from_secs(extraction.subprocess_timeout_secs),
    )
    .await
    // TempDir drop removes the scratch directory on every exit path,
    // including panics between here and the end of the caller.
}

async fn run_pdftotext(
    dir: &Path,
    bin: &str,
    buffer: &[u8],
    time_limit: Duration,
) -> Result<String, ExtractFailure> {
    let input = dir.join(format!("{}.pdf", Uuid::new_v4().simple()));
    let output = input.with_extension("txt");

    let result = run_pdftotext_inner(&input, &output, bin, buffer, time_limit).await;

    // Unconditional cleanup regardless of how the attempt ended.
    let _ = tokio::fs::remove_file(&input).await;
    let _ = tokio::fs::remove_file(&output).await;

    result
}

async fn run_pdftotext_inner(
    input: &Path,
    output: &Path,
    bin: &str,
    buffer: &[u8],
    time_limit: Duration,
) -> Result<String, ExtractFailure> {
    tokio::fs::write(input, buffer)
        .await
        .map_err(|e| ExtractFailure::Io(e.to_string()))?;

    let mut child = Command::new(bin)
        .arg("-layout")
        .arg(input)
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ExtractFailure::Spawn(e.to_string()))?;

    let status = match timeout(time_limit, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(ExtractFailure::Io(e.to_string())),
        Err(_) => {
            // Kill and reap, then treat as ordinary strategy failure.
            let _ = child.kill().await;
            return Err(ExtractFailure::Timeout);
        }
    };

    if !status.success() {
        return Err(ExtractFailure::NonZeroExit(status.code()));
    }

    let raw = tokio::fs::read_to_string(output)
        .await
        .map_err(|_| ExtractFailure::MissingOutput)?;

    accept_normalized(&raw)
}

fn accept_normalized(raw: &str) -> Result<String, ExtractFailure> {
    let text = normalize(raw);
    let chars = text.chars().count();
    if chars < config::config().extraction.min_text_chars {
        return Err(ExtractFailure::TooShort(chars));
    }
    Ok(text)
}

/// Strategy 3: descriptive placeholder. Always succeeds.
fn fallback_placeholder(buffer: &[u8]) -> String {
    format!(
        "[PDF document of {} bytes received {}. Automatic text extraction failed; \
         the document may be scanned or image-only and will need manual review.]",
        buffer.len(),
        chrono::Utc::now().to_rfc3339()
    )
}

/// Normalize extracted text: unify line endings, trim each line, collapse
/// runs of spaces to one, allow at most one blank line between paragraphs,
/// trim the whole.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut pending_blank = false;

    for line in unified.lines() {
        let line = collapse_spaces(line.trim());
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(&line);
    }

    out
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut previous_was_space = false;
    for c in line.chars() {
        if c == ' ' {
            if !previous_was_space {
                out.push(' ');
            }
            previous_was_space = true;
        } else {
            out.push(c);
            previous_was_space = false;
        }
    }
    out
}
