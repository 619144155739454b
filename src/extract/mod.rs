//! Content Extractor (C4): turns one source file into text plus an optional
//! page image, picking among several extraction strategies and scoring the
//! result so callers can decide how much to trust it.

pub mod ocr;
pub mod pdf;
pub mod quality;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::extract::ocr::OcrProcessor;
pub use crate::extract::quality::Quality;

const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
const DEFAULT_TOKEN_BUDGET: usize = 15_000;
const BYTES_PER_TOKEN_ESTIMATE: usize = 4;
const TRUNCATION_FACTOR: f64 = 0.9;

/// Extensions the extractor knows how to handle, shared with the directory
/// scanner so it doesn't enumerate files that would just bounce back as
/// [`ExtractError::Unsupported`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tiff", "tif", "bmp", "gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    StructuredText,
    AlternateText,
    Ocr,
    PlainText,
}

#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub text: String,
    pub page_image: Option<Vec<u8>>,
    pub quality: Quality,
    pub method: Method,
    pub error_message: Option<String>,
}

impl ExtractedContent {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            page_image: None,
            quality: Quality::Failed,
            method: Method::PlainText,
            error_message: Some(message.into()),
        }
    }
}

/// Extracts content from `path`. `input_root` bounds the path-traversal
/// check; `ocr` is `None` when OCR is disabled by configuration and
/// `token_budget` overrides the default truncation target.
pub fn extract(
    path: &Path,
    input_root: &Path,
    ocr: Option<&OcrProcessor>,
    token_budget: Option<usize>,
) -> Result<ExtractedContent, ExtractError> {
    validate_path(path, input_root)?;

    let metadata = std::fs::metadata(path).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if metadata.len() == 0 {
        return Ok(ExtractedContent::failed("file is empty"));
    }
    if metadata.len() > MAX_FILE_SIZE {
        return Err(ExtractError::TooLarge {
            size: metadata.len(),
            limit: MAX_FILE_SIZE,
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let content = if extension == "pdf" {
        extract_pdf(&bytes, ocr)?
    } else if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        extract_image(&bytes, ocr)?
    } else {
        return Err(ExtractError::Unsupported(extension));
    };

    Ok(truncate(content, token_budget.unwrap_or(DEFAULT_TOKEN_BUDGET)))
}

fn validate_path(path: &Path, input_root: &Path) -> Result<(), ExtractError> {
    let canonical_root = input_root
        .canonicalize()
        .map_err(|e| ExtractError::Io { path: input_root.to_path_buf(), source: e })?;
    let canonical_path = path
        .canonicalize()
        .map_err(|e| ExtractError::Io { path: path.to_path_buf(), source: e })?;

    if !canonical_path.starts_with(&canonical_root) {
        return Err(ExtractError::PathTraversal(path.to_path_buf()));
    }
    Ok(())
}

fn extract_pdf(bytes: &[u8], ocr: Option<&OcrProcessor>) -> Result<ExtractedContent, ExtractError> {
    let extraction = pdf::extract(bytes, ocr)?;

    let is_ocr = matches!(extraction.method, pdf::Method::Ocr);
    let mut score = quality::score(&extraction.text);
    if is_ocr {
        score = quality::downgrade(score);
    }

    if score == Quality::Failed && extraction.page_image.is_none() {
        return Ok(ExtractedContent::failed("no usable text or image extracted"));
    }

    let method = match extraction.method {
        pdf::Method::StructuredText => Method::StructuredText,
        pdf::Method::AlternateText => Method::AlternateText,
        pdf::Method::Ocr => Method::Ocr,
    };

    Ok(ExtractedContent {
        text: extraction.text,
        page_image: extraction.page_image,
        quality: score,
        method,
        error_message: None,
    })
}

fn extract_image(bytes: &[u8], ocr: Option<&OcrProcessor>) -> Result<ExtractedContent, ExtractError> {
    let text = match ocr {
        Some(ocr) => ocr.process_image_bytes(bytes)?,
        None => String::new(),
    };

    let score = quality::downgrade(quality::score(&text));

    if score == Quality::Failed {
        return Ok(ExtractedContent {
            text: String::new(),
            page_image: Some(bytes.to_vec()),
            quality: Quality::Failed,
            method: Method::Ocr,
            error_message: None,
        });
    }

    Ok(ExtractedContent {
        text,
        page_image: Some(bytes.to_vec()),
        quality: score,
        method: Method::Ocr,
        error_message: None,
    })
}

fn truncate(mut content: ExtractedContent, token_budget: usize) -> ExtractedContent {
    let target_bytes = (token_budget as f64 * BYTES_PER_TOKEN_ESTIMATE as f64 * TRUNCATION_FACTOR) as usize;
    if content.text.len() > target_bytes {
        let mut end = target_bytes;
        while end > 0 && !content.text.is_char_boundary(end) {
            end -= 1;
        }
        content.text.truncate(end);
    }
    content
}

/// Returns the absolute path to `path` joined against `dir`, used by
/// callers that need to re-derive a canonical form before calling
/// [`extract`].
pub fn resolve(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}
