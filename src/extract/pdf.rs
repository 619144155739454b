//! PDF text extraction: a three-strategy fallback chain.
//!
//! 1. `lopdf` structured text layer (fast, works for most generated PDFs).
//! 2. `pdf-extract`, a second library, tried when (1) is empty or errors.
//! 3. OCR over rasterized pages (via poppler's `pdftoppm`/`pdfinfo`), tried
//!    when neither text-layer strategy yields usable text.

use std::path::Path;
use std::process::Command;

use crate::error::ExtractError;
use crate::extract::ocr::OcrProcessor;

pub const MAX_TEXT_PAGES: usize = 100;
pub const MAX_OCR_PAGES: usize = 4;
const ZOOM_DPI: u32 = 250;

pub enum Method {
    StructuredText,
    AlternateText,
    Ocr,
}

pub struct PdfExtraction {
    pub text: String,
    pub method: Method,
    pub page_image: Option<Vec<u8>>,
}

/// Runs the strategy chain against `pdf_bytes`. `ocr` is `None` when OCR is
/// disabled by configuration, in which case strategy 3 is skipped.
pub fn extract(pdf_bytes: &[u8], ocr: Option<&OcrProcessor>) -> Result<PdfExtraction, ExtractError> {
    let page_image = render_first_page(pdf_bytes).ok();

    match lopdf::Document::load_mem(pdf_bytes) {
        Ok(doc) => {
            let text = extract_text_from_pages(&doc, MAX_TEXT_PAGES);
            if !should_fall_back(&text) {
                return Ok(PdfExtraction {
                    text,
                    method: Method::StructuredText,
                    page_image,
                });
            }

            let alt_text = try_pdf_extract(pdf_bytes)?;
            if let Some(alt_text) = alt_text {
                if !should_fall_back(&alt_text) {
                    return Ok(PdfExtraction {
                        text: alt_text,
                        method: Method::AlternateText,
                        page_image,
                    });
                }
            }

            if let Some(ocr) = ocr {
                let page_count = doc.get_pages().len();
                let ocr_text = ocr_pages(pdf_bytes, page_count, ocr)?;
                return Ok(PdfExtraction {
                    text: ocr_text,
                    method: Method::Ocr,
                    page_image,
                });
            }

            Ok(PdfExtraction {
                text,
                method: Method::StructuredText,
                page_image,
            })
        }
        Err(_) => {
            if let Some(alt_text) = try_pdf_extract(pdf_bytes)? {
                if !should_fall_back(&alt_text) {
                    return Ok(PdfExtraction {
                        text: alt_text,
                        method: Method::AlternateText,
                        page_image,
                    });
                }
            }

            if let Some(ocr) = ocr {
                let page_count = count_pdf_pages(pdf_bytes).unwrap_or(1);
                let ocr_text = ocr_pages(pdf_bytes, page_count, ocr)?;
                return Ok(PdfExtraction {
                    text: ocr_text,
                    method: Method::Ocr,
                    page_image,
                });
            }

            Err(ExtractError::Corrupt(
                "unable to parse PDF structure and OCR is disabled".to_string(),
            ))
        }
    }
}

fn extract_text_from_pages(doc: &lopdf::Document, max_pages: usize) -> String {
    let mut text = String::new();
    for (page_num, _) in doc.get_pages().into_iter().take(max_pages) {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }
    text
}

/// Runs the `pdf-extract` strategy. Distinguishes "document is encrypted"
/// (a permanent, non-retryable condition per the data model) from any other
/// extraction failure, which is treated as this strategy simply not
/// producing usable text and falls through to the next one.
fn try_pdf_extract(pdf_bytes: &[u8]) -> Result<Option<String>, ExtractError> {
    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => Ok(Some(text)),
        Err(e) if is_encryption_error(&e.to_string()) => Err(ExtractError::Encrypted),
        Err(_) => Ok(None),
    }
}

fn is_encryption_error(message: &str) -> bool {
    message.to_lowercase().contains("encrypt")
}

/// Pattern left behind when a CID font's glyph-to-Unicode mapping is
/// missing; lopdf emits this verbatim instead of failing.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";
const MIN_TOTAL_CHARS: usize = 50;
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// True when `text` looks too sparse or garbled to trust, and a fallback
/// strategy should be tried instead.
fn should_fall_back(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed.replace(IDENTITY_H_PATTERN, "").replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

fn ocr_pages(pdf_bytes: &[u8], page_count: usize, ocr: &OcrProcessor) -> Result<String, ExtractError> {
    let mut all_text = String::new();
    for page_num in 1..=page_count.min(MAX_OCR_PAGES) {
        if let Ok(image_data) = render_pdf_page_to_image(pdf_bytes, page_num as u32, ZOOM_DPI) {
            if let Ok(page_text) = ocr.process_image_bytes(&image_data) {
                all_text.push_str(&page_text);
                all_text.push('\n');
            }
        }
    }
    Ok(all_text)
}

fn render_first_page(pdf_bytes: &[u8]) -> Result<Vec<u8>, ExtractError> {
    render_pdf_page_to_image(pdf_bytes, 1, ZOOM_DPI)
}

fn count_pdf_pages(pdf_bytes: &[u8]) -> Result<usize, ExtractError> {
    let temp_dir = std::env::temp_dir();
    let pdf_path = temp_dir.join(format!("docmover_pagecount_{}.pdf", uuid::Uuid::new_v4()));

    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| ExtractError::OcrFailed(format!("failed to write temp pdf: {e}")))?;

    let output = Command::new("pdfinfo").arg(&pdf_path).output();
    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| {
        ExtractError::OcrFailed(format!("failed to run pdfinfo (is poppler-utils installed?): {e}"))
    })?;

    if !output.status.success() {
        return Err(ExtractError::OcrFailed(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(count_str) = line.strip_prefix("Pages:") {
            if let Ok(count) = count_str.trim().parse::<usize>() {
                return Ok(count);
            }
        }
    }
    Ok(1)
}

fn render_pdf_page_to_image(pdf_bytes: &[u8], page_num: u32, dpi: u32) -> Result<Vec<u8>, ExtractError> {
    let temp_dir = std::env::temp_dir();
    let unique = uuid::Uuid::new_v4();
    let pdf_path = temp_dir.join(format!("docmover_temp_{unique}.pdf"));
    let output_prefix = temp_dir.join(format!("docmover_page_{unique}"));

    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| ExtractError::OcrFailed(format!("failed to write temp pdf: {e}")))?;

    let output = Command::new("pdftoppm")
        .args([
            "-png",
            "-r",
            &dpi.to_string(),
            "-f",
            &page_num.to_string(),
            "-l",
            &page_num.to_string(),
            pdf_path.to_str().unwrap(),
            output_prefix.to_str().unwrap(),
        ])
        .output();

    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| {
        ExtractError::OcrFailed(format!(
            "failed to run pdftoppm (is poppler-utils installed?): {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(ExtractError::OcrFailed(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let candidates = [
        format!("{}-{}.png", output_prefix.display(), page_num),
        format!("{}-{:02}.png", output_prefix.display(), page_num),
        format!("{}-{:03}.png", output_prefix.display(), page_num),
    ];

    let image_path = candidates
        .iter()
        .find(|p| Path::new(p).exists())
        .ok_or_else(|| ExtractError::OcrFailed("rendered page image not found".to_string()))?;

    let image_data = std::fs::read(image_path)
        .map_err(|e| ExtractError::OcrFailed(format!("failed to read rendered page: {e}")))?;
    let _ = std::fs::remove_file(image_path);

    Ok(image_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_fall_back_empty_text() {
        assert!(should_fall_back(""));
        assert!(should_fall_back("   \n\n "));
    }

    #[test]
    fn test_should_fall_back_identity_h_only() {
        assert!(should_fall_back("?Identity-H Unimplemented? ?Identity-H Unimplemented?"));
    }

    #[test]
    fn test_should_fall_back_valid_text() {
        assert!(!should_fall_back("Invoice #12345 for the month of March"));
    }

    #[test]
    fn test_should_fall_back_garbled_text() {
        let garbled = "!@#$%^&*(){}[]|\\:\";<>?,./~`!@#$%^&*(){}[]|\\:\";<>?,./~`!!";
        assert!(garbled.chars().count() > MIN_TOTAL_CHARS);
        assert!(should_fall_back(garbled));
    }

    #[test]
    fn test_should_fall_back_mixed_identity_h_with_real_content() {
        let text = "Invoice #123 ?Identity-H Unimplemented? Total: $500";
        assert!(!should_fall_back(text));
    }

    #[test]
    fn test_extract_from_minimal_embedded_text_pdf() {
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        let content_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Courier" }),
        );
        doc.objects.insert(
            resources_id,
            Object::Dictionary(dictionary! { "Font" => dictionary! { "F1" => font_id } }),
        );
        let content = "BT /F1 12 Tf 50 700 Td (Test PDF Content) Tj ET";
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(dictionary! {}, content.as_bytes().to_vec())),
        );
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page", "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id, "Contents" => content_id,
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => vec![page_id.into()], "Count" => 1 }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let mut pdf_bytes = Vec::new();
        doc.save_to(&mut pdf_bytes).unwrap();

        let result = extract(&pdf_bytes, None).unwrap();
        assert!(result.text.contains("Test PDF Content"));
        assert!(matches!(result.method, Method::StructuredText));
    }

    #[test]
    fn test_extract_corrupt_pdf_without_ocr_errors() {
        let result = extract(b"not a valid pdf", None);
        assert!(result.is_err());
    }

    #[test]
    fn test_is_encryption_error_matches_common_phrasing() {
        assert!(is_encryption_error("Decryption error: unable to decrypt stream"));
        assert!(is_encryption_error("document is Encrypted with an unsupported filter"));
    }

    #[test]
    fn test_is_encryption_error_rejects_unrelated_messages() {
        assert!(!is_encryption_error("unexpected end of stream"));
        assert!(!is_encryption_error("invalid object reference"));
    }
}
