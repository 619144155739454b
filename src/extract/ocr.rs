//! Tesseract-backed OCR, with a page-orientation heuristic run ahead of the
//! real pass since scanned documents are frequently fed through sideways.

use std::io::Cursor;
use std::sync::Arc;

use image::GenericImageView;

use crate::error::ExtractError;

#[derive(Clone)]
pub struct OcrProcessor {
    inner: Arc<OcrProcessorInner>,
}

struct OcrProcessorInner {
    languages: String,
}

impl OcrProcessor {
    pub fn new(languages: &[String]) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(OcrProcessorInner { languages: lang_str }),
        }
    }

    /// Runs OCR on `image_data`, first auto-rotating the page by whichever of
    /// 0/90/180/270 degrees yields the most alphanumeric words -- scanned
    /// pages are routinely fed in sideways or upside down.
    pub fn process_image_bytes(&self, image_data: &[u8]) -> Result<String, ExtractError> {
        let img = image::load_from_memory(image_data)
            .map_err(|e| ExtractError::OcrFailed(format!("failed to load image: {e}")))?;

        let rotation = detect_orientation(&img, &self.inner.languages)?;
        let rotated = apply_rotation(img, rotation);

        let mut png_data = Vec::new();
        rotated
            .write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ExtractError::OcrFailed(format!("failed to encode image: {e}")))?;

        run_tesseract(&png_data, &self.inner.languages)
    }
}

fn run_tesseract(png_data: &[u8], languages: &str) -> Result<String, ExtractError> {
    let mut lt = leptess::LepTess::new(None, languages)
        .map_err(|e| ExtractError::OcrFailed(format!("failed to initialize tesseract: {e}")))?;

    lt.set_image_from_mem(png_data)
        .map_err(|e| ExtractError::OcrFailed(format!("failed to set ocr image: {e}")))?;

    lt.get_utf8_text()
        .map_err(|e| ExtractError::OcrFailed(format!("ocr failed: {e}")))
}

/// Tries all four axis-aligned rotations and keeps whichever produced the
/// most alphanumeric words -- a cheap proxy for "reads right side up"
/// without a dedicated orientation classifier.
fn detect_orientation(img: &image::DynamicImage, languages: &str) -> Result<u32, ExtractError> {
    let mut best_rotation = 0;
    let mut best_score = -1i64;

    for rotation in [0, 90, 180, 270] {
        let candidate = apply_rotation(img.clone(), rotation);
        let mut png_data = Vec::new();
        if candidate
            .write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .is_err()
        {
            continue;
        }

        let text = run_tesseract(&png_data, languages).unwrap_or_default();
        let score = text
            .split_whitespace()
            .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
            .count() as i64;

        if score > best_score {
            best_score = score;
            best_rotation = rotation;
        }
    }

    Ok(best_rotation)
}

fn apply_rotation(img: image::DynamicImage, degrees: u32) -> image::DynamicImage {
    match degrees {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    }
}
