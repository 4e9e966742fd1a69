use std::path::Path;

use anyhow::{Context, Result};

use super::walker::DocumentFormat;

pub fn extract_text(path: &Path, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Text => extract_plain_text(path),
        DocumentFormat::Pdf => extract_pdf(path),
    }
}

fn extract_plain_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read text file: {}", path.display()))?;
    // Stray invalid bytes should not cost the whole file.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn extract_pdf(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).with_context(|| format!("Failed to extract PDF text: {}", path.display()))
}
