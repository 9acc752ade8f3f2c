use std::path::PathBuf;

use anyhow::{anyhow, Result};
use pdfium_render::prelude::*;
use tracing::warn;

use crate::config::AppConfig;

pub trait TextExtractor: Send + Sync + 'static {
    /// Returns the text of every page, each followed by a newline.
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Runs `extractor`, treating any parse failure as a document without text.
pub fn extract_text_from_pdf(extractor: &dyn TextExtractor, bytes: &[u8]) -> String {
    match extractor.extract(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, size_bytes = bytes.len(), "failed to read PDF text");
            String::new()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PdfiumExtractor {
    library_dir: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.pdfium_library_path.clone())
    }

    fn bind(&self) -> Result<Pdfium> {
        let local_dir = self
            .library_dir
            .as_deref()
            .and_then(|dir| dir.to_str())
            .unwrap_or("./");
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
            local_dir,
        ))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|err| anyhow!("pdfium library unavailable: {err}"))?;
        Ok(Pdfium::new(bindings))
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|err| anyhow!("load pdf: {err}"))?;

        let mut combined = String::new();
        for (page_index, page) in document.pages().iter().enumerate() {
            let page_text = page
                .text()
                .map_err(|err| anyhow!("read page {page_index}: {err}"))?;
            combined.push_str(&page_text.all());
            combined.push('\n');
        }

        Ok(combined)
    }
}
