//! In-process candidate using `lopdf`, last resort before the placeholder.

use super::{ContextRequest, ContextStrategy, ExtractionFailure};
use lopdf::Document;

pub struct LopdfStrategy;

#[async_trait::async_trait]
impl ContextStrategy for LopdfStrategy {
    fn name(&self) -> &str {
        "lopdf"
    }

    async fn extract(&self, request: &ContextRequest) -> Result<String, ExtractionFailure> {
        let data = tokio::fs::read(&request.document)
            .await
            .map_err(|e| ExtractionFailure::Pdf(format!("{}: {}", request.document.display(), e)))?;

        let (first, last) = request.window();
        let page = request.page;

        tokio::task::spawn_blocking(move || extract_window(&data, page, first, last))
            .await
            .map_err(|e| ExtractionFailure::Pdf(format!("extraction task failed: {}", e)))?
    }
}

/// Text of pages `first..=last`, requiring `page` itself to exist.
fn extract_window(
    data: &[u8],
    page: u32,
    first: u32,
    last: u32,
) -> Result<String, ExtractionFailure> {
    let doc = Document::load_mem(data)
        .map_err(|e| ExtractionFailure::Pdf(format!("failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    if !pages.contains_key(&page) {
        return Err(ExtractionFailure::Pdf(format!(
            "page {} out of range (document has {} pages)",
            page,
            pages.len()
        )));
    }

    let mut sections = Vec::new();
    for page_num in pages.keys().copied().filter(|n| (first..=last).contains(n)) {
        match doc.extract_text(&[page_num]) {
            Ok(text) if !text.trim().is_empty() => sections.push(text.trim().to_string()),
            Ok(_) => {}
            Err(e) => tracing::debug!("lopdf: page {} unreadable: {}", page_num, e),
        }
    }

    if sections.is_empty() {
        return Err(ExtractionFailure::Empty(page));
    }

    Ok(sections.join("\n\n"))
}
