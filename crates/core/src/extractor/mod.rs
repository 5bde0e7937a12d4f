pub mod layout;
pub mod margins;
pub mod title;

use crate::config::ExtractionOptions;
use crate::error::IngestError;
use crate::identity::read_source;
use crate::models::Page;
use layout::{layout_text, page_words, LayoutWord};
use lopdf::{Document, ObjectId};
use margins::{detect_repeated_margins, strip_repeated_margins, RepeatedMargins};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Pages in the PDF, including ones without extractable text.
    pub page_count: usize,
    pub pdf_version: String,
    pub removed_header: Option<String>,
    pub removed_footer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub title: String,
    /// Non-empty pages only, in page order.
    pub pages: Vec<Page>,
    pub metadata: DocumentMetadata,
}

pub trait PdfExtractor {
    fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractedDocument, IngestError>;

    fn extract(&self, path: &Path) -> Result<ExtractedDocument, IngestError> {
        let bytes = read_source(path)?;
        self.extract_bytes(&bytes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LopdfExtractor {
    options: ExtractionOptions,
}

impl LopdfExtractor {
    pub fn new(options: ExtractionOptions) -> Self {
        Self { options }
    }

    fn raw_page_text(&self, document: &Document, number: u32, page_id: ObjectId) -> String {
        match document.extract_text(&[number]) {
            Ok(text) if !text.trim().is_empty() => return text,
            Ok(_) => {}
            Err(error) => warn!(page = number, %error, "text extraction failed, using layout"),
        }

        match page_words(document, page_id, self.options.x_tolerance) {
            Ok(words) => layout_text(&words, self.options.y_tolerance),
            Err(error) => {
                warn!(page = number, %error, "page has no readable content stream");
                String::new()
            }
        }
    }

    fn first_page_words(&self, document: &Document, page_id: ObjectId) -> Vec<LayoutWord> {
        page_words(document, page_id, self.options.x_tolerance).unwrap_or_else(|error| {
            warn!(%error, "layout words unavailable for title detection");
            Vec::new()
        })
    }
}

impl PdfExtractor for LopdfExtractor {
    fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractedDocument, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::Extraction(error.to_string()))?;

        let page_ids = document.get_pages();
        let normalized = page_ids
            .iter()
            .map(|(&number, &page_id)| {
                let text = normalize_page_text(&self.raw_page_text(&document, number, page_id));
                (number, page_id, text)
            })
            .collect::<Vec<_>>();

        // Title detection runs before margin stripping so a running title
        // repeated on every page is still visible on the first one.
        let title = normalized
            .iter()
            .find(|(_, _, text)| !text.is_empty())
            .map(|(_, page_id, text)| {
                let lines = text.lines().map(str::to_string).collect::<Vec<_>>();
                let words = self.first_page_words(&document, *page_id);
                title::extract_title(&lines, &words)
            })
            .unwrap_or_default();

        let margins = if self.options.strip_repeated_margins {
            let texts = normalized
                .iter()
                .map(|(_, _, text)| text.as_str())
                .collect::<Vec<_>>();
            detect_repeated_margins(&texts)
        } else {
            RepeatedMargins::default()
        };
        if !margins.is_empty() {
            debug!(
                header = ?margins.header,
                footer = ?margins.footer,
                "stripping repeated margins"
            );
        }

        let pages = normalized
            .into_iter()
            .map(|(number, _, text)| Page {
                page_number: number,
                text: normalize_page_text(&strip_repeated_margins(&text, &margins)),
            })
            .filter(|page| !page.text.is_empty())
            .collect::<Vec<_>>();

        Ok(ExtractedDocument {
            title,
            pages,
            metadata: DocumentMetadata {
                page_count: page_ids.len(),
                pdf_version: document.version.clone(),
                removed_header: margins.header,
                removed_footer: margins.footer,
            },
        })
    }
}

fn inline_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\S\n]+").expect("inline whitespace pattern is valid"))
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("blank line pattern is valid"))
}

/// Strips NULs, collapses spaces and tabs, trims every line, keeps at most
/// one blank line between paragraphs and trims the result.
pub fn normalize_page_text(raw: &str) -> String {
    let without_nul = raw.replace('\0', "").replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = inline_space_re().replace_all(&without_nul, " ");
    let trimmed_lines = collapsed.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    blank_run_re()
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pdf_with_pages, PdfLine};

    #[test]
    fn normalization_collapses_spacing_and_blank_runs() {
        let raw = "  Title\t\twith   gaps \u{0}\r\n\n\n\n  next  paragraph  \n\n\n";
        assert_eq!(
            normalize_page_text(raw),
            "Title with gaps\n\nnext paragraph"
        );
    }

    #[test]
    fn corrupt_bytes_are_an_extraction_error() {
        let result = LopdfExtractor::default().extract_bytes(b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(IngestError::Extraction(_))));
    }

    #[test]
    fn missing_path_is_not_found() {
        let result = LopdfExtractor::default().extract(Path::new("/no/such/paper.pdf"));
        assert!(matches!(result, Err(IngestError::NotFound(_))));
    }

    #[test]
    fn blank_pages_are_dropped_and_numbering_kept() -> Result<(), IngestError> {
        let bytes = pdf_with_pages(&[
            vec![],
            vec![PdfLine::new(12, 700, "Only text on the second page")],
        ]);

        let extracted = LopdfExtractor::default().extract_bytes(&bytes)?;
        assert_eq!(extracted.metadata.page_count, 2);
        assert_eq!(extracted.pages.len(), 1);
        assert_eq!(extracted.pages[0].page_number, 2);
        assert!(extracted.pages[0].text.contains("Only text on the second page"));
        Ok(())
    }

    #[test]
    fn running_footer_is_removed_from_every_page() -> Result<(), IngestError> {
        let page = |body: &'static str| {
            vec![
                PdfLine::new(10, 700, body),
                PdfLine::new(8, 40, "Workshop on Retrieval 2024"),
            ]
        };
        let bytes = pdf_with_pages(&[
            page("Introduction to the problem"),
            page("Method details follow here"),
            page("Results and discussion"),
        ]);

        let extracted = LopdfExtractor::default().extract_bytes(&bytes)?;
        assert_eq!(
            extracted.metadata.removed_footer.as_deref(),
            Some("Workshop on Retrieval 2024")
        );
        assert!(extracted
            .pages
            .iter()
            .all(|page| !page.text.contains("Workshop on Retrieval")));
        Ok(())
    }

    #[test]
    fn font_size_title_used_without_abstract() -> Result<(), IngestError> {
        let bytes = pdf_with_pages(&[vec![
            PdfLine::new(9, 760, "arXiv:2401.01234v2 [cs.CL]"),
            PdfLine::new(20, 700, "Chunked Retrieval at Scale"),
            PdfLine::new(10, 640, "1 Introduction"),
            PdfLine::new(10, 620, "Retrieval systems split text into windows."),
            PdfLine::new(10, 600, "Each window is embedded separately."),
        ]]);

        let extracted = LopdfExtractor::default().extract_bytes(&bytes)?;
        assert_eq!(extracted.title, "Chunked Retrieval at Scale");
        Ok(())
    }
}
