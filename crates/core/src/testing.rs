//! Fixtures shared by the unit tests: a tiny PDF writer and fake collaborators.

use crate::traits::{CompletionClient, CompletionRequest};
use crate::SearchError;
use async_trait::async_trait;
use std::sync::Mutex;

/// One line of Helvetica text placed at `(72, y)` in PDF user space.
#[derive(Debug, Clone)]
pub struct PdfLine {
    pub size: u32,
    pub y: u32,
    pub text: String,
}

impl PdfLine {
    pub fn new(size: u32, y: u32, text: &str) -> Self {
        Self {
            size,
            y,
            text: text.to_string(),
        }
    }
}

fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '(' | ')' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn content_stream(lines: &[PdfLine]) -> String {
    lines
        .iter()
        .map(|line| {
            format!(
                "BT /F1 {} Tf 72 {} Td ({}) Tj ET\n",
                line.size,
                line.y,
                escape_literal(&line.text)
            )
        })
        .collect()
}

/// Builds a letter-sized PDF with one page per entry. An empty entry gives a
/// page whose content stream is empty.
pub fn pdf_with_pages(pages: &[Vec<PdfLine>]) -> Vec<u8> {
    // 1: catalog, 2: page tree, 3: font, then a page and its content per entry.
    let page_ids = (0..pages.len()).map(|index| 4 + 2 * index).collect::<Vec<_>>();
    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (lines, page_id) in pages.iter().zip(&page_ids) {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_id + 1
        ));
        let stream = content_stream(lines);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}\nendstream",
            stream.len()
        ));
    }

    let mut output = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(output.len());
        output.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
    }

    let xref_offset = output.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    ));
    output.extend_from_slice(xref.as_bytes());
    output
}

/// Completion fake that returns a canned reply and remembers every request.
#[derive(Debug, Default)]
pub struct RecordingCompletion {
    reply: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl RecordingCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for RecordingCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, SearchError> {
        self.requests
            .lock()
            .map_err(|_| SearchError::NotReady("recorder lock poisoned".to_string()))?
            .push(request.clone());
        Ok(self.reply.clone())
    }
}

#[test]
fn generated_pdf_loads_with_expected_pages() {
    let bytes = pdf_with_pages(&[
        vec![PdfLine::new(12, 700, "Hello (world)")],
        vec![],
    ]);
    let document = lopdf::Document::load_mem(&bytes).expect("fixture pdf parses");
    assert_eq!(document.get_pages().len(), 2);
}
