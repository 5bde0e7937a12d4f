use crate::models::{Citation, RetrievalHit};

/// Prompt context plus the provenance of every tagged excerpt. `citations[i]`
/// describes the excerpt tagged `[i + 1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    pub citations: Vec<Citation>,
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Tags hits `[1]`, `[2]`, ... in the order given. Source names and pages stay
/// out of the context text and only appear in the citations.
pub fn assemble(hits: &[RetrievalHit], max_chars_per_chunk: usize) -> AssembledContext {
    let mut blocks = Vec::with_capacity(hits.len());
    let mut citations = Vec::with_capacity(hits.len());

    for (index, hit) in hits.iter().enumerate() {
        let tag = format!("[{}]", index + 1);
        let text = truncate_chars(hit.text.trim(), max_chars_per_chunk);

        blocks.push(format!("{tag}\n{text}"));
        citations.push(Citation {
            tag,
            source: hit.metadata.source.clone(),
            page: hit.metadata.page,
            chunk_id: hit.metadata.chunk_id,
        });
    }

    AssembledContext {
        text: blocks.join("\n\n"),
        citations,
    }
}
