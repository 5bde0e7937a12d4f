use crate::traits::{CompletionClient, CompletionRequest};
use crate::SearchError;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

const TITLE_REQUESTS: [&str; 3] = ["title", "paper title", "title of the paper"];

pub const INSUFFICIENT_CONTEXT: &str = "Not enough context from the paper.";

/// Longest tail accepted as a citation list when its header follows a
/// sentence on the same line.
const MAX_INLINE_CITATION_TAIL: usize = 200;

fn citation_marker_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\[\d+\]").expect("marker pattern is valid"))
}

fn citation_block_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?im)^[^\S\n]*(citations|references|sources)[^\S\n]*:")
            .expect("citation block pattern is valid")
    })
}

fn inline_citation_block_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)[.!?][^\S\n]+(citations|references|sources)[^\S\n]*:")
            .expect("inline citation block pattern is valid")
    })
}

fn sentence_break_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[.!?]\s+\S").expect("sentence break pattern is valid"))
}

/// Byte offset where a trailing citation block begins. A header opening a
/// line always starts one; a header right after a sentence only does when
/// what follows is a short list rather than more prose.
fn citation_block_start(text: &str) -> Option<usize> {
    let line_start = citation_block_regex().find(text).map(|block| block.start());
    let inline = inline_citation_block_regex()
        .find_iter(text)
        .find(|header| {
            let tail = &text[header.end()..];
            tail.len() <= MAX_INLINE_CITATION_TAIL && !sentence_break_regex().is_match(tail)
        })
        // Keep the sentence's closing punctuation.
        .map(|header| header.start() + 1);

    match (line_start, inline) {
        (Some(left), Some(right)) => Some(left.min(right)),
        (left, right) => left.or(right),
    }
}

/// True for the fixed title phrasings, ignoring case, spacing and trailing punctuation.
pub fn is_title_request(query: &str) -> bool {
    let lowered = query.to_lowercase();
    let trimmed = lowered.trim().trim_end_matches(['?', '.', '!', ':']);
    let normalized = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    TITLE_REQUESTS.contains(&normalized.as_str())
}

pub fn build_user_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a research paper assistant.\n\n\
         Use ONLY the context below to answer.\n\
         If the context is insufficient, say: \"{INSUFFICIENT_CONTEXT}\"\n\n\
         Context:\n{context}\n\n\
         User question: {query}\n\n\
         Answer:\n"
    )
}

/// Strips `[n]` markers and any trailing citations/references/sources block
/// (from its header to the end), then drops blank lines and trims the rest.
pub fn clean_answer(raw: &str) -> String {
    let without_markers = citation_marker_regex().replace_all(raw, "");
    let body = match citation_block_start(&without_markers) {
        Some(start) => &without_markers[..start],
        None => &without_markers[..],
    };

    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedAnswer {
    pub answer_raw: String,
    pub answer_clean: String,
}

pub struct AnswerComposer<'a, C> {
    client: &'a C,
    model: String,
    temperature: f32,
}

impl<'a, C> AnswerComposer<'a, C>
where
    C: CompletionClient + Sync,
{
    pub fn new(client: &'a C, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    pub async fn compose(
        &self,
        query: &str,
        context: &str,
        system_prompt: &str,
    ) -> Result<ComposedAnswer, SearchError> {
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            user_prompt: build_user_prompt(query, context),
            model: self.model.clone(),
            temperature: self.temperature,
        };
        let answer_raw = self.client.complete(&request).await?.trim().to_string();
        let answer_clean = clean_answer(&answer_raw);
        debug!(
            model = %self.model,
            raw_chars = answer_raw.len(),
            clean_chars = answer_clean.len(),
            "composed answer"
        );

        Ok(ComposedAnswer {
            answer_raw,
            answer_clean,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingCompletion;

    #[test]
    fn title_phrasings_are_recognized() {
        assert!(is_title_request("title"));
        assert!(is_title_request("  TITLE "));
        assert!(is_title_request("Paper   Title?"));
        assert!(is_title_request("title of the paper."));
        assert!(!is_title_request("what is the title about"));
        assert!(!is_title_request("subtitle"));
        assert!(!is_title_request(""));
    }

    #[test]
    fn markers_are_removed_everywhere() {
        let cleaned = clean_answer("Transformers use attention [3].\nIt scales [1][3] well [12].");
        assert_eq!(cleaned, "Transformers use attention .\nIt scales  well .");
        assert!(!citation_marker_regex().is_match(&cleaned));
    }

    #[test]
    fn trailing_citation_block_is_dropped() {
        let raw = "The model has 6 layers.\n\n  \nReferences:\n[1] page 3\n[2] page 4";
        assert_eq!(clean_answer(raw), "The model has 6 layers.");

        let sources = "Line one\n   line two  \nSOURCES : paper.pdf";
        assert_eq!(clean_answer(sources), "Line one\nline two");
    }

    #[test]
    fn header_words_inside_a_sentence_are_kept() {
        let raw = "The authors list 40 references: most are recent.";
        assert_eq!(clean_answer(raw), raw);

        let prose = "It cites older work. References: most predate 2015. The rest are recent.";
        assert_eq!(clean_answer(prose), prose);
    }

    #[test]
    fn citation_block_on_the_answer_line_is_dropped() {
        let cleaned = clean_answer("The model uses six layers [1]. Sources: [1], [2]");
        assert_eq!(cleaned, "The model uses six layers .");

        let named = clean_answer("Adam is used! citations: paper.pdf p.3, paper.pdf p.4");
        assert_eq!(named, "Adam is used!");
    }

    #[test]
    fn citation_only_answer_cleans_to_empty() {
        assert_eq!(clean_answer("Citations: [1], [2]"), "");
        assert_eq!(clean_answer(""), "");
        assert_eq!(clean_answer("[4]"), "");
    }

    #[test]
    fn prompt_embeds_context_and_question() {
        let prompt = build_user_prompt("What dataset?", "[1]\nImageNet");
        assert!(prompt.contains("Use ONLY the context below to answer."));
        assert!(prompt.contains(INSUFFICIENT_CONTEXT));
        assert!(prompt.contains("Context:\n[1]\nImageNet"));
        assert!(prompt.contains("User question: What dataset?"));
        assert!(prompt.ends_with("Answer:\n"));
    }

    #[tokio::test]
    async fn compose_sends_one_request_and_cleans_reply() -> Result<(), SearchError> {
        let client = RecordingCompletion::replying("  Six layers [2].\n\nSources:\n[2] p.3  ");
        let composer = AnswerComposer::new(&client, "llama-3.1-8b-instant", 0.2);

        let answer = composer
            .compose("How many layers?", "[1]\na\n\n[2]\nb", "system")
            .await?;
        assert_eq!(answer.answer_raw, "Six layers [2].\n\nSources:\n[2] p.3");
        assert_eq!(answer.answer_clean, "Six layers .");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system_prompt, "system");
        assert_eq!(requests[0].model, "llama-3.1-8b-instant");
        assert!(requests[0].user_prompt.contains("How many layers?"));
        Ok(())
    }
}
