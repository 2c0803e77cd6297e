//! Context and prompt assembly for answer generation.

use crate::store::Document;

const TRUNCATION_MARKER: &str = "...";

/// Renders retrieved documents into a bounded context block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBuilder {
    max_chars: usize,
}

impl ContextBuilder {
    #[must_use]
    pub const fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    #[must_use]
    pub const fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// One block per `(document, fused score)`, numbered from 1 in the given
    /// order. Output longer than the limit is cut at a char boundary and
    /// marked with a trailing `...`.
    #[must_use]
    pub fn build(&self, docs: &[(Document, f64)]) -> String {
        let context = docs
            .iter()
            .enumerate()
            .map(|(idx, (doc, score))| {
                format!(
                    "Document {} (Score: {score:.3}):\n{}\n",
                    idx + 1,
                    document_text(doc)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        truncate_chars(context, self.max_chars)
    }
}

/// The body, or `Title:`/`Source:` lines for documents without one.
#[must_use]
pub fn document_text(doc: &Document) -> String {
    if !doc.body.trim().is_empty() {
        return doc.body.clone();
    }

    let mut text = String::new();
    if let Some(title) = &doc.title {
        text.push_str(&format!("Title: {title}\n"));
    }
    if let Some(source) = &doc.source {
        text.push_str(&format!("Source: {source}\n"));
    }
    if text.is_empty() {
        text.clone_from(&doc.doc_id);
    }
    text
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

/// Chat prompts for grounded answering.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    #[must_use]
    pub const fn system_prompt(&self) -> &'static str {
        "You are a helpful assistant that answers questions based on the provided context. \
         Use only the information from the context to answer the question. If the context \
         does not contain enough information to answer the question, say so. Be concise but \
         informative."
    }

    #[must_use]
    pub fn user_prompt(&self, query: &str, context: &str) -> String {
        format!(
            "Question: {query}\n\nContext:\n{context}\n\n\
             Please provide a clear and accurate answer based on the context above:"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: Option<&str>, body: &str, source: Option<&str>) -> Document {
        Document {
            doc_id: id.to_string(),
            title: title.map(str::to_string),
            body: body.to_string(),
            source: source.map(str::to_string),
            metadata: serde_json::Map::new(),
            content_hash: String::new(),
            ingested_at_us: 0,
        }
    }

    #[test]
    fn formats_numbered_blocks_joined_by_newline() {
        let context = ContextBuilder::new(4000).build(&[
            (doc("a", None, "alpha text", None), 0.8766),
            (doc("b", None, "beta text", None), 0.5),
        ]);
        assert_eq!(
            context,
            "Document 1 (Score: 0.877):\nalpha text\n\nDocument 2 (Score: 0.500):\nbeta text\n"
        );
    }

    #[test]
    fn empty_body_uses_title_and_source() {
        let d = doc("a", Some("Migraine"), "  ", Some("journal"));
        assert_eq!(document_text(&d), "Title: Migraine\nSource: journal\n");
        assert_eq!(document_text(&doc("bare", None, "", None)), "bare");
    }

    #[test]
    fn truncates_on_char_boundary_with_marker() {
        let context = ContextBuilder::new(10).build(&[(doc("a", None, "ééééééééééé", None), 1.0)]);
        assert_eq!(context.chars().count(), 13);
        assert!(context.ends_with("..."));
        assert!(context.starts_with("Document 1"));

        let short = ContextBuilder::new(4000).build(&[(doc("a", None, "x", None), 1.0)]);
        assert!(!short.ends_with("..."));
    }

    #[test]
    fn no_documents_is_empty_context() {
        assert_eq!(ContextBuilder::new(100).build(&[]), "");
    }

    #[test]
    fn user_prompt_embeds_question_and_context() {
        let prompt = PromptBuilder.user_prompt("why?", "Document 1");
        assert!(prompt.starts_with("Question: why?\n\nContext:\nDocument 1\n\n"));
        assert!(PromptBuilder.system_prompt().contains("only the information from the context"));
    }
}
