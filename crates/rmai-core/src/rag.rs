//! Reference lookup: retrieve studies, then have the LLM summarize them.

use std::sync::Arc;

use serde::Deserialize;

use rmai_types::llm::LlmError;
use rmai_types::study::{LiteratureDigest, RagAnswer, Study, StudySummary};

use crate::llm::{BoxLlmProvider, PromptSettings};
use crate::retrieval::{RetrievalError, Retriever};
use crate::text::take_chars;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant. You will be given N retrieved documents as CONTEXT. \
For EACH document, produce a JSON object with keys: title (string), summary (2-4 sentences), link (string or null). \
Use TITLE and URL from the context when present. Base the summary strictly on ABSTRACT. \
Return ONLY a JSON array of objects, in the same order as the context blocks [1], [2], ...; no extra text.";

const DIGEST_SYSTEM_PROMPT: &str = "You are a research assistant helping scientists during a meeting. \
You will be given a TERM and N retrieved PubMed abstracts as CONTEXT. \
Return ONLY a JSON object with keys: term_summary (2-3 sentences explaining the term for a researcher) \
and latest_findings (3-5 sentences on what the retrieved literature reports, citing blocks as [1], [2], ...). \
Base latest_findings strictly on the ABSTRACT text; no extra text outside the JSON.";

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model returned unparseable output: {0}")]
    Parse(String),
}

/// Render retrieved studies as numbered context blocks.
///
/// Each block is `[i]` followed by `TITLE:`, `URL:` and `ABSTRACT:` lines
/// (omitted when empty). Title and abstract are clipped to
/// `per_field_chars`. Blocks are separated by `---` rules.
pub fn format_documents(docs: &[Study], per_field_chars: usize) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            let mut block = vec![format!("[{}]", i + 1)];
            let title = take_chars(&doc.title, per_field_chars);
            if !title.is_empty() {
                block.push(format!("TITLE: {title}"));
            }
            if let Some(url) = doc.link_or_pubmed() {
                block.push(format!("URL: {url}"));
            }
            let text = take_chars(doc.abstract_text.as_deref().unwrap_or_default(), per_field_chars);
            if !text.is_empty() {
                block.push(format!("ABSTRACT: {text}"));
            }
            block.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Pull the JSON payload out of a model reply.
///
/// Accepts bare JSON, JSON inside a Markdown code fence, or JSON surrounded
/// by prose (the outermost `[...]` or `{...}` span is taken).
pub fn extract_json(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    let start = unfenced.find(['[', '{'])?;
    let close = if unfenced[start..].starts_with('[') {
        ']'
    } else {
        '}'
    };
    let end = unfenced.rfind(close)?;
    (end > start).then(|| &unfenced[start..=end])
}

#[derive(Debug, Deserialize)]
struct DigestReply {
    #[serde(default)]
    term_summary: String,
    #[serde(default)]
    latest_findings: String,
}

/// Retrieval-augmented summaries of PubMed studies.
pub struct RagService {
    retriever: Arc<Retriever>,
    llm: Arc<BoxLlmProvider>,
    settings: PromptSettings,
    top_k: usize,
    per_field_chars: usize,
}

impl RagService {
    pub fn new(
        retriever: Arc<Retriever>,
        llm: Arc<BoxLlmProvider>,
        settings: PromptSettings,
        top_k: usize,
        per_field_chars: usize,
    ) -> Self {
        Self {
            retriever,
            llm,
            settings,
            top_k,
            per_field_chars,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieve studies for `question` and summarize each one.
    ///
    /// Summaries are paired with documents by position; each carries the
    /// document's reference and score. When nothing is retrieved the LLM is
    /// not called.
    #[tracing::instrument(name = "rag_ask", skip(self), fields(model = %self.settings.model))]
    pub async fn ask(&self, question: &str, top_k: Option<usize>) -> Result<RagAnswer, RagError> {
        let retrieval = self
            .retriever
            .find_similar(question, top_k.unwrap_or(self.top_k))
            .await?;
        let documents = retrieval.studies;
        if documents.is_empty() {
            return Ok(RagAnswer::default());
        }

        let context = format_documents(&documents, self.per_field_chars);
        let request = self.settings.request(
            Some(SUMMARY_SYSTEM_PROMPT),
            format!("CONTEXT:\n{context}\n\nUSER QUESTION:\n{question}"),
        );
        let response = self.llm.complete(&request).await?;

        let json = extract_json(&response.content)
            .ok_or_else(|| RagError::Parse("no JSON array in reply".to_string()))?;
        let mut results: Vec<StudySummary> =
            serde_json::from_str(json).map_err(|e| RagError::Parse(e.to_string()))?;

        for (item, doc) in results.iter_mut().zip(documents.iter()) {
            item.reference = doc.reference();
            item.score = doc.score;
            if item.link.as_deref().is_none_or(str::is_empty) {
                item.link = doc.link_or_pubmed();
            }
        }

        tracing::info!(
            documents = documents.len(),
            summaries = results.len(),
            "reference lookup complete"
        );
        Ok(RagAnswer { results, documents })
    }

    /// Explain `term` and summarize what the latest retrieved literature says.
    #[tracing::instrument(name = "literature_digest", skip(self))]
    pub async fn digest(&self, term: &str) -> Result<LiteratureDigest, RagError> {
        let retrieval = self.retriever.find_similar(term, self.top_k).await?;
        let references = retrieval.studies;

        let context = if references.is_empty() {
            "(no documents retrieved)".to_string()
        } else {
            format_documents(&references, self.per_field_chars)
        };
        let request = self.settings.request(
            Some(DIGEST_SYSTEM_PROMPT),
            format!("TERM:\n{term}\n\nCONTEXT:\n{context}"),
        );
        let response = self.llm.complete(&request).await?;

        let reply: DigestReply = match extract_json(&response.content) {
            Some(json) => serde_json::from_str(json).map_err(|e| RagError::Parse(e.to_string()))?,
            None => DigestReply {
                term_summary: response.content.trim().to_string(),
                latest_findings: String::new(),
            },
        };

        Ok(LiteratureDigest {
            term: term.to_string(),
            term_summary: reply.term_summary,
            latest_findings: reply.latest_findings,
            references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::testing::{ScriptedProvider, settings};
    use crate::retrieval::retriever::testing::retriever;

    fn doc(pmid: u64, title: &str, score: f32) -> Study {
        Study {
            pmid: Some(pmid),
            title: title.to_string(),
            abstract_text: Some(format!("Abstract of {title}.")),
            score: Some(score),
            ..Default::default()
        }
    }

    fn service(docs: Vec<Study>, provider: ScriptedProvider) -> RagService {
        RagService::new(
            Arc::new(retriever(docs)),
            Arc::new(BoxLlmProvider::new(provider)),
            settings(),
            3,
            1000,
        )
    }

    #[test]
    fn format_documents_blocks() {
        let docs = vec![doc(1, "First", 0.9), doc(2, "Second", 0.8)];
        let out = format_documents(&docs, 1000);
        assert_eq!(
            out,
            "[1]\nTITLE: First\nURL: https://pubmed.ncbi.nlm.nih.gov/1/\nABSTRACT: Abstract of First.\
             \n\n---\n\n\
             [2]\nTITLE: Second\nURL: https://pubmed.ncbi.nlm.nih.gov/2/\nABSTRACT: Abstract of Second."
        );
    }

    #[test]
    fn format_documents_clips_fields() {
        let docs = vec![Study {
            title: "abcdef".into(),
            abstract_text: Some("0123456789".into()),
            ..Default::default()
        }];
        let out = format_documents(&docs, 3);
        assert_eq!(out, "[1]\nTITLE: abc\nABSTRACT: 012");
    }

    #[test]
    fn extract_json_variants() {
        assert_eq!(extract_json("[1, 2]"), Some("[1, 2]"));
        assert_eq!(extract_json("```json\n[{\"a\":1}]\n```"), Some("[{\"a\":1}]"));
        assert_eq!(
            extract_json("Here you go: {\"k\": \"v\"} hope it helps"),
            Some("{\"k\": \"v\"}")
        );
        assert_eq!(extract_json("no json here"), None);
    }

    #[tokio::test]
    async fn ask_pairs_summaries_with_documents() {
        let reply = r#"```json
[
  {"title": "First", "summary": "It studies one.", "link": null},
  {"title": "Second", "summary": "It studies two.", "link": "https://x.org/2"}
]
```"#;
        let rag = service(
            vec![doc(1, "First", 0.91), doc(2, "Second", 0.72)],
            ScriptedProvider::new(vec![reply]),
        );

        let answer = rag.ask("what about one?", None).await.unwrap();
        assert_eq!(answer.documents.len(), 2);
        assert_eq!(answer.results.len(), 2);
        assert_eq!(
            answer.results[0].link.as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/1/")
        );
        assert_eq!(answer.results[1].link.as_deref(), Some("https://x.org/2"));
        assert_eq!(
            answer.results[1].reference.as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/2/")
        );
        assert_eq!(answer.results[0].score, Some(0.91));
    }

    #[tokio::test]
    async fn ask_sends_context_and_question() {
        let provider = ScriptedProvider::new(vec!["[]"]);
        let seen = provider.seen.clone();
        let rag = service(vec![doc(5, "Fifth", 0.5)], provider);
        rag.ask("my question", None).await.unwrap();

        let seen = seen.lock().unwrap();
        let user = &seen[0].messages[0].content;
        assert!(user.starts_with("CONTEXT:\n[1]\nTITLE: Fifth"));
        assert!(user.ends_with("\n\nUSER QUESTION:\nmy question"));
        assert_eq!(seen[0].system.as_deref(), Some(SUMMARY_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn ask_without_documents_skips_llm() {
        let rag = service(vec![], ScriptedProvider::failing("must not be called"));
        let answer = rag.ask("anything", None).await.unwrap();
        assert!(answer.results.is_empty());
        assert!(answer.documents.is_empty());
    }

    #[tokio::test]
    async fn ask_rejects_non_json_reply() {
        let rag = service(
            vec![doc(1, "First", 0.9)],
            ScriptedProvider::new(vec!["Sorry, I cannot help."]),
        );
        assert!(matches!(rag.ask("q", None).await, Err(RagError::Parse(_))));
    }

    #[tokio::test]
    async fn digest_parses_object() {
        let reply = r#"{"term_summary": "CRISPR edits genes.", "latest_findings": "[1] shows X."}"#;
        let rag = service(vec![doc(9, "Ninth", 0.6)], ScriptedProvider::new(vec![reply]));
        let digest = rag.digest("CRISPR").await.unwrap();
        assert_eq!(digest.term, "CRISPR");
        assert_eq!(digest.term_summary, "CRISPR edits genes.");
        assert_eq!(digest.latest_findings, "[1] shows X.");
        assert_eq!(digest.references.len(), 1);
    }

    #[tokio::test]
    async fn digest_falls_back_to_plain_text() {
        let rag = service(vec![], ScriptedProvider::new(vec!["Just prose."]));
        let digest = rag.digest("term").await.unwrap();
        assert_eq!(digest.term_summary, "Just prose.");
        assert!(digest.latest_findings.is_empty());
    }
}
