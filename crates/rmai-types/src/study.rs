//! PubMed study types.
//!
//! A [`Study`] is one retrieved abstract with its relevance score. A
//! [`StudyRecord`] is what the ingest pipeline writes into the vector index.

use serde::{Deserialize, Serialize};

/// Base URL for PubMed article pages.
pub const PUBMED_BASE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// Build the canonical PubMed link for a PMID.
pub fn pmid_link(pmid: u64) -> String {
    format!("{PUBMED_BASE_URL}/{pmid}/")
}

/// A study retrieved from the index (or produced by the ingest parser).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Study {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<u64>,
    pub title: String,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Cosine similarity to the query (higher is closer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Set when the study was already shown earlier in the same meeting.
    #[serde(default)]
    pub previously_retrieved: bool,
}

impl Study {
    /// The explicit link, or the PubMed page when only a PMID is known.
    pub fn link_or_pubmed(&self) -> Option<String> {
        self.link.clone().or_else(|| self.pmid.map(pmid_link))
    }

    /// Stable reference used to pair LLM output with its source document.
    pub fn reference(&self) -> Option<String> {
        self.link_or_pubmed()
            .or_else(|| self.pmid.map(|p| p.to_string()))
    }

    /// The text that gets embedded for this study.
    pub fn embedding_text(&self) -> String {
        let abstract_text = self.abstract_text.as_deref().unwrap_or_default();
        format!("{} {}", self.title, abstract_text).trim().to_string()
    }
}

/// A study as stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    /// Index primary key (the PMID as a string).
    pub id: String,
    pub pmid: u64,
    pub title: String,
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub pub_date: String,
    pub embedding_model: String,
}

impl From<StudyRecord> for Study {
    fn from(record: StudyRecord) -> Self {
        Study {
            pmid: Some(record.pmid),
            title: record.title,
            abstract_text: Some(record.abstract_text),
            authors: record.authors,
            pub_date: Some(record.pub_date),
            link: Some(pmid_link(record.pmid)),
            score: None,
            previously_retrieved: false,
        }
    }
}

/// A PubMed record as parsed from an efetch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubmedArticle {
    pub pmid: u64,
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
    /// `YYYY-MM-DD`.
    pub pub_date: String,
}

impl PubmedArticle {
    /// Index record for this article, or `None` when it has no abstract.
    pub fn into_record(self, embedding_model: &str) -> Option<StudyRecord> {
        let abstract_text = self.abstract_text.filter(|a| !a.trim().is_empty())?;
        Some(StudyRecord {
            id: self.pmid.to_string(),
            pmid: self.pmid,
            title: self.title,
            abstract_text,
            authors: self.authors,
            pub_date: self.pub_date,
            embedding_model: embedding_model.to_string(),
        })
    }
}

/// One LLM-written summary of a retrieved study.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub link: Option<String>,
    /// Link or PMID of the document this summary was generated from.
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub score: Option<f32>,
}

/// Output of the reference lookup: per-study summaries and the raw documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagAnswer {
    pub results: Vec<StudySummary>,
    pub documents: Vec<Study>,
}

/// A short literature overview for a term mentioned in the meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureDigest {
    pub term: String,
    pub term_summary: String,
    pub latest_findings: String,
    pub references: Vec<Study>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmid_link_format() {
        assert_eq!(pmid_link(12345), "https://pubmed.ncbi.nlm.nih.gov/12345/");
    }

    #[test]
    fn test_link_prefers_explicit_link() {
        let study = Study {
            pmid: Some(1),
            link: Some("https://example.org/a".to_string()),
            ..Default::default()
        };
        assert_eq!(study.link_or_pubmed().as_deref(), Some("https://example.org/a"));

        let study = Study {
            pmid: Some(7),
            ..Default::default()
        };
        assert_eq!(
            study.link_or_pubmed().as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/7/")
        );
        assert!(Study::default().reference().is_none());
    }

    #[test]
    fn test_embedding_text_joins_title_and_abstract() {
        let study = Study {
            title: "CRISPR screens".to_string(),
            abstract_text: Some("We screened.".to_string()),
            ..Default::default()
        };
        assert_eq!(study.embedding_text(), "CRISPR screens We screened.");

        let title_only = Study {
            title: "Only title".to_string(),
            ..Default::default()
        };
        assert_eq!(title_only.embedding_text(), "Only title");
    }

    #[test]
    fn test_study_serializes_abstract_field_name() {
        let study = Study {
            title: "T".to_string(),
            abstract_text: Some("A".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&study).unwrap();
        assert_eq!(json["abstract"], "A");
        assert_eq!(json["previously_retrieved"], false);
    }

    #[test]
    fn test_article_without_abstract_has_no_record() {
        let article = PubmedArticle {
            pmid: 5,
            title: "T".to_string(),
            abstract_text: Some("  ".to_string()),
            authors: vec![],
            pub_date: "2024-01-01".to_string(),
        };
        assert!(article.clone().into_record("m").is_none());

        let with_abstract = PubmedArticle {
            abstract_text: Some("Body".to_string()),
            ..article
        };
        let record = with_abstract.into_record("m").unwrap();
        assert_eq!(record.id, "5");
        assert_eq!(record.embedding_model, "m");
    }

    #[test]
    fn test_summary_reads_ref_key() {
        let summary: StudySummary =
            serde_json::from_str(r#"{"title":"t","summary":"s","ref":"123"}"#).unwrap();
        assert_eq!(summary.reference.as_deref(), Some("123"));
        assert!(summary.link.is_none());
    }
}
