//! efetch XML parsing.
//!
//! Walks the document with a streaming reader and keeps the element path,
//! collecting the text of every descendant for the fields it cares about.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use rmai_types::error::IngestError;
use rmai_types::study::PubmedArticle;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Two-digit month from PubMed's month field.
///
/// Blank → `current_month`; `Jan`..`Dec` → `01`..`12`; numbers are zero
/// padded; anything else → `01`.
pub fn month_norm(month: &str, current_month: u32) -> String {
    let month = month.trim();
    if month.is_empty() {
        return format!("{current_month:02}");
    }
    if let Some(i) = MONTHS.iter().position(|m| *m == month) {
        return format!("{:02}", i + 1);
    }
    match month.parse::<u32>() {
        Ok(n) => format!("{n:02}"),
        Err(_) => "01".to_string(),
    }
}

#[derive(Default)]
struct DateParts {
    year: String,
    month: String,
    day: String,
}

#[derive(Default)]
struct ArticleBuilder {
    pmid: String,
    title: String,
    abstract_parts: Vec<String>,
    abstract_label: Option<String>,
    abstract_buf: String,
    article_date: DateParts,
    pub_date: DateParts,
    authors: Vec<String>,
    collective: String,
    last_name: String,
    initials: String,
}

impl ArticleBuilder {
    fn finish_abstract_part(&mut self) {
        let text = self.abstract_buf.trim();
        if !text.is_empty() {
            let part = match self.abstract_label.take() {
                Some(label) => format!("{label}: {text}"),
                None => text.to_string(),
            };
            self.abstract_parts.push(part);
        }
        self.abstract_buf.clear();
        self.abstract_label = None;
    }

    fn finish_author(&mut self) {
        let collective = self.collective.trim();
        if !collective.is_empty() {
            self.authors.push(collective.to_string());
        } else {
            let name = [self.last_name.trim(), self.initials.trim()]
                .iter()
                .filter(|p| !p.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            if !name.is_empty() {
                self.authors.push(name);
            }
        }
        self.collective.clear();
        self.last_name.clear();
        self.initials.clear();
    }

    /// `None` when pmid, title or year is missing.
    fn build(self, current_month: u32) -> Option<PubmedArticle> {
        let pick = |a: &str, b: &str| -> String {
            let a = a.trim();
            if a.is_empty() { b.trim().to_string() } else { a.to_string() }
        };
        let year = pick(&self.article_date.year, &self.pub_date.year);
        if year.is_empty() {
            return None;
        }
        let month = pick(&self.article_date.month, &self.pub_date.month);
        let day = pick(&self.article_date.day, &self.pub_date.day);
        let day = if day.is_empty() { "01".to_string() } else { format!("{day:0>2}") };

        let pmid = self.pmid.trim().parse::<u64>().ok()?;
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let abstract_text = Some(self.abstract_parts.join("\n")).filter(|a| !a.is_empty());
        Some(PubmedArticle {
            pmid,
            title,
            abstract_text,
            authors: self.authors,
            pub_date: format!("{year}-{}-{day}", month_norm(&month, current_month)),
        })
    }
}

fn ends_with(path: &[String], tail: &[&str]) -> bool {
    path.len() >= tail.len() && path[path.len() - tail.len()..].iter().zip(tail).all(|(a, b)| a == b)
}

fn contains(path: &[String], seq: &[&str]) -> bool {
    path.windows(seq.len())
        .any(|w| w.iter().zip(seq).all(|(a, b)| a == b))
}

fn label_of(start: &BytesStart<'_>) -> Option<String> {
    let attr = start.try_get_attribute("Label").ok().flatten()?;
    let value = attr.unescape_value().ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn append_text(builder: &mut ArticleBuilder, path: &[String], text: &str) {
    if ends_with(path, &["MedlineCitation", "PMID"]) && builder.pmid.is_empty() {
        builder.pmid.push_str(text);
    } else if contains(path, &["Article", "ArticleTitle"]) {
        builder.title.push_str(text);
    } else if contains(path, &["Article", "Abstract", "AbstractText"]) {
        builder.abstract_buf.push_str(text);
    } else if contains(path, &["Article", "AuthorList", "Author"]) {
        if contains(path, &["Author", "CollectiveName"]) {
            builder.collective.push_str(text);
        } else if ends_with(path, &["Author", "LastName"]) {
            builder.last_name.push_str(text);
        } else if ends_with(path, &["Author", "Initials"]) {
            builder.initials.push_str(text);
        }
    } else if contains(path, &["Article", "ArticleDate"]) {
        set_date_part(&mut builder.article_date, path, text);
    } else if contains(path, &["JournalIssue", "PubDate"]) {
        set_date_part(&mut builder.pub_date, path, text);
    }
}

/// Only the first date element of each kind counts.
fn set_date_part(date: &mut DateParts, path: &[String], text: &str) {
    let slot = match path.last().map(String::as_str) {
        Some("Year") => &mut date.year,
        Some("Month") => &mut date.month,
        Some("Day") => &mut date.day,
        _ => return,
    };
    if slot.trim().is_empty() {
        slot.push_str(text);
    }
}

/// Parse a `PubmedArticleSet` document. Articles without pmid, title or
/// publication year are skipped.
pub fn parse_articles(xml: &str, current_month: u32) -> Result<Vec<PubmedArticle>, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut builder: Option<ArticleBuilder> = None;
    let mut articles = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| IngestError::Parse(format!("invalid efetch XML at {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                path.push(name);
                if ends_with(&path, &["PubmedArticle"]) {
                    builder = Some(ArticleBuilder::default());
                } else if let Some(b) = builder.as_mut() {
                    if ends_with(&path, &["Article", "Abstract", "AbstractText"]) {
                        b.abstract_buf.clear();
                        b.abstract_label = label_of(&start);
                    }
                }
            }
            Event::End(_) => {
                if let Some(b) = builder.as_mut() {
                    if ends_with(&path, &["Article", "Abstract", "AbstractText"]) {
                        b.finish_abstract_part();
                    } else if ends_with(&path, &["Article", "AuthorList", "Author"]) {
                        b.finish_author();
                    }
                }
                if ends_with(&path, &["PubmedArticle"]) {
                    if let Some(article) = builder.take().and_then(|b| b.build(current_month)) {
                        articles.push(article);
                    }
                }
                path.pop();
            }
            Event::Text(text) => {
                if let Some(b) = builder.as_mut() {
                    let text = text
                        .unescape()
                        .map_err(|e| IngestError::Parse(format!("bad text in efetch XML: {e}")))?;
                    append_text(b, &path, &text);
                }
            }
            Event::CData(data) => {
                if let Some(b) = builder.as_mut() {
                    append_text(b, &path, &String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="PubMed-not-MEDLINE" Owner="NLM">
      <PMID Version="1">38000001</PMID>
      <Article PubModel="Electronic">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <PubDate><Year>2023</Year><Month>Dec</Month></PubDate>
          </JournalIssue>
        </Journal>
        <ArticleTitle>The <i>TP53</i> gene &amp; cancer.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">p53 is a tumour suppressor.</AbstractText>
          <AbstractText Label="RESULTS">Loss of <sup>p53</sup> drives growth.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author><LastName>Smith</LastName><ForeName>Jane</ForeName><Initials>J</Initials></Author>
          <Author><CollectiveName>TP53 Consortium</CollectiveName></Author>
        </AuthorList>
        <ArticleDate DateType="Electronic"><Year>2024</Year><Month>01</Month><Day>5</Day></ArticleDate>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="Cites"><PMID Version="1">12345</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000002</PMID>
      <Article>
        <Journal><JournalIssue><PubDate><Year>2024</Year><Month>Mar</Month></PubDate></JournalIssue></Journal>
        <ArticleTitle>No abstract here</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000003</PMID>
      <Article>
        <Journal><JournalIssue><PubDate><MedlineDate>2024 Spring</MedlineDate></PubDate></JournalIssue></Journal>
        <ArticleTitle>Missing year</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_month_norm() {
        assert_eq!(month_norm("", 8), "08");
        assert_eq!(month_norm("  ", 11), "11");
        assert_eq!(month_norm("Feb", 8), "02");
        assert_eq!(month_norm("7", 8), "07");
        assert_eq!(month_norm("12", 8), "12");
        assert_eq!(month_norm("Spring", 8), "01");
    }

    #[test]
    fn test_parse_full_article() {
        let articles = parse_articles(SAMPLE, 8).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.pmid, 38000001);
        assert_eq!(first.title, "The TP53 gene & cancer.");
        assert_eq!(
            first.abstract_text.as_deref(),
            Some("BACKGROUND: p53 is a tumour suppressor.\nRESULTS: Loss of p53 drives growth.")
        );
        assert_eq!(first.authors, vec!["Smith J", "TP53 Consortium"]);
        // ArticleDate wins over the journal issue date.
        assert_eq!(first.pub_date, "2024-01-05");
    }

    #[test]
    fn test_journal_date_fallback_and_no_abstract() {
        let articles = parse_articles(SAMPLE, 8).unwrap();
        let second = &articles[1];
        assert_eq!(second.pmid, 38000002);
        assert!(second.abstract_text.is_none());
        assert_eq!(second.pub_date, "2024-03-01");
        assert!(second.authors.is_empty());
    }

    #[test]
    fn test_empty_set() {
        let articles = parse_articles("<PubmedArticleSet></PubmedArticleSet>", 1).unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err = parse_articles("<PubmedArticleSet><PubmedArticle></Oops>", 1).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }
}
