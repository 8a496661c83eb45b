//! Meeting context assembly for LLM prompts.
//!
//! Combines the live transcript, retrieved studies, and earlier Q&A into a
//! single text block with `=== SECTION ===` headers. When the combined text
//! is too long, sections are kept in priority order and the first one that
//! overflows is cut with a `[Section truncated]` marker.

use std::collections::HashSet;

use rmai_types::config::ContextSection;
use rmai_types::llm::Message;
use rmai_types::study::Study;

use crate::text::{char_len, clip_with_ellipsis, take_chars};

pub const TRANSCRIPTION_HEADER: &str = "=== MEETING TRANSCRIPTION ===";
pub const STUDIES_HEADER: &str = "=== RELEVANT STUDIES ===";
pub const QUERIES_HEADER: &str = "=== PREVIOUS QUERIES ===";
pub const ANSWERS_HEADER: &str = "=== PREVIOUS ANSWERS (Summary) ===";
pub const CONVERSATION_HEADER: &str = "=== CONVERSATION HISTORY ===";

const MAX_STUDIES: usize = 5;
const STUDY_ABSTRACT_CHARS: usize = 300;
const MAX_QUERIES: usize = 5;
const MAX_ANSWERS: usize = 3;
const ANSWER_CHARS: usize = 200;
const MESSAGE_CHARS: usize = 500;

/// A section is only cut (instead of dropped) when more than this many
/// characters of budget remain.
const MIN_TRUNCATION_ROOM: usize = 100;
/// Characters reserved for the truncation marker.
const TRUNCATION_SLACK: usize = 50;

/// Default section order for [`prioritize_context`].
pub const DEFAULT_SECTION_PRIORITY: [&str; 4] = [
    "MEETING TRANSCRIPTION",
    "RELEVANT STUDIES",
    "PREVIOUS QUERIES",
    "PREVIOUS ANSWERS",
];

/// Header name of a section, as matched by [`prioritize_context`].
pub fn section_label(section: ContextSection) -> &'static str {
    match section {
        ContextSection::Transcription => "MEETING TRANSCRIPTION",
        ContextSection::Studies => "RELEVANT STUDIES",
        ContextSection::Queries => "PREVIOUS QUERIES",
        ContextSection::Answers => "PREVIOUS ANSWERS",
    }
}

/// Everything that can go into a meeting context. Empty fields are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextInputs<'a> {
    pub transcription: Option<&'a str>,
    pub studies: &'a [Study],
    pub past_queries: &'a [String],
    pub past_answers: &'a [String],
    pub previous_studies: &'a [Study],
}

/// Mark studies that were already surfaced earlier in the meeting.
///
/// A study counts as seen when its PMID or its exact title appears among
/// `previous`. Returns copies; the input is left untouched.
pub fn track_previous_studies(current: &[Study], previous: &[Study]) -> Vec<Study> {
    if previous.is_empty() {
        return current.to_vec();
    }

    let previous_pmids: HashSet<u64> = previous.iter().filter_map(|s| s.pmid).collect();
    let previous_titles: HashSet<&str> = previous
        .iter()
        .map(|s| s.title.as_str())
        .filter(|t| !t.is_empty())
        .collect();

    current
        .iter()
        .map(|study| {
            let mut study = study.clone();
            let seen_pmid = study.pmid.is_some_and(|p| previous_pmids.contains(&p));
            let seen_title =
                !study.title.is_empty() && previous_titles.contains(study.title.as_str());
            if seen_pmid || seen_title {
                study.previously_retrieved = true;
            }
            study
        })
        .collect()
}

fn transcription_section(transcription: &str, max_chars: usize) -> String {
    format!(
        "{TRANSCRIPTION_HEADER}\n{}\n",
        take_chars(transcription, max_chars)
    )
}

fn studies_section(studies: &[Study]) -> String {
    let mut out = format!("{STUDIES_HEADER}\n");
    for (i, study) in studies.iter().take(MAX_STUDIES).enumerate() {
        let prefix = if study.previously_retrieved {
            "[CACHED] "
        } else {
            ""
        };
        let title = if study.title.is_empty() {
            "Untitled"
        } else {
            study.title.as_str()
        };
        out.push_str(&format!("[{}] {prefix}{title}\n", i + 1));
        if !study.authors.is_empty() {
            out.push_str(&format!("    Authors: {}\n", study.authors.join(", ")));
        }
        if let Some(pmid) = study.pmid {
            out.push_str(&format!("    PMID: {pmid}\n"));
        }
        if let Some(score) = study.score.filter(|s| *s != 0.0) {
            out.push_str(&format!("    Relevance: {score:.3}\n"));
        }
        let abstract_text = study.abstract_text.as_deref().unwrap_or_default();
        if !abstract_text.is_empty() {
            out.push_str(&format!(
                "    Abstract: {}...\n",
                take_chars(abstract_text, STUDY_ABSTRACT_CHARS)
            ));
        }
        out.push('\n');
    }
    out
}

fn queries_section(queries: &[String]) -> String {
    let mut out = format!("{QUERIES_HEADER}\n");
    let skip = queries.len().saturating_sub(MAX_QUERIES);
    for query in &queries[skip..] {
        out.push_str(&format!("• {query}\n"));
    }
    out
}

fn answers_section(answers: &[String]) -> String {
    let mut out = format!("{ANSWERS_HEADER}\n");
    let skip = answers.len().saturating_sub(MAX_ANSWERS);
    for answer in &answers[skip..] {
        out.push_str(&format!("• {}\n\n", clip_with_ellipsis(answer, ANSWER_CHARS)));
    }
    out
}

/// Build the meeting context from its parts.
///
/// Sections are appended in `priority_order` while the total stays within
/// `4 * max_chars`. The first section that would overflow is cut (when more
/// than 100 characters of room remain) and nothing after it is added.
pub fn create_context(
    inputs: ContextInputs<'_>,
    max_chars: usize,
    priority_order: &[ContextSection],
) -> String {
    let render = |section: ContextSection| -> Option<String> {
        match section {
            ContextSection::Transcription => inputs
                .transcription
                .filter(|t| !t.is_empty())
                .map(|t| transcription_section(t, max_chars)),
            ContextSection::Studies if !inputs.studies.is_empty() => {
                let marked = track_previous_studies(inputs.studies, inputs.previous_studies);
                Some(studies_section(&marked))
            }
            ContextSection::Queries if !inputs.past_queries.is_empty() => {
                Some(queries_section(inputs.past_queries))
            }
            ContextSection::Answers if !inputs.past_answers.is_empty() => {
                Some(answers_section(inputs.past_answers))
            }
            _ => None,
        }
    };

    let max_total = max_chars * 4;
    let mut parts: Vec<String> = Vec::new();
    let mut total = 0usize;

    for section in priority_order {
        let Some(text) = render(*section) else {
            continue;
        };
        let len = char_len(&text);
        if total + len <= max_total {
            parts.push(text);
            total += len;
        } else {
            let remaining = max_total - total;
            if remaining > MIN_TRUNCATION_ROOM {
                let kept = take_chars(&text, remaining - TRUNCATION_SLACK);
                parts.push(format!("{kept}\n[Section truncated]\n"));
            }
            break;
        }
    }

    parts.join("\n")
}

/// Format recent conversation turns as `ROLE: content` lines.
pub fn create_conversation_context(messages: &[Message], max_messages: usize) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let mut out = format!("{CONVERSATION_HEADER}\n");
    let skip = messages.len().saturating_sub(max_messages);
    for message in &messages[skip..] {
        let role = message.role.to_string().to_uppercase();
        let content = clip_with_ellipsis(&message.content, MESSAGE_CHARS);
        out.push_str(&format!("{role}: {content}\n\n"));
    }
    out
}

/// Re-order and trim an already assembled context to fit `max_chars`.
///
/// Text is returned unchanged when it already fits. Otherwise it is split
/// on `===` header lines; sections are matched against `priority_order` by
/// name prefix, so `PREVIOUS ANSWERS` selects `PREVIOUS ANSWERS (Summary)`.
/// Sections not named in the order are dropped.
pub fn prioritize_context(full: &str, priority_order: &[&str], max_chars: usize) -> String {
    if char_len(full) <= max_chars {
        return full.to_string();
    }

    let order: &[&str] = if priority_order.is_empty() {
        &DEFAULT_SECTION_PRIORITY
    } else {
        priority_order
    };

    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    for line in full.split('\n') {
        if line.starts_with("===") {
            let name = line.trim_matches(|c| c == '=' || c == ' ').to_string();
            sections.push((name, vec![line]));
        } else if let Some((_, lines)) = sections.last_mut() {
            lines.push(line);
        }
    }

    let mut kept: Vec<String> = Vec::new();
    let mut count = 0usize;
    let mut used = vec![false; sections.len()];

    for wanted in order {
        let found = sections
            .iter()
            .enumerate()
            .find(|(i, (name, _))| !used[*i] && name.starts_with(wanted));
        let Some((idx, (_, lines))) = found else {
            continue;
        };
        used[idx] = true;

        let text = lines.join("\n");
        let len = char_len(&text);
        if count + len <= max_chars {
            kept.push(text);
            count += len;
        } else {
            let remaining = max_chars - count;
            if remaining > MIN_TRUNCATION_ROOM {
                let cut = take_chars(&text, remaining - TRUNCATION_SLACK);
                kept.push(format!("{cut}\n[Section truncated]"));
            }
            break;
        }
    }

    kept.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmai_types::llm::MessageRole;

    fn study(pmid: u64, title: &str) -> Study {
        Study {
            pmid: Some(pmid),
            title: title.to_string(),
            abstract_text: Some("An abstract about mice.".to_string()),
            authors: vec!["Smith J".to_string(), "Doe A".to_string()],
            score: Some(0.87654),
            ..Default::default()
        }
    }

    #[test]
    fn track_previous_marks_by_pmid_or_title() {
        let current = vec![study(1, "A"), study(2, "B"), study(3, "C")];
        let previous = vec![study(1, "Other"), study(99, "C")];

        let marked = track_previous_studies(&current, &previous);
        assert!(marked[0].previously_retrieved);
        assert!(!marked[1].previously_retrieved);
        assert!(marked[2].previously_retrieved);
        // Input untouched.
        assert!(!current[0].previously_retrieved);
    }

    #[test]
    fn track_previous_with_no_history_is_identity() {
        let current = vec![study(1, "A")];
        assert_eq!(track_previous_studies(&current, &[]), current);
    }

    #[test]
    fn create_context_formats_all_sections() {
        let studies = vec![study(42, "Gut microbiome")];
        let queries = vec!["what is p53?".to_string()];
        let answers = vec!["p53 is a tumor suppressor.".to_string()];
        let inputs = ContextInputs {
            transcription: Some("We discussed p53."),
            studies: &studies,
            past_queries: &queries,
            past_answers: &answers,
            previous_studies: &[],
        };

        let ctx = create_context(inputs, 2000, &ContextSection::DEFAULT_ORDER);
        assert!(ctx.starts_with("=== MEETING TRANSCRIPTION ===\nWe discussed p53.\n"));
        assert!(ctx.contains("[1] Gut microbiome\n"));
        assert!(ctx.contains("    Authors: Smith J, Doe A\n"));
        assert!(ctx.contains("    PMID: 42\n"));
        assert!(ctx.contains("    Relevance: 0.877\n"));
        assert!(ctx.contains("    Abstract: An abstract about mice....\n"));
        assert!(ctx.contains("=== PREVIOUS QUERIES ===\n• what is p53?\n"));
        assert!(ctx.contains("=== PREVIOUS ANSWERS (Summary) ===\n• p53 is a tumor suppressor.\n"));

        let t = ctx.find("MEETING TRANSCRIPTION").unwrap();
        let s = ctx.find("RELEVANT STUDIES").unwrap();
        let q = ctx.find("PREVIOUS QUERIES").unwrap();
        assert!(t < s && s < q);
    }

    #[test]
    fn create_context_follows_priority_order() {
        let queries = vec!["q1".to_string()];
        let inputs = ContextInputs {
            transcription: Some("talk"),
            past_queries: &queries,
            ..Default::default()
        };
        let ctx = create_context(
            inputs,
            2000,
            &[ContextSection::Queries, ContextSection::Transcription],
        );
        assert!(ctx.find("PREVIOUS QUERIES").unwrap() < ctx.find("MEETING TRANSCRIPTION").unwrap());
    }

    #[test]
    fn create_context_marks_cached_studies() {
        let studies = vec![study(7, "Seen before")];
        let previous = vec![study(7, "Seen before")];
        let inputs = ContextInputs {
            studies: &studies,
            previous_studies: &previous,
            ..Default::default()
        };
        let ctx = create_context(inputs, 2000, &ContextSection::DEFAULT_ORDER);
        assert!(ctx.contains("[1] [CACHED] Seen before"));
    }

    #[test]
    fn create_context_limits_studies_queries_answers() {
        let studies: Vec<Study> = (1..=8).map(|i| study(i, &format!("S{i}"))).collect();
        let queries: Vec<String> = (1..=7).map(|i| format!("query {i}")).collect();
        let answers: Vec<String> = (1..=4).map(|i| format!("answer {i}")).collect();
        let inputs = ContextInputs {
            studies: &studies,
            past_queries: &queries,
            past_answers: &answers,
            ..Default::default()
        };
        let ctx = create_context(inputs, 2000, &ContextSection::DEFAULT_ORDER);
        assert!(ctx.contains("[5] S5"));
        assert!(!ctx.contains("[6] S6"));
        assert!(!ctx.contains("query 2\n"));
        assert!(ctx.contains("query 3\n") && ctx.contains("query 7\n"));
        assert!(!ctx.contains("answer 1"));
        assert!(ctx.contains("answer 2") && ctx.contains("answer 4"));
    }

    #[test]
    fn create_context_abbreviates_long_answers() {
        let answers = vec!["x".repeat(250)];
        let inputs = ContextInputs {
            past_answers: &answers,
            ..Default::default()
        };
        let ctx = create_context(inputs, 2000, &ContextSection::DEFAULT_ORDER);
        assert!(ctx.contains(&format!("• {}...\n", "x".repeat(200))));
        assert!(!ctx.contains(&"x".repeat(201)));
    }

    #[test]
    fn create_context_truncates_overflowing_section() {
        let transcript = "t".repeat(100);
        let queries: Vec<String> = (0..5).map(|_| "q".repeat(200)).collect();
        let inputs = ContextInputs {
            transcription: Some(&transcript),
            past_queries: &queries,
            ..Default::default()
        };
        // Total budget is 4 * 100 = 400 characters.
        let ctx = create_context(inputs, 100, &ContextSection::DEFAULT_ORDER);
        assert!(ctx.contains("[Section truncated]"));
        assert!(char_len(&ctx) <= 400 + 50);
    }

    #[test]
    fn create_context_empty_inputs() {
        let ctx = create_context(ContextInputs::default(), 2000, &ContextSection::DEFAULT_ORDER);
        assert!(ctx.is_empty());
    }

    #[test]
    fn conversation_context_formats_and_limits() {
        assert_eq!(create_conversation_context(&[], 10), "");

        let messages: Vec<Message> = (0..12)
            .map(|i| Message {
                role: if i % 2 == 0 {
                    MessageRole::User
                } else {
                    MessageRole::Assistant
                },
                content: format!("m{i}"),
            })
            .collect();
        let ctx = create_conversation_context(&messages, 10);
        assert!(ctx.starts_with("=== CONVERSATION HISTORY ===\n"));
        assert!(!ctx.contains("m1\n"));
        assert!(ctx.contains("USER: m2\n\n"));
        assert!(ctx.contains("ASSISTANT: m11\n\n"));
    }

    #[test]
    fn conversation_context_truncates_long_content() {
        let messages = vec![Message::user("y".repeat(600))];
        let ctx = create_conversation_context(&messages, 10);
        assert!(ctx.contains(&format!("USER: {}...", "y".repeat(500))));
    }

    #[test]
    fn section_labels_match_headers() {
        for section in ContextSection::DEFAULT_ORDER {
            let label = section_label(section);
            let header = [TRANSCRIPTION_HEADER, STUDIES_HEADER, QUERIES_HEADER, ANSWERS_HEADER]
                .into_iter()
                .find(|h| h.contains(label));
            assert!(header.is_some(), "no header for {label}");
        }
    }

    #[test]
    fn prioritize_returns_short_context_unchanged() {
        let ctx = "=== MEETING TRANSCRIPTION ===\nhello\n";
        assert_eq!(prioritize_context(ctx, &[], 8000), ctx);
    }

    #[test]
    fn prioritize_keeps_high_priority_sections_within_limit() {
        let transcript = "word ".repeat(100);
        let queries = vec!["q".to_string(); 5];
        let answers = vec!["a".repeat(150); 3];
        let studies = vec![study(1, "S1"), study(2, "S2")];
        let full = create_context(
            ContextInputs {
                transcription: Some(&transcript),
                studies: &studies,
                past_queries: &queries,
                past_answers: &answers,
                previous_studies: &[],
            },
            2000,
            &ContextSection::DEFAULT_ORDER,
        );
        assert!(char_len(&full) > 300);

        let out = prioritize_context(&full, &[], 300);
        assert!(char_len(&out) <= 350);
        assert!(out.starts_with("=== MEETING TRANSCRIPTION ==="));
        assert!(out.contains("[Section truncated]"));
    }

    #[test]
    fn prioritize_matches_section_by_prefix() {
        let full = format!(
            "{ANSWERS_HEADER}\n• answer\n\n{QUERIES_HEADER}\n{}\n",
            "• q\n".repeat(40)
        );
        let out = prioritize_context(&full, &["PREVIOUS ANSWERS"], 120);
        assert!(out.starts_with(ANSWERS_HEADER));
        assert!(!out.contains(QUERIES_HEADER));
    }
}
