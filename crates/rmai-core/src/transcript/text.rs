//! Text clean-up for streaming transcripts.

use crate::text::take_chars;

/// Sentence-ending punctuation.
fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

/// Concatenate hypothesis fragments, removing duplicated text at the seams.
///
/// For each non-empty trimmed part, the longest suffix of the accumulated
/// output (up to `max_overlap` chars) that equals a prefix of the part is
/// skipped before appending.
pub fn stitch_with_overlap<S: AsRef<str>>(parts: &[S], max_overlap: usize) -> String {
    let mut out = String::new();
    for part in parts {
        let part = part.as_ref().trim();
        if part.is_empty() {
            continue;
        }
        let out_len = out.chars().count();
        let part_len = part.chars().count();
        let mut k = out_len.min(part_len).min(max_overlap);
        while k > 0 && !out.ends_with(take_chars(part, k)) {
            k -= 1;
        }
        out.push_str(&part[take_chars(part, k).len()..]);
    }
    out
}

/// Ensure a space follows `.`, `!`, `?` and `…` unless whitespace already does.
pub fn normalize_punctuation_spacing(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if is_sentence_end(c) {
            match chars.peek() {
                Some(next) if next.is_whitespace() => {}
                _ => out.push(' '),
            }
        }
    }
    out
}

/// Insert a blank line after every `step`th sentence.
///
/// `start_count` is the number of sentences already emitted earlier in the
/// transcript, so breaks stay evenly spaced across chunks. A run of
/// punctuation (`?!`, `...`) counts as one sentence end. Returns the new
/// text and the updated sentence count.
pub fn insert_paragraph_breaks(text: &str, start_count: usize, step: usize) -> (String, usize) {
    let mut out = String::with_capacity(text.len() + 8);
    let mut count = start_count;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if is_sentence_end(c) && !chars.peek().copied().is_some_and(is_sentence_end) {
            count += 1;
            if step > 0 && count % step == 0 {
                out.push_str("\n\n");
            }
        }
    }
    (out, count)
}

/// Incremental diff between two successive full hypotheses.
///
/// When `cur` extends `prev`, only the new suffix is emitted. Otherwise the
/// hypothesis was rewritten and the whole of `cur` is emitted on its own
/// line. Returns `(emitted, new_prev)`.
pub fn incremental_suffix(prev: &str, cur: &str) -> (String, String) {
    match cur.strip_prefix(prev) {
        Some(suffix) => (suffix.to_string(), cur.to_string()),
        None => (format!("\n{cur}\n"), cur.to_string()),
    }
}
