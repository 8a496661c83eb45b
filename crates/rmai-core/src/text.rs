//! Character-counted string helpers.
//!
//! All limits in this crate count `char`s, never bytes, so truncation can't
//! split a multi-byte code point.

/// First `max` characters of `s`.
pub fn take_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// `s` clipped to `max` characters, with `...` appended when clipped.
pub fn clip_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", take_chars(s, max))
    } else {
        s.to_string()
    }
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_chars_respects_code_points() {
        assert_eq!(take_chars("héllo", 2), "hé");
        assert_eq!(take_chars("abc", 10), "abc");
        assert_eq!(take_chars("abc", 0), "");
    }

    #[test]
    fn clip_adds_ellipsis_only_when_clipped() {
        assert_eq!(clip_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(clip_with_ellipsis("abc", 3), "abc");
    }
}
