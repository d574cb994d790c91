//! Search-term highlighting for rendered cells.
//!
//! [`highlight`] splits a cell's text into at most three borrowed segments
//! around the first case-insensitive occurrence of the term. Only the first
//! occurrence is marked; callers wanting every occurrence iterate over the
//! suffix themselves.

use serde::Serialize;

/// A borrowed slice of the input, flagged when it is the matched term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub is_match: bool,
}

impl<'a> Segment<'a> {
    fn plain(text: &'a str) -> Self {
        Self {
            text,
            is_match: false,
        }
    }
}

/// Find the first case-insensitive occurrence of `needle` in `haystack`.
///
/// Returns the byte range in `haystack`. Both ends always fall on char
/// boundaries of the original string, even when lowercasing changes the
/// byte length of a character.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }
    haystack.char_indices().find_map(|(start, _)| {
        match_len_at(&haystack[start..], &needle).map(|len| (start, start + len))
    })
}

/// Byte length of the prefix of `hay` that lowercases to exactly `needle`.
fn match_len_at(hay: &str, needle: &[char]) -> Option<usize> {
    let mut matched = 0;
    for (offset, ch) in hay.char_indices() {
        for lower in ch.to_lowercase() {
            if needle.get(matched) != Some(&lower) {
                return None;
            }
            matched += 1;
        }
        if matched == needle.len() {
            return Some(offset + ch.len_utf8());
        }
    }
    None
}

/// Case-insensitive substring test with the same semantics as
/// [`find_ignore_case`]. An empty needle never matches.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    find_ignore_case(haystack, needle).is_some()
}

/// Split `text` around the first case-insensitive occurrence of `term`.
///
/// A blank `term` or a term that does not occur yields a single plain
/// segment equal to `text`. Concatenating the segments always reproduces
/// `text` exactly.
pub fn highlight<'a>(text: &'a str, term: &str) -> Vec<Segment<'a>> {
    let term = term.trim();
    let Some((start, end)) = find_ignore_case(text, term) else {
        return vec![Segment::plain(text)];
    };

    let mut segments = Vec::with_capacity(3);
    if start > 0 {
        segments.push(Segment::plain(&text[..start]));
    }
    segments.push(Segment {
        text: &text[start..end],
        is_match: true,
    });
    if end < text.len() {
        segments.push(Segment::plain(&text[end..]));
    }
    segments
}

/// Render `text` with the first match of `term` wrapped in `open`/`close`.
pub fn mark(text: &str, term: &str, open: &str, close: &str) -> String {
    highlight(text, term)
        .into_iter()
        .map(|seg| {
            if seg.is_match {
                format!("{}{}{}", open, seg.text, close)
            } else {
                seg.text.to_string()
            }
        })
        .collect()
}
