//! Short HTML excerpts of posts for feed items.
//!
//! ```text
//! raw body ─► first N sentences (or first 50 words) ─► markdown ─► absolute hrefs ─► + continue link
//! ```

use crate::content::{EntityKind, Post, markdown};

/// Words taken when the body has no sentence at all.
pub const FALLBACK_WORDS: usize = 50;

const ELLIPSIS: &str = "...";

/// Sentences of `text`, at most `max`.
///
/// `.`, `!` or `?` followed by whitespace or the end of the text closes a
/// sentence, unless the word it ends already contains a `.` (`i.e.`, `U.S.`).
/// Text after the last terminator counts as a final sentence.
pub fn extract_sentences(text: &str, max: usize) -> Vec<&str> {
    scan_sentences(text, max).0
}

/// Sentences of `text`, at most `max`, and the byte offset where scanning stopped.
fn scan_sentences(text: &str, max: usize) -> (Vec<&str>, usize) {
    let mut sentences = Vec::new();
    if max == 0 {
        return (sentences, 0);
    }

    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        if chars.peek().is_some_and(|&(_, next)| !next.is_whitespace()) {
            continue;
        }

        let word = text[start..idx]
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default();
        if word.contains('.') {
            continue;
        }

        let end = idx + ch.len_utf8();
        let sentence = text[start..end].trim();
        start = end;
        if !sentence.is_empty() {
            sentences.push(sentence);
            if sentences.len() >= max {
                return (sentences, end);
            }
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    (sentences, text.len())
}

/// First `n` words of `text`, and whether any were left out.
pub fn first_words(text: &str, n: usize) -> (String, bool) {
    let mut words = text.split_whitespace();
    let taken: Vec<&str> = words.by_ref().take(n).collect();
    (taken.join(" "), words.next().is_some())
}

/// Markdown excerpt of `text` with an ellipsis when anything was cut.
pub fn excerpt_markdown(text: &str, max_sentences: usize) -> String {
    let source = text.trim();
    let (sentences, consumed) = scan_sentences(source, max_sentences);

    if sentences.is_empty() {
        let (mut words, truncated) = first_words(source, FALLBACK_WORDS);
        if truncated {
            words.push_str(ELLIPSIS);
        }
        return words;
    }

    let mut excerpt = sentences.join(" ");
    if !source[consumed..].trim().is_empty() {
        let kept = excerpt.trim_end_matches(['.', '!', '?']).len();
        excerpt.truncate(kept);
        excerpt.push_str(ELLIPSIS);
    }
    excerpt
}

/// Site-relative `href="/..."` links made absolute.
pub fn absolute_hrefs(html: &str, base_url: &str) -> String {
    html.replace("href=\"/", &format!("href=\"{base_url}/"))
}

/// Feed item HTML: rendered excerpt plus a link to the full post.
pub fn excerpt_html(post: &Post, base_url: &str, continue_text: &str, max_sentences: usize) -> String {
    let source = excerpt_markdown(&post.raw_body, max_sentences);
    let html = absolute_hrefs(&markdown::render(&source), base_url);
    let link = format!("{base_url}{}", EntityKind::Post.uri(&post.id));
    format!("{html}<p><a href=\"{link}\">{continue_text}</a></p>")
}
