//! Sentence-level content distillation.
//!
//! Raw blocks captured by [`crate::extract`] are filtered for boilerplate,
//! split into sentences, length-banded and deduplicated by
//! [`extract_content_sentences`]. [`pick_distinct_sentences`] then greedily
//! picks a diverse subset by significant-token overlap: a cheap stand-in for
//! maximal marginal relevance that runs in `O(n * tokens)`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::sanitize::clean_text;

/// Phrases that mark navigation, cookie, account and legal boilerplate.
pub const NOISE_PATTERNS: &[&str] = &[
    "javascript is disabled",
    "supported browsers",
    "start typing and press enter to search",
    "sign in",
    "log in",
    "cookie",
    "privacy policy",
    "subscribe to receive notifications",
    "newsletter",
    "the cloudflare blog",
];

/// Shortest sentence kept, in characters. Anything shorter is a fragment.
pub const MIN_SENTENCE_CHARS: usize = 35;
/// Longest sentence kept, in characters. Anything longer is usually
/// concatenated boilerplate.
pub const MAX_SENTENCE_CHARS: usize = 340;
/// A candidate is rejected when more than this share of its tokens were
/// already seen.
pub const MAX_TOKEN_OVERLAP: f64 = 0.65;
/// Number of distinct sentences selected for note synthesis.
pub const DEFAULT_PICK_COUNT: usize = 16;

/// Description length under which the summary borrows one more sentence.
const SHORT_DESCRIPTION_CHARS: usize = 90;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]{4,}").unwrap());

/// True when the text contains any boilerplate phrase (case-insensitive).
pub fn is_noise(text: &str) -> bool {
    let lower = text.to_lowercase();
    NOISE_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// Split on whitespace that follows `.`, `!` or `?`.
///
/// Each piece is passed through [`clean_text`]; empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut push = |piece: &str| {
        let cleaned = clean_text(piece);
        if !cleaned.is_empty() {
            sentences.push(cleaned);
        }
    };

    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            push(&text[start..idx]);

            let mut end = idx + ch.len_utf8();
            while let Some(&(next_idx, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                end = next_idx + next.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(ch);
    }
    push(&text[start..]);

    sentences
}

/// Turn raw blocks into candidate sentences.
///
/// Blocks are visited in the order description, paragraphs, list items.
/// Noisy blocks are skipped whole; surviving sentences must fall inside the
/// length band, must not end in a colon and must not be noisy themselves.
/// The result is deduplicated case-insensitively, first occurrence wins.
pub fn extract_content_sentences(description: &str, paragraphs: &[String], list_items: &[String]) -> Vec<String> {
    let blocks = std::iter::once(description)
        .chain(paragraphs.iter().map(String::as_str))
        .chain(list_items.iter().map(String::as_str));

    let mut seen = HashSet::new();
    let mut sentences = Vec::new();

    for block in blocks {
        if block.is_empty() || is_noise(block) {
            continue;
        }
        for sentence in split_sentences(block) {
            let chars = sentence.chars().count();
            if !(MIN_SENTENCE_CHARS..=MAX_SENTENCE_CHARS).contains(&chars) {
                continue;
            }
            if sentence.ends_with(':') || is_noise(&sentence) {
                continue;
            }
            if seen.insert(sentence.to_lowercase()) {
                sentences.push(sentence);
            }
        }
    }

    sentences
}

/// Lowercase alphabetic tokens of four or more letters.
pub fn significant_tokens(sentence: &str) -> HashSet<String> {
    let lower = sentence.to_lowercase();
    TOKEN_RE.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Greedily pick up to `count` sentences that add new vocabulary.
///
/// Walks `sentences` in order. A candidate without significant tokens is
/// skipped; otherwise it is accepted when at most [`MAX_TOKEN_OVERLAP`] of its
/// tokens were seen in earlier accepted sentences. Input order is kept and
/// the first of two near-duplicates always wins.
pub fn pick_distinct_sentences(sentences: &[String], count: usize) -> Vec<String> {
    let mut picked = Vec::new();
    let mut seen_tokens: HashSet<String> = HashSet::new();

    for sentence in sentences {
        if picked.len() >= count {
            break;
        }

        let tokens = significant_tokens(sentence);
        if tokens.is_empty() {
            continue;
        }

        let shared = tokens.iter().filter(|token| seen_tokens.contains(*token)).count();
        let overlap = shared as f64 / tokens.len() as f64;
        if overlap > MAX_TOKEN_OVERLAP {
            continue;
        }

        picked.push(sentence.clone());
        seen_tokens.extend(tokens);
    }

    picked
}

/// Choose the one-paragraph summary for a note.
pub fn choose_summary(description: &str, sentences: &[String], access_limited: bool) -> String {
    if access_limited {
        return "Content could not be fully fetched in this environment because the source requires \
                JavaScript/authenticated rendering. Add the post text manually."
            .to_string();
    }

    if !description.is_empty() && !is_noise(description) {
        if description.chars().count() < SHORT_DESCRIPTION_CHARS {
            let lower = description.to_lowercase();
            if let Some(extra) = sentences.iter().find(|s| s.to_lowercase() != lower) {
                return format!("{description} {extra}");
            }
        }
        return description.to_string();
    }

    sentences
        .first()
        .cloned()
        .unwrap_or_else(|| "Add a short summary of the source.".to_string())
}
