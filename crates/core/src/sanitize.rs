//! Text normalization helpers shared by extraction, distillation and note
//! rendering.

use std::sync::LazyLock;

use quick_xml::escape::resolve_html5_entity;
use regex::{Captures, Regex};

/// Maximum length of a generated slug.
pub const MAX_SLUG_LEN: usize = 72;

/// Slug used when a title has no usable characters.
pub const FALLBACK_SLUG: &str = "untitled-source";

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([A-Za-z][A-Za-z0-9]{1,31}));").unwrap()
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SLUG_STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static SLUG_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_-]+").unwrap());

/// Decode HTML character references.
///
/// Handles decimal and hexadecimal numeric references and the full HTML5
/// named entity table. Unknown names are left untouched, invalid code points
/// become U+FFFD.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    ENTITY_RE
        .replace_all(raw, |caps: &Captures| {
            if let Some(dec) = caps.get(1) {
                return numeric_reference(dec.as_str(), 10);
            }
            if let Some(hex) = caps.get(2) {
                return numeric_reference(hex.as_str(), 16);
            }
            let name = &caps[3];
            match resolve_html5_entity(name) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn numeric_reference(digits: &str, radix: u32) -> String {
    u32::from_str_radix(digits, radix)
        .ok()
        .filter(|&code| code != 0)
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
        .to_string()
}

/// Decode entities, collapse whitespace runs to single spaces and trim.
///
/// ```rust
/// use vaultline_core::clean_text;
///
/// assert_eq!(clean_text("  Fish &amp;\n\tChips  "), "Fish & Chips");
/// ```
pub fn clean_text(raw: &str) -> String {
    let decoded = decode_entities(raw);
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Replace markup tags with spaces, leaving only the text between them.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, " ").into_owned()
}

/// Build a lowercase, hyphen-separated, filesystem-safe slug.
///
/// The result only contains `[a-z0-9-]`, never starts or ends with a hyphen
/// and is at most [`MAX_SLUG_LEN`] bytes long. Inputs with no usable
/// characters map to [`FALLBACK_SLUG`].
///
/// ```rust
/// use vaultline_core::slugify;
///
/// assert_eq!(slugify("Hello, World! 2024"), "hello-world-2024");
/// assert_eq!(slugify("?!?"), "untitled-source");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = SLUG_STRIP_RE.replace_all(&lowered, "");
    let joined = SLUG_SEPARATOR_RE.replace_all(&stripped, "-");
    let trimmed = joined.trim_matches('-');

    let truncated = if trimmed.len() > MAX_SLUG_LEN { &trimmed[..MAX_SLUG_LEN] } else { trimmed };
    let slug = truncated.trim_end_matches('-');

    if slug.is_empty() { FALLBACK_SLUG.to_string() } else { slug.to_string() }
}
