//! Turning a URL into a [`SourceRecord`].
//!
//! Resolution never fails: a page that cannot be fetched becomes an
//! access-limited record carrying the [`FetchError`], and the caller decides
//! whether that is fatal. Secondary metadata (embed data for JavaScript-gated
//! social posts, arXiv abstracts) is fetched with a single best-effort
//! attempt and silently dropped on failure.

use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::distill::is_noise;
use crate::error::FetchError;
use crate::extract::{PageContent, extract_page};
use crate::fetch::{FetchConfig, TlsMode, Transport, fetch_with_fallback};
use crate::sanitize::{clean_text, strip_tags};
use crate::{Result, VaultlineError};

/// Hosts that serve a "JavaScript is disabled" shell to non-browser clients.
pub const JS_GATED_HOSTS: &[&str] = &["x.com", "www.x.com", "twitter.com", "www.twitter.com", "mobile.twitter.com"];

/// Hosts whose URLs carry an arXiv identifier.
pub const ABSTRACT_HOSTS: &[&str] = &["arxiv.org", "www.arxiv.org", "export.arxiv.org"];

const JS_GATE_PHRASE: &str = "javascript is disabled";

static ABSTRACT_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(?:abs|pdf|html)/(.+?)(?:\.pdf)?/?$").unwrap());

/// Author and text recovered from an oEmbed endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbedMetadata {
    pub author_name: String,
    pub author_url: String,
    pub provider_name: String,
    pub embed_text: String,
}

/// Title, summary and authors from the abstracts API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AbstractMetadata {
    pub identifier: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SecondaryMetadata {
    Embed(EmbedMetadata),
    Abstract(AbstractMetadata),
}

/// Where a record's title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TitleSource {
    Page,
    Abstract,
    /// Derived from the URL because nothing better was available.
    Url,
}

/// Everything known about one fetched resource.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub url: String,
    pub title: String,
    pub title_source: TitleSource,
    pub description: String,
    pub headings: Vec<String>,
    pub paragraphs: Vec<String>,
    pub list_items: Vec<String>,
    pub access_limited: bool,
    pub secondary: Option<SecondaryMetadata>,
    #[serde(skip)]
    pub fetch_error: Option<FetchError>,
}

impl SourceRecord {
    pub fn embed(&self) -> Option<&EmbedMetadata> {
        match &self.secondary {
            Some(SecondaryMetadata::Embed(embed)) => Some(embed),
            _ => None,
        }
    }

    pub fn abstract_metadata(&self) -> Option<&AbstractMetadata> {
        match &self.secondary {
            Some(SecondaryMetadata::Abstract(meta)) => Some(meta),
            _ => None,
        }
    }

    /// A record counts as a citation when its content, or at least trusted
    /// secondary metadata, was obtained.
    pub fn is_citable(&self) -> bool {
        !self.access_limited || self.secondary.is_some()
    }

    /// Text used for classification: title, description, headings,
    /// paragraphs and the URL itself.
    pub fn classification_text(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.title, &self.description];
        parts.extend(self.headings.iter().map(String::as_str));
        parts.extend(self.paragraphs.iter().map(String::as_str));
        parts.push(&self.url);
        parts.join("\n")
    }
}

/// Fetches pages and their secondary metadata.
#[derive(Debug)]
pub struct Resolver<T: Transport> {
    transport: T,
    config: FetchConfig,
}

impl<T: Transport> Resolver<T> {
    pub fn new(transport: T, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    /// Fetch, extract and enrich one URL.
    pub async fn resolve(&self, url: &Url) -> SourceRecord {
        let (page, fetch_error) = match fetch_with_fallback(&self.transport, url.as_str()).await {
            Ok(html) => (extract_page(&html), None),
            Err(err) => {
                warn!(%url, error = %err, "fetch failed; recording source as access-limited");
                (PageContent::default(), Some(err))
            }
        };

        let mut access_limited = fetch_error.is_some();
        let mut secondary = None;

        let gated = is_js_gated(url, &page);
        if gated {
            info!(%url, "page is JavaScript-gated; falling back to embed metadata");
            access_limited = true;
            secondary = self.fetch_embed(url).await.map(SecondaryMetadata::Embed);
        }

        // A gated shell's <title> names the platform, not the post.
        let (mut title, mut title_source) = if !gated && !page.title.is_empty() && !is_noise(&page.title) {
            (page.title, TitleSource::Page)
        } else {
            (derive_title_from_url(url), TitleSource::Url)
        };
        let mut description = page.description;

        if let Some(identifier) = abstract_identifier(url)
            && let Some(meta) = self.fetch_abstract(&identifier).await
        {
            debug!(%identifier, "abstract metadata found");
            if !meta.title.is_empty() {
                title = meta.title.clone();
                title_source = TitleSource::Abstract;
            }
            if !meta.summary.is_empty() {
                description = meta.summary.clone();
            }
            access_limited = false;
            secondary = Some(SecondaryMetadata::Abstract(meta));
        }

        SourceRecord {
            url: url.to_string(),
            title,
            title_source,
            description,
            headings: page.headings,
            paragraphs: page.paragraphs,
            list_items: page.list_items,
            access_limited,
            secondary,
            fetch_error,
        }
    }

    async fn fetch_embed(&self, url: &Url) -> Option<EmbedMetadata> {
        let endpoint = Url::parse_with_params(&self.config.oembed_endpoint, &[("url", url.as_str())]).ok()?;
        let body = self
            .transport
            .get(endpoint.as_str(), TlsMode::Verified)
            .await
            .inspect_err(|err| warn!(%url, error = %err, "embed metadata unavailable"))
            .ok()?;
        parse_oembed(&body)
            .inspect_err(|err| warn!(%url, error = %err, "embed metadata unreadable"))
            .ok()
    }

    async fn fetch_abstract(&self, identifier: &str) -> Option<AbstractMetadata> {
        let endpoint = Url::parse_with_params(&self.config.abstracts_endpoint, &[("id_list", identifier)]).ok()?;
        let body = self
            .transport
            .get(endpoint.as_str(), TlsMode::Verified)
            .await
            .inspect_err(|err| warn!(%identifier, error = %err, "abstract metadata unavailable"))
            .ok()?;
        parse_abstract_feed(&body, identifier)
            .inspect_err(|err| warn!(%identifier, error = %err, "abstract feed unreadable"))
            .ok()
            .flatten()
    }
}

fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_lowercase()
}

/// True for known social hosts whose page text admits JavaScript is off.
pub fn is_js_gated(url: &Url, page: &PageContent) -> bool {
    if !JS_GATED_HOSTS.contains(&host_of(url).as_str()) {
        return false;
    }

    let mut parts: Vec<&str> = vec![&page.title, &page.description];
    parts.extend(page.paragraphs.iter().map(String::as_str));
    parts.join(" ").to_lowercase().contains(JS_GATE_PHRASE)
}

/// Extract the arXiv identifier from `/abs/<id>`, `/pdf/<id>[.pdf]` or
/// `/html/<id>` URLs.
pub fn abstract_identifier(url: &Url) -> Option<String> {
    if !ABSTRACT_HOSTS.contains(&host_of(url).as_str()) {
        return None;
    }
    ABSTRACT_PATH_RE
        .captures(url.path())
        .map(|caps| caps[1].to_string())
}

/// Fallback title built from the URL alone.
///
/// ```rust
/// use url::Url;
/// use vaultline_core::derive_title_from_url;
///
/// let url = Url::parse("https://example.com/blog/scaling-laws_revisited").unwrap();
/// assert_eq!(derive_title_from_url(&url), "Scaling Laws Revisited");
/// ```
pub fn derive_title_from_url(url: &Url) -> String {
    let host = host_of(url);
    let parts: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|part| !part.is_empty()).collect())
        .unwrap_or_default();

    if JS_GATED_HOSTS.contains(&host.as_str()) && parts.len() >= 3 && parts[1] == "status" {
        return format!("X Post by {} ({})", parts[0], parts[2]);
    }

    if let Some(tail) = parts.last() {
        let words = tail.replace(['-', '_'], " ");
        let words = words.trim();
        if !words.is_empty() {
            return title_case(words);
        }
    }

    match url.port() {
        Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
        None => url.host_str().unwrap_or_default().to_string(),
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OEmbedResponse {
    author_name: String,
    author_url: String,
    provider_name: String,
    html: String,
}

/// Decode an oEmbed JSON payload.
pub fn parse_oembed(body: &str) -> Result<EmbedMetadata> {
    let raw: OEmbedResponse = serde_json::from_str(body)?;
    let html = clean_text(&raw.html);
    Ok(EmbedMetadata {
        author_name: clean_text(&raw.author_name),
        author_url: clean_text(&raw.author_url),
        provider_name: clean_text(&raw.provider_name),
        embed_text: clean_text(&strip_tags(&html)),
    })
}

#[derive(Debug, Clone, Copy)]
enum FeedField {
    Title,
    Summary,
    AuthorName,
}

/// Read the first `<entry>` of an Atom abstracts feed.
///
/// Returns `Ok(None)` when the feed has no entry, or the entry is the API's
/// error placeholder.
pub fn parse_abstract_feed(xml: &str, identifier: &str) -> Result<Option<AbstractMetadata>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_entry = false;
    let mut in_author = false;
    let mut field: Option<FeedField> = None;
    let mut meta = AbstractMetadata { identifier: identifier.to_string(), ..Default::default() };
    let mut author = String::new();
    let mut found = false;

    loop {
        match reader.read_event()? {
            Event::Start(tag) => match tag.local_name().as_ref() {
                b"entry" => {
                    in_entry = true;
                    found = true;
                }
                b"title" if in_entry => field = Some(FeedField::Title),
                b"summary" if in_entry => field = Some(FeedField::Summary),
                b"author" if in_entry => in_author = true,
                b"name" if in_author => field = Some(FeedField::AuthorName),
                _ => {}
            },
            Event::Text(text) => {
                if let Some(current) = field {
                    let value = text.unescape()?;
                    let target = match current {
                        FeedField::Title => &mut meta.title,
                        FeedField::Summary => &mut meta.summary,
                        FeedField::AuthorName => &mut author,
                    };
                    target.push_str(&value);
                    target.push(' ');
                }
            }
            Event::End(tag) => match tag.local_name().as_ref() {
                b"entry" => break,
                b"title" | b"summary" => field = None,
                b"name" if in_author => {
                    let name = clean_text(&author);
                    if !name.is_empty() {
                        meta.authors.push(name);
                    }
                    author.clear();
                    field = None;
                }
                b"author" => in_author = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    meta.title = clean_text(&meta.title);
    meta.summary = clean_text(&meta.summary);

    if !found || meta.title.eq_ignore_ascii_case("error") || (meta.title.is_empty() && meta.summary.is_empty()) {
        return Ok(None);
    }
    Ok(Some(meta))
}

/// Parse and validate a source URL: it must be absolute, `http(s)`, and
/// carry a host.
pub fn parse_source_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|err| VaultlineError::InvalidUrl(format!("{raw}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(VaultlineError::InvalidUrl(format!(
            "{raw}: URL must use http:// or https://, for example https://example.com/article"
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(VaultlineError::InvalidUrl(format!("{raw}: URL must include a host")));
    }
    Ok(url)
}
