//! Bounded, single-pass page extraction.
//!
//! [`PageExtractor`] is a push parser: it is fed start-tag, text and end-tag
//! events in document order and keeps at most one active capture. No DOM is
//! built and every captured sequence is capped, so memory and downstream
//! distillation cost stay bounded on arbitrarily large pages.
//!
//! [`extract_page`] drives the extractor from the `lol_html` streaming
//! tokenizer.
//!
//! # Example
//!
//! ```rust
//! use vaultline_core::extract_page;
//!
//! let page = extract_page("<title>Intro to X</title><p>First paragraph.</p>");
//! assert_eq!(page.title, "Intro to X");
//! assert_eq!(page.paragraphs, vec!["First paragraph.".to_string()]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::{HtmlRewriter, Settings, doc_text, element};
use serde::Serialize;

use crate::sanitize::clean_text;

/// Maximum number of captured headings.
pub const MAX_HEADINGS: usize = 20;
/// Maximum number of captured paragraphs.
pub const MAX_PARAGRAPHS: usize = 60;
/// Maximum number of captured list items.
pub const MAX_LIST_ITEMS: usize = 80;

/// `name`/`property` values of `<meta>` tags that carry a page description.
const DESCRIPTION_KEYS: [&str; 3] = ["description", "og:description", "twitter:description"];

/// Text captured from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageContent {
    pub title: String,
    pub description: String,
    pub headings: Vec<String>,
    pub paragraphs: Vec<String>,
    pub list_items: Vec<String>,
}

/// Tags whose text content is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTag {
    Title,
    H1,
    H2,
    H3,
    Paragraph,
    ListItem,
}

impl CaptureTag {
    /// Map a lowercase tag name to a capture tag.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "h1" => Some(Self::H1),
            "h2" => Some(Self::H2),
            "h3" => Some(Self::H3),
            "p" => Some(Self::Paragraph),
            "li" => Some(Self::ListItem),
            _ => None,
        }
    }
}

/// The single capture slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Capture {
    #[default]
    Idle,
    Active { tag: CaptureTag, buffer: String },
}

/// Push parser over tag/text events.
#[derive(Debug, Default)]
pub struct PageExtractor {
    capture: Capture,
    page: PageContent,
}

impl PageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle an opening tag.
    ///
    /// `attributes` are `(name, value)` pairs; names are matched
    /// case-insensitively. Opening a capture tag while another capture is
    /// active discards the earlier buffer.
    pub fn start_tag(&mut self, name: &str, attributes: &[(String, String)]) {
        let name = name.to_ascii_lowercase();

        if name == "meta" && self.page.description.is_empty() {
            self.capture_meta_description(attributes);
        }

        if let Some(tag) = CaptureTag::from_name(&name) {
            self.capture = Capture::Active { tag, buffer: String::new() };
        }
    }

    /// Handle a chunk of character data.
    pub fn text(&mut self, chunk: &str) {
        if let Capture::Active { buffer, .. } = &mut self.capture {
            buffer.push_str(chunk);
        }
    }

    /// Handle a closing tag. Only the tag matching the active capture has any
    /// effect.
    pub fn end_tag(&mut self, name: &str) {
        let Some(closing) = CaptureTag::from_name(&name.to_ascii_lowercase()) else {
            return;
        };
        let Capture::Active { tag, .. } = &self.capture else {
            return;
        };
        if *tag != closing {
            return;
        }

        if let Capture::Active { tag, buffer } = std::mem::take(&mut self.capture) {
            let text = clean_text(&buffer);
            if !text.is_empty() {
                self.store(tag, text);
            }
        }
    }

    /// Fold in content extracted separately, such as the markup of a
    /// `<noscript>` block. Caps still apply.
    pub fn merge(&mut self, other: PageContent) {
        let page = &mut self.page;
        if page.title.is_empty() {
            page.title = other.title;
        }
        if page.description.is_empty() {
            page.description = other.description;
        }
        for heading in other.headings {
            push_bounded(&mut page.headings, heading, MAX_HEADINGS);
        }
        for paragraph in other.paragraphs {
            push_bounded(&mut page.paragraphs, paragraph, MAX_PARAGRAPHS);
        }
        for item in other.list_items {
            push_bounded(&mut page.list_items, item, MAX_LIST_ITEMS);
        }
    }

    /// Consume the extractor and return what was captured.
    pub fn into_page(self) -> PageContent {
        self.page
    }

    fn capture_meta_description(&mut self, attributes: &[(String, String)]) {
        let attr = |wanted: &str| {
            attributes
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value.as_str())
                .filter(|value| !value.is_empty())
        };

        let key = attr("name").or_else(|| attr("property")).unwrap_or_default().to_lowercase();
        if DESCRIPTION_KEYS.contains(&key.as_str()) {
            self.page.description = clean_text(attr("content").unwrap_or_default());
        }
    }

    fn store(&mut self, tag: CaptureTag, text: String) {
        let page = &mut self.page;
        match tag {
            CaptureTag::Title => {
                if page.title.is_empty() {
                    page.title = text;
                }
            }
            CaptureTag::H1 | CaptureTag::H2 | CaptureTag::H3 => push_bounded(&mut page.headings, text, MAX_HEADINGS),
            CaptureTag::Paragraph => push_bounded(&mut page.paragraphs, text, MAX_PARAGRAPHS),
            CaptureTag::ListItem => push_bounded(&mut page.list_items, text, MAX_LIST_ITEMS),
        }
    }
}

fn push_bounded(items: &mut Vec<String>, text: String, cap: usize) {
    if items.len() < cap {
        items.push(text);
    }
}

/// Stream an HTML document through a [`PageExtractor`].
///
/// The tokenizer reads `<noscript>` as raw text, so its markup is buffered
/// and extracted in a second pass when the block closes.
///
/// Malformed markup never fails extraction: whatever was captured before the
/// tokenizer gave up is returned.
pub fn extract_page(html: &str) -> PageContent {
    let extractor = Rc::new(RefCell::new(PageExtractor::new()));
    let noscript: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let on_element = Rc::clone(&extractor);
    let on_text = Rc::clone(&extractor);
    let noscript_open = Rc::clone(&noscript);
    let noscript_text = Rc::clone(&noscript);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", move |el| {
                let name = el.tag_name();
                if name == "noscript" {
                    noscript_open.replace(Some(String::new()));
                    if let Some(handlers) = el.end_tag_handlers() {
                        let buffered = Rc::clone(&noscript_open);
                        let on_end = Rc::clone(&on_element);
                        let handler: lol_html::EndTagHandler<'static> = Box::new(move |_end| {
                            let markup = buffered.take().unwrap_or_default();
                            on_end.borrow_mut().merge(extract_page(&markup));
                            Ok(())
                        });
                        handlers.push(handler);
                    }
                    return Ok(());
                }

                let attributes: Vec<(String, String)> = if name == "meta" {
                    el.attributes().iter().map(|attr| (attr.name(), attr.value())).collect()
                } else {
                    Vec::new()
                };
                on_element.borrow_mut().start_tag(&name, &attributes);

                if CaptureTag::from_name(&name).is_some()
                    && let Some(handlers) = el.end_tag_handlers()
                {
                    let on_end = Rc::clone(&on_element);
                    let handler: lol_html::EndTagHandler<'static> = Box::new(move |end| {
                        on_end.borrow_mut().end_tag(&end.name());
                        Ok(())
                    });
                    handlers.push(handler);
                }
                Ok(())
            })],
            document_content_handlers: vec![doc_text!(move |chunk| {
                if let Some(markup) = noscript_text.borrow_mut().as_mut() {
                    markup.push_str(chunk.as_str());
                    return Ok(());
                }
                on_text.borrow_mut().text(chunk.as_str());
                Ok(())
            })],
            ..Default::default()
        },
        |_: &[u8]| {},
    );

    match rewriter.write(html.as_bytes()) {
        Ok(_) => {
            if let Err(err) = rewriter.end() {
                tracing::debug!(error = %err, "tokenizer failed at end of input; keeping partial capture");
            }
        }
        Err(err) => tracing::debug!(error = %err, "tokenizer stopped early; keeping partial capture"),
    }

    if let Some(markup) = noscript.take() {
        extractor.borrow_mut().merge(extract_page(&markup));
    }

    extractor.replace(PageExtractor::new()).into_page()
}
