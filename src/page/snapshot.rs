use chrono::{DateTime, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

use super::{DetailView, ExtractError};
use crate::text::{find_match, preview};

/// Attribute marking a post's text block.
pub const POST_TEXT_SELECTOR: &str = r#"[data-testid="tweetText"]"#;

static SEL_POST_TEXT: Lazy<Selector> = Lazy::new(|| Selector::parse(POST_TEXT_SELECTOR).unwrap());
static SEL_TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());

/// A detail view resolved from a captured copy of the page's DOM.
#[derive(Debug, Clone)]
pub struct SnapshotDetail {
    url: String,
    body: String,
    published: Result<Option<NaiveDateTime>, ExtractError>,
}

impl SnapshotDetail {
    /// Locate the post matching `excerpt` and resolve its timestamp.
    ///
    /// The excerpt is matched the same way the listing is re-identified. When
    /// no post on the page is close enough the body stays empty and
    /// `published_at` reports the miss.
    pub fn parse(url: impl Into<String>, html: &str, excerpt: &str) -> Self {
        let url = url.into();
        let document = Html::parse_document(html);

        let posts: Vec<ElementRef<'_>> = document.select(&SEL_POST_TEXT).collect();
        if posts.is_empty() {
            log::warn!(target: "page", "no post text found at {url}");
            return Self { url, body: String::new(), published: Err(ExtractError::NoPostText) };
        }

        let texts: Vec<String> = posts.iter().map(|el| element_text(*el)).collect();
        let Some(found) = find_match(excerpt, &texts) else {
            log::warn!(target: "page", "none of {} posts at {url} matches {}", posts.len(), preview(excerpt, 50));
            return Self {
                url,
                body: String::new(),
                published: Err(ExtractError::NotReidentified(excerpt.to_string())),
            };
        };

        let published = resolve_timestamp(posts[found.index]);
        let body = texts[found.index].clone();
        Self { url, body, published }
    }
}

impl DetailView for SnapshotDetail {
    fn current_url(&self) -> &str {
        &self.url
    }

    fn body_text(&self) -> &str {
        &self.body
    }

    fn published_at(&self) -> Result<Option<NaiveDateTime>, ExtractError> {
        self.published.clone()
    }
}

// Rendered text of an element, with <br> as a line break. Hidden subtrees
// are left out, as the browser's innerText does.
fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible_text(el, &mut out);
    out
}

fn push_visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            Node::Element(e) if !is_hidden(e) => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_visible_text(child, out);
                }
            }
            _ => {}
        }
    }
}

fn is_hidden(e: &Element) -> bool {
    if e.attr("hidden").is_some() || e.attr("aria-hidden") == Some("true") {
        return true;
    }
    e.attr("style").is_some_and(|style| {
        let style: String = style.chars().filter(|c| !c.is_whitespace()).collect();
        style.to_ascii_lowercase().contains("display:none")
    })
}

// The timestamp hangs off an ancestor of the post text at an unknown depth.
// Walk up until some ancestor has a <time> below it; when several show up at
// once (quoted posts), the last one in document order is the outer post's.
fn resolve_timestamp(post: ElementRef<'_>) -> Result<Option<NaiveDateTime>, ExtractError> {
    let mut cursor = Some(*post);
    while let Some(node) = cursor {
        if let Some(el) = ElementRef::wrap(node) {
            if let Some(time) = el.select(&SEL_TIME).last() {
                return Ok(time.value().attr("datetime").and_then(parse_datetime));
            }
        }
        cursor = node.parent();
    }
    Err(ExtractError::NoTimestamp)
}

/// `2023-10-05T12:34:56.000Z` -> naive UTC, whole seconds.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"));
    match parsed {
        Ok(ts) => ts.with_nanosecond(0),
        Err(e) => {
            log::warn!(target: "page", "unparseable datetime {raw:?}: {e}");
            None
        }
    }
}
