//! In-memory RSS 2.0 feed with link-keyed dedup, chronological export and
//! tolerant re-import.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// `pubDate` layout. No offset component: timestamps are stored naive.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

const RSS_VERSION: &str = "2.0";

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed file i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("feed xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("root element is not <rss>")]
    InvalidRoot,
    #[error("unsupported rss version {0:?}")]
    UnsupportedVersion(Option<String>),
    #[error("no <channel> element")]
    MissingChannel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct Feed {
    title: String,
    link: String,
    description: String,
    items: Vec<FeedItem>,
    registered: HashSet<String>,
}

impl Feed {
    pub fn new(title: impl Into<String>, link: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: description.into(),
            items: Vec::new(),
            registered: HashSet::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert an item unless its link is already present. First write wins;
    /// returns whether the item was inserted.
    pub fn add_item(
        &mut self,
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
        published_at: Option<NaiveDateTime>,
    ) -> bool {
        let title = title.into();
        let link = link.into();
        if self.registered.contains(&link) {
            log::info!(target: "feed", "the object already exists {title:?}. skipped.");
            return false;
        }
        self.registered.insert(link.clone());
        self.items.push(FeedItem {
            title,
            link,
            description: description.into(),
            published_at,
        });
        true
    }

    pub fn is_registered(&self, link: &str) -> bool {
        self.registered.contains(link)
    }

    /// Items newest first. Undated items count as the oldest possible
    /// instant; ties keep insertion order.
    pub fn sorted_items(&self) -> Vec<&FeedItem> {
        let mut items: Vec<&FeedItem> = self.items.iter().collect();
        // `None < Some(_)`, so a descending sort leaves undated items last.
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items
    }

    /// Serialize as a two-space indented RSS 2.0 document.
    pub fn to_xml(&self) -> Result<Vec<u8>, FeedError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut rss_start = BytesStart::new("rss");
        rss_start.push_attribute(("version", RSS_VERSION));
        writer.write_event(Event::Start(rss_start))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;
        write_text_element(&mut writer, "title", &self.title)?;
        write_text_element(&mut writer, "link", &self.link)?;
        write_text_element(&mut writer, "description", &self.description)?;

        for it in self.sorted_items() {
            writer.write_event(Event::Start(BytesStart::new("item")))?;
            write_text_element(&mut writer, "title", &it.title)?;
            write_text_element(&mut writer, "link", &it.link)?;
            write_text_element(&mut writer, "description", &it.description)?;
            if let Some(ts) = it.published_at {
                write_text_element(&mut writer, "pubDate", &ts.format(DATE_FORMAT).to_string())?;
            }
            writer.write_event(Event::End(BytesEnd::new("item")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }

    /// Write the feed to `path`, replacing whatever was there.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), FeedError> {
        let path = path.as_ref();
        let out = self.to_xml()?;
        std::fs::write(path, out)?;
        log::info!(target: "feed", "exported {} items to {}", self.items.len(), path.display());
        Ok(())
    }

    /// Strict document-level parse of a previously exported file.
    /// Item-level problems are logged and skipped, never returned.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Load a previously exported feed, or `None` when there is nothing
    /// usable so the caller can start fresh.
    pub fn import(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(feed) => {
                log::info!(target: "feed", "imported {} items from {}", feed.len(), path.display());
                Some(feed)
            }
            Err(FeedError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::info!(target: "feed", "no previous feed at {}", path.display());
                None
            }
            Err(e) => {
                log::warn!(target: "feed", "ignoring previous feed at {}: {e}", path.display());
                None
            }
        }
    }

    pub fn parse(xml: &str) -> Result<Self, FeedError> {
        let mut reader = Reader::from_str(xml);

        let mut path: Vec<String> = Vec::new();
        let mut seen_root = false;
        let mut feed: Option<Feed> = None;
        let mut item: Option<ItemDraft> = None;
        let mut item_index = 0usize;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if !seen_root {
                        check_root(&e)?;
                        seen_root = true;
                    }
                    open_element(&path, &name, &mut feed, &mut item);
                    path.push(name);
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if !seen_root {
                        check_root(&e)?;
                        // a self-closing root cannot hold a channel
                        return Err(FeedError::MissingChannel);
                    }
                    open_element(&path, &name, &mut feed, &mut item);
                    if name == "item" && in_channel(&path) {
                        if let (Some(f), Some(draft)) = (feed.as_mut(), item.take()) {
                            draft.finish(f, item_index);
                        }
                        item_index += 1;
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape()?;
                    push_text(&path, &text, &mut feed, &mut item);
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    push_text(&path, &text, &mut feed, &mut item);
                }
                Event::End(_) => {
                    let closed = path.pop();
                    if closed.as_deref() == Some("item") && in_channel(&path) {
                        if let (Some(f), Some(draft)) = (feed.as_mut(), item.take()) {
                            draft.finish(f, item_index);
                        }
                        item_index += 1;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(FeedError::InvalidRoot);
        }
        feed.ok_or(FeedError::MissingChannel)
    }
}

fn write_text_element<W: io::Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<(), FeedError> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    // always emit the text event, even when empty, so the end tag stays inline
    let s = sanitize_text(text);
    w.write_event(Event::Text(BytesText::new(&s)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

// Remove Cc control characters that are invalid in XML, except tab, LF and CR.
fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| {
            let code = c as u32;
            code == 0x09 || code == 0x0A || code == 0x0D || code >= 0x20
        })
        .collect()
}

fn check_root(e: &BytesStart<'_>) -> Result<(), FeedError> {
    if e.name().as_ref() != b"rss" {
        return Err(FeedError::InvalidRoot);
    }
    let version = e
        .try_get_attribute("version")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
    if version.as_deref() != Some(RSS_VERSION) {
        return Err(FeedError::UnsupportedVersion(version));
    }
    Ok(())
}

fn in_channel(path: &[String]) -> bool {
    path.len() == 2 && path[1] == "channel"
}

fn in_item(path: &[String]) -> bool {
    path.len() == 3 && path[1] == "channel" && path[2] == "item"
}

fn open_element(path: &[String], name: &str, feed: &mut Option<Feed>, item: &mut Option<ItemDraft>) {
    if path.len() == 1 && name == "channel" {
        if feed.is_none() {
            *feed = Some(Feed::new("", "", ""));
        }
    } else if in_channel(path) && name == "item" {
        *item = Some(ItemDraft::default());
    } else if in_item(path) {
        if let Some(draft) = item.as_mut() {
            if let Some(slot) = draft.slot(name) {
                slot.get_or_insert_with(String::new);
            }
        }
    }
}

fn push_text(path: &[String], text: &str, feed: &mut Option<Feed>, item: &mut Option<ItemDraft>) {
    let Some((field, parent)) = path.split_last() else { return };
    if parent.len() == 2 && parent[1] == "channel" {
        if let Some(f) = feed.as_mut() {
            match field.as_str() {
                "title" => f.title.push_str(text),
                "link" => f.link.push_str(text),
                "description" => f.description.push_str(text),
                _ => {}
            }
        }
    } else if in_item(parent) {
        if let Some(slot) = item.as_mut().and_then(|d| d.slot(field)) {
            slot.get_or_insert_with(String::new).push_str(text);
        }
    }
}

#[derive(Debug, Default)]
struct ItemDraft {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
}

impl ItemDraft {
    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "title" => Some(&mut self.title),
            "link" => Some(&mut self.link),
            "description" => Some(&mut self.description),
            "pubDate" => Some(&mut self.pub_date),
            _ => None,
        }
    }

    fn finish(self, feed: &mut Feed, index: usize) {
        let (Some(title), Some(link), Some(description)) = (self.title, self.link, self.description) else {
            log::warn!(target: "feed", "item #{index} is missing title, link or description; skipped");
            return;
        };
        if link.trim().is_empty() {
            log::warn!(target: "feed", "item #{index} has an empty link; skipped");
            return;
        }
        let published_at = self.pub_date.and_then(|raw| {
            match NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    log::warn!(target: "feed", "item #{index} ({link}) has unparseable pubDate {raw:?}: {e}");
                    None
                }
            }
        });
        feed.add_item(title, link, description, published_at);
    }
}
