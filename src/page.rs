//! What the harvester needs from a browser, and nothing more.
//!
//! Everything that depends on the host site's current DOM lives behind
//! these two traits: [`snapshot`] turns a captured page into a
//! [`DetailView`], [`chrome`] drives a real browser.

use std::path::Path;

use chrono::NaiveDateTime;

pub mod chrome;
pub mod snapshot;

pub use snapshot::SnapshotDetail;

/// Per-candidate extraction failures. None of these abort a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("no post text on the detail view")]
    NoPostText,
    #[error("no time element found within the hierarchy")]
    NoTimestamp,
    #[error("no sufficiently similar excerpt for {0:?}")]
    NotReidentified(String),
}

/// A post's detail page after navigation.
pub trait DetailView {
    fn current_url(&self) -> &str;

    fn body_text(&self) -> &str;

    /// Best-effort publication time. `Ok(None)` when the timestamp element
    /// exists but carries no usable value.
    fn published_at(&self) -> Result<Option<NaiveDateTime>, ExtractError>;
}

pub trait PageDriver {
    type Detail: DetailView;

    /// Texts of the post excerpts currently rendered in the overview listing.
    fn visible_excerpts(&mut self) -> anyhow::Result<Vec<String>>;

    /// Open the detail view of the listing entry whose text equals `excerpt`.
    /// `Ok(None)` when no such entry is rendered any more.
    fn open_detail(&mut self, excerpt: &str) -> anyhow::Result<Option<Self::Detail>>;

    /// Return to the overview listing.
    fn back(&mut self) -> anyhow::Result<()>;

    fn screenshot(&mut self, path: &Path) -> anyhow::Result<()>;
}
