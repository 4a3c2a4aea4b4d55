//! timeline2rss - harvest a profile timeline into a persistent RSS feed.
//!
//! The [`feed`] store and the [`harvest`] loop are browser-agnostic: they
//! only talk to a [`page::PageDriver`]. The live adapter lives in
//! [`page::chrome`].

pub mod config;
pub mod feed;
pub mod harvest;
pub mod link;
pub mod page;
pub mod text;

pub use feed::{Feed, FeedError, FeedItem};
pub use harvest::{HarvestAbort, HarvestReport, Harvester, Outcome, Pacer, Rejection};
pub use page::{DetailView, ExtractError, PageDriver};
