//! Per-candidate harvesting loop: re-identify, open, judge, insert.

use std::fmt;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use rand::{thread_rng, Rng};

use crate::feed::Feed;
use crate::link::{self, AccountAllowList};
use crate::page::{DetailView, ExtractError, PageDriver};
use crate::text::{self, derive_title, preview, ratio};

/// Below this body/excerpt similarity the detail view is assumed to be a
/// different post.
pub const TITLE_RATIO_MIN: f64 = 0.7;

/// A fuzzy re-identification must beat this once links are stripped.
pub const REIDENTIFY_RATIO_MIN: f64 = text::MATCH_RATIO_MIN;

/// Jittered pauses between browser steps. Throttling only, never used for
/// synchronization.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    enabled: bool,
}

impl Pacer {
    pub fn jittered() -> Self {
        Self { enabled: true }
    }

    pub fn none() -> Self {
        Self { enabled: false }
    }

    /// Sleep `base + jitter * U[0, 1)` seconds.
    pub fn pause(&self, base_secs: f64, jitter_secs: f64) {
        if !self.enabled {
            return;
        }
        let mut rng = thread_rng();
        let secs = base_secs + jitter_secs * rng.gen::<f64>();
        sleep(Duration::from_secs_f64(secs));
    }

    /// Between page-level actions (3-7s).
    pub fn step(&self) {
        self.pause(3.0, 4.0);
    }

    /// After scrolling, before clicking (1-2s).
    pub fn settle(&self) {
        self.pause(1.0, 1.0);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reidentified {
    pub text: String,
    pub ratio: f64,
    pub exact: bool,
}

/// Find `target` again in the current listing. Exact text wins; otherwise
/// the closest excerpt is taken only if it is near-identical once links are
/// stripped from both sides.
pub fn reidentify(target: &str, visible: &[String]) -> Option<Reidentified> {
    let Some(found) = text::find_match(target, visible) else {
        log::debug!(target: "harvest", "no listing entry is close enough to {}", preview(target, 50));
        return None;
    };
    let text = visible[found.index].clone();
    if !found.exact {
        log::info!(
            target: "harvest",
            "substituting best match @ {:.2} without links: {}",
            found.ratio,
            preview(&text, 50)
        );
    }
    Some(Reidentified { text, ratio: found.ratio, exact: found.exact })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Permalink is invalid or belongs to an account outside the allow-list.
    Link { link: Option<String>, url: String },
    /// Detail text does not look like the excerpt that was clicked.
    Title { ratio: f64, target: String, retrieved: String },
    /// Permalink is already in the feed.
    Registered { link: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Link { link: Some(link), .. } => match link::account_of(link) {
                Some(account) => write!(f, "account {account} is not allowed: {link}"),
                None => write!(f, "link is not allowed: {link}"),
            },
            Rejection::Link { link: None, url } => write!(f, "link is not a post permalink: {url}"),
            Rejection::Title { ratio, target, retrieved } => write!(
                f,
                "title is not same @ {ratio:.2}\n  TARGET: {}\n  ACCESS: {}",
                preview(target, 200),
                preview(retrieved, 200)
            ),
            Rejection::Registered { link } => write!(f, "link is already registered: {link}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Inserted { link: String },
    Rejected(Vec<Rejection>),
    ExtractionFailed(ExtractError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub inserted: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl HarvestReport {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Inserted { .. } => self.inserted += 1,
            Outcome::Rejected(_) => self.rejected += 1,
            Outcome::ExtractionFailed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for HarvestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} inserted, {} rejected, {} failed", self.inserted, self.rejected, self.failed)
    }
}

/// An unclassified driver failure stopped the loop. `report` covers the
/// candidates processed before it; the harvester still holds their items.
#[derive(Debug, thiserror::Error)]
#[error("harvest aborted after {report}: {error:#}")]
pub struct HarvestAbort {
    pub error: anyhow::Error,
    pub report: HarvestReport,
}

pub struct Harvester {
    feed: Feed,
    allow: AccountAllowList,
    pacer: Pacer,
}

impl Harvester {
    pub fn new(feed: Feed, allow: AccountAllowList, pacer: Pacer) -> Self {
        Self { feed, allow, pacer }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn into_feed(self) -> Feed {
        self.feed
    }

    /// Process every candidate in order. Per-candidate failures are logged
    /// and skipped; only driver errors stop the loop.
    pub fn run<D: PageDriver>(&mut self, driver: &mut D, excerpts: &[String]) -> Result<HarvestReport, HarvestAbort> {
        let mut report = HarvestReport::default();
        for (i, excerpt) in excerpts.iter().enumerate() {
            log::debug!(target: "harvest", "candidate [{i}/{}] {}", excerpts.len(), preview(excerpt, 20));
            match self.process(driver, excerpt) {
                Ok(outcome) => report.record(&outcome),
                Err(error) => return Err(HarvestAbort { error, report }),
            }
        }
        log::info!(target: "harvest", "harvest finished: {report}");
        Ok(report)
    }

    /// Write the feed after a run. On failure the partial feed and a
    /// screenshot of the page are saved on a best-effort basis and the
    /// original error is returned unchanged.
    pub fn persist<D: PageDriver>(
        &self,
        driver: &mut D,
        result: anyhow::Result<HarvestReport>,
        output: &Path,
        screenshot: &Path,
    ) -> anyhow::Result<HarvestReport> {
        match result {
            Ok(report) => {
                self.feed.export(output)?;
                Ok(report)
            }
            Err(error) => {
                if let Err(e) = self.feed.export(output) {
                    log::error!(target: "harvest", "could not save partial feed: {e}");
                } else {
                    log::info!(target: "harvest", "partial feed with {} items saved to {}", self.feed.len(), output.display());
                }
                if let Err(e) = driver.screenshot(screenshot) {
                    log::error!(target: "harvest", "could not capture screenshot: {e:#}");
                }
                Err(error)
            }
        }
    }

    /// Take one candidate to a terminal outcome.
    pub fn process<D: PageDriver>(&mut self, driver: &mut D, excerpt: &str) -> anyhow::Result<Outcome> {
        self.pacer.step();

        let visible = driver.visible_excerpts()?;
        let Some(found) = reidentify(excerpt, &visible) else {
            log::warn!(target: "harvest", "could not find the item again, skipping: {}", preview(excerpt, 50));
            return Ok(Outcome::ExtractionFailed(ExtractError::NotReidentified(excerpt.to_string())));
        };

        let Some(detail) = driver.open_detail(&found.text)? else {
            log::warn!(target: "harvest", "item vanished before it could be opened, skipping: {}", preview(excerpt, 50));
            return Ok(Outcome::ExtractionFailed(ExtractError::NotReidentified(excerpt.to_string())));
        };

        let body = detail.body_text().to_string();
        let title = derive_title(&body);
        let canonical = link::canonicalize(detail.current_url());

        let rejections = self.judge(&detail, canonical.as_deref(), excerpt, &body);
        // an invalid link always produces a Link rejection
        let link = match canonical {
            Some(link) if rejections.is_empty() => link,
            _ => {
                log::info!(target: "harvest", "skipping {title}");
                for r in &rejections {
                    log::info!(target: "harvest", "  {r}");
                }
                driver.back()?;
                return Ok(Outcome::Rejected(rejections));
            }
        };

        let published_at = match detail.published_at() {
            Ok(ts) => ts,
            Err(e) => {
                log::warn!(target: "harvest", "{e} for {link}, skipping");
                driver.back()?;
                return Ok(Outcome::ExtractionFailed(e));
            }
        };

        let shown = published_at.map_or_else(|| "no date".to_string(), |ts| ts.to_string());
        log::info!(target: "harvest", "adding item {} @ [{shown}]", preview(&title, 20));
        self.feed.add_item(title, link.clone(), body, published_at);

        self.pacer.step();
        driver.back()?;
        Ok(Outcome::Inserted { link })
    }

    // Every failing condition is reported, not just the first.
    fn judge<V: DetailView>(&self, detail: &V, canonical: Option<&str>, excerpt: &str, body: &str) -> Vec<Rejection> {
        let mut rejections = Vec::new();

        if !self.allow.permits(canonical) {
            rejections.push(Rejection::Link {
                link: canonical.map(str::to_string),
                url: detail.current_url().to_string(),
            });
        }

        let title_ratio = ratio(body, excerpt);
        if title_ratio < TITLE_RATIO_MIN {
            rejections.push(Rejection::Title {
                ratio: title_ratio,
                target: excerpt.to_string(),
                retrieved: body.to_string(),
            });
        }

        if let Some(link) = canonical {
            if self.feed.is_registered(link) {
                rejections.push(Rejection::Registered { link: link.to_string() });
            }
        }

        rejections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_first() {
        let visible = listing(&["Patch notes for v3.0.0 ", "Patch notes for v3.0.0"]);
        let found = reidentify("Patch notes for v3.0.0", &visible).unwrap();
        assert!(found.exact);
        assert_eq!(found.text, "Patch notes for v3.0.0");
    }

    #[test]
    fn trivial_difference_is_accepted() {
        let visible = listing(&["Something else entirely", "Patch notes for v3.0.0 "]);
        let found = reidentify("Patch notes for v3.0.0", &visible).unwrap();
        assert!(!found.exact);
        assert_eq!(found.text, "Patch notes for v3.0.0 ");
        assert!(found.ratio > REIDENTIFY_RATIO_MIN);
    }

    #[test]
    fn shortened_links_are_ignored() {
        let target = "New stage revealed! https://t.co/AbCdEf1234";
        let visible = listing(&["New stage revealed! https://t.co/Zz…"]);
        assert!(reidentify(target, &visible).is_some());
    }

    #[test]
    fn unrelated_text_is_not_matched() {
        let visible = listing(&["abcdefghij"]);
        assert!(ratio("abcdefghij", "abcdeXXXXX") <= 0.5);
        assert_eq!(reidentify("abcdeXXXXX", &visible), None);
    }

    #[test]
    fn empty_listing() {
        assert_eq!(reidentify("anything", &[]), None);
    }

    #[test]
    fn rejection_messages() {
        let r = Rejection::Link { link: None, url: "https://e/home".into() };
        assert_eq!(r.to_string(), "link is not a post permalink: https://e/home");
        let r = Rejection::Link {
            link: Some("https://twitter.com/someone_else/status/9/".into()),
            url: "https://twitter.com/someone_else/status/9?s=20".into(),
        };
        assert_eq!(
            r.to_string(),
            "account someone_else is not allowed: https://twitter.com/someone_else/status/9/"
        );
        let r = Rejection::Registered { link: "https://e/a/status/1/".into() };
        assert!(r.to_string().contains("already registered"));
    }
}
