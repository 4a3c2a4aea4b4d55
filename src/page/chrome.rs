//! Live [`PageDriver`] on a headless Chrome session.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::util::Wait;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use url::Url;

use super::snapshot::{SnapshotDetail, POST_TEXT_SELECTOR};
use super::PageDriver;
use crate::harvest::Pacer;
use crate::text::preview;

/// Present once a timeline has rendered.
const READY_SELECTOR: &str = r#"[data-testid="cellInnerDiv"]"#;

const USERNAME_SELECTOR: &str = r#"input[name="text"]"#;
const PASSWORD_SELECTOR: &str = r#"input[name="password"]"#;
const NEXT_XPATH: &str = r#"//div/span/span[text()="Next"]"#;
const LOG_IN_XPATH: &str = r#"//div/span/span[text()="Log in"]"#;

const URL_POLL: Duration = Duration::from_millis(250);

// Fixed pause around each login step, in seconds.
const LOGIN_PAUSE: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub wait_timeout: Duration,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1080, 1920),
            wait_timeout: Duration::from_secs(10),
        }
    }
}

pub struct ChromeDriver {
    // keeps the browser process alive for as long as the tab is used
    _browser: Browser,
    tab: Arc<Tab>,
    timeout: Duration,
    pacer: Pacer,
    // where `back` has to return to; the listing and the detail view share
    // the readiness marker
    listing_url: Option<String>,
}

impl ChromeDriver {
    pub fn launch(options: &ChromeOptions, pacer: Pacer) -> anyhow::Result<Self> {
        log::info!(target: "page", "initializing browser (headless: {})", options.headless);
        let browser = Browser::new(LaunchOptions {
            headless: options.headless,
            sandbox: false,
            window_size: Some(options.window_size),
            args: vec![OsStr::new("--disk-cache-dir=./.cache")],
            ..LaunchOptions::default()
        })?;
        let tab = browser.wait_for_initial_tab()?;
        tab.set_default_timeout(options.wait_timeout);
        Ok(Self { _browser: browser, tab, timeout: options.wait_timeout, pacer, listing_url: None })
    }

    /// Two-step credential form: account identifier, then secret.
    pub fn login(&self, login_url: &Url, username: &str, password: &str) -> anyhow::Result<()> {
        self.tab.navigate_to(login_url.as_str())?.wait_until_navigated()?;
        self.pacer.pause(LOGIN_PAUSE, 0.0);

        log::info!(target: "page", "sending username");
        self.tab
            .wait_for_element_with_custom_timeout(USERNAME_SELECTOR, self.timeout)?
            .click()?
            .type_into(username)?;
        self.tab.wait_for_xpath_with_custom_timeout(NEXT_XPATH, self.timeout)?.click()?;
        self.pacer.pause(LOGIN_PAUSE, 0.0);

        log::info!(target: "page", "sending password");
        self.tab
            .wait_for_element_with_custom_timeout(PASSWORD_SELECTOR, self.timeout)?
            .click()?
            .type_into(password)?;
        self.tab.wait_for_xpath_with_custom_timeout(LOG_IN_XPATH, self.timeout)?.click()?;
        self.pacer.pause(LOGIN_PAUSE, 0.0);

        log::info!(target: "page", "logged in");
        Ok(())
    }

    /// Navigate and wait for the timeline to render.
    pub fn goto(&self, url: &Url) -> anyhow::Result<()> {
        log::info!(target: "page", "accessing {url}");
        self.tab.navigate_to(url.as_str())?.wait_until_navigated()?;
        self.pacer.step();
        self.wait_ready()
    }

    fn wait_ready(&self) -> anyhow::Result<()> {
        self.tab.wait_for_element_with_custom_timeout(READY_SELECTOR, self.timeout)?;
        Ok(())
    }

    fn wait_for_url(&self, expected: &str) -> anyhow::Result<()> {
        Wait::new(self.timeout, URL_POLL)
            .until(|| same_page(&self.tab.get_url(), expected).then_some(()))
            .map_err(|_| anyhow::anyhow!("still at {} instead of {expected}", self.tab.get_url()))
    }

    fn post_texts(&self) -> anyhow::Result<Vec<Element<'_>>> {
        match self.tab.find_elements(POST_TEXT_SELECTOR) {
            Ok(elements) => Ok(elements),
            Err(err) if err.is::<NoElementFound>() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

impl PageDriver for ChromeDriver {
    type Detail = SnapshotDetail;

    fn visible_excerpts(&mut self) -> anyhow::Result<Vec<String>> {
        self.post_texts()?
            .iter()
            .map(Element::get_inner_text)
            .collect()
    }

    fn open_detail(&mut self, excerpt: &str) -> anyhow::Result<Option<SnapshotDetail>> {
        self.listing_url = Some(self.tab.get_url());
        let mut target = None;
        for element in self.post_texts()? {
            if element.get_inner_text()? == excerpt {
                target = Some(element);
                break;
            }
        }
        let Some(element) = target else {
            return Ok(None);
        };

        element.scroll_into_view()?;
        self.pacer.settle();

        log::info!(target: "page", "clicking item with text {}", preview(excerpt, 50));
        element.click()?;
        self.pacer.step();

        self.tab.wait_for_element_with_custom_timeout(POST_TEXT_SELECTOR, self.timeout)?;
        let html = self.tab.get_content()?;
        Ok(Some(SnapshotDetail::parse(self.tab.get_url(), &html, excerpt)))
    }

    fn back(&mut self) -> anyhow::Result<()> {
        self.tab.evaluate("window.history.back()", false)?;
        self.pacer.step();
        if let Some(listing) = self.listing_url.take() {
            self.wait_for_url(&listing)?;
        }
        self.wait_ready()
    }

    fn screenshot(&mut self, path: &Path) -> anyhow::Result<()> {
        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?;
        std::fs::write(path, png)?;
        log::info!(target: "page", "screenshot saved to {}", path.display());
        Ok(())
    }
}

// Same document, ignoring fragment and a trailing slash.
fn same_page(current: &str, expected: &str) -> bool {
    match (Url::parse(current), Url::parse(expected)) {
        (Ok(mut a), Ok(mut b)) => {
            a.set_fragment(None);
            b.set_fragment(None);
            a.as_str().trim_end_matches('/') == b.as_str().trim_end_matches('/')
        }
        _ => current == expected,
    }
}
