use once_cell::sync::Lazy;
use regex::Regex;

static RE_PERMALINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://[^/\s]+/([^/\s?#]+)/status/\d+)").unwrap());

/// Reduce a detail-view URL to `<origin>/<account>/status/<id>/`.
///
/// Trailing segments (`/photo/1`, `/analytics`), query and fragment are
/// dropped. `None` stands for "invalid link" and never passes the
/// allow-list.
pub fn canonicalize(url: &str) -> Option<String> {
    let caps = RE_PERMALINK.captures(url)?;
    Some(format!("{}/", &caps[1]))
}

/// Account segment of a permalink, e.g. `acct` in `https://x.com/acct/status/1/`.
pub fn account_of(url: &str) -> Option<&str> {
    RE_PERMALINK
        .captures(url)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

/// Account identifiers whose posts belong in the feed.
#[derive(Debug, Clone)]
pub struct AccountAllowList {
    accounts: Vec<String>,
    pattern: Option<Regex>,
}

impl AccountAllowList {
    pub fn new<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accounts: Vec<String> = accounts
            .into_iter()
            .map(|s| {
                let s: String = s.into();
                s.trim().to_string()
            })
            .filter(|s| !s.is_empty())
            .collect();
        let pattern = if accounts.is_empty() {
            None
        } else {
            let alternation = accounts
                .iter()
                .map(|a| regex::escape(a))
                .collect::<Vec<_>>()
                .join("|");
            // escaped literals always compile
            Regex::new(&alternation).ok()
        };
        Self { accounts, pattern }
    }

    /// `true` when the canonical permalink mentions an allowed account.
    pub fn permits(&self, canonical: Option<&str>) -> bool {
        match (canonical, &self.pattern) {
            (Some(link), Some(re)) => re.is_match(link),
            _ => false,
        }
    }
}
