use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::link::AccountAllowList;
use crate::page::chrome::ChromeOptions;

/// timeline2rss - append a profile's recent posts to a persistent RSS feed
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Profile whose timeline is harvested
    #[arg(long, env = "T2R_PROFILE_URL", default_value = "https://twitter.com/SplatoonJP")]
    pub profile_url: Url,

    /// Login form location
    #[arg(long, env = "T2R_LOGIN_URL", default_value = "https://twitter.com/login/")]
    pub login_url: Url,

    /// Feed file, read at startup and rewritten at the end (its directory must exist)
    #[arg(short, long, env = "T2R_OUTPUT", default_value = "docs/assets/rss/rss.xml")]
    pub output: PathBuf,

    /// Channel title
    #[arg(long, env = "T2R_FEED_TITLE", default_value = "スプラトゥーン3")]
    pub feed_title: String,

    /// Channel link
    #[arg(long, env = "T2R_FEED_LINK", default_value = "https://twitter.com/SplatoonJP")]
    pub feed_link: String,

    /// Channel description
    #[arg(long, env = "T2R_FEED_DESCRIPTION", default_value = "スプラトゥーン3公式Twitter")]
    pub feed_description: String,

    /// Account identifiers whose posts are accepted (comma-separated)
    #[arg(long, env = "T2R_ALLOW", value_delimiter = ',', default_value = "SplatoonJP,nintendo_cs,Nintendo")]
    pub allow: Vec<String>,

    /// Start from an empty feed instead of importing the existing file
    #[arg(long)]
    pub fresh: bool,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Upper bound for every readiness wait, in seconds
    #[arg(long = "wait-timeout-secs", env = "T2R_WAIT_TIMEOUT_SECS", default_value_t = 10)]
    pub wait_timeout_secs: u64,

    /// Where the diagnostic screenshot goes when a run aborts
    #[arg(long, env = "T2R_SCREENSHOT", default_value = "error.png")]
    pub screenshot: PathBuf,

    /// Disable the jittered pauses between browser steps
    #[arg(long)]
    pub no_pause: bool,

    /// Account identifier used to log in
    #[arg(long, env = "USERNAME", hide_env_values = true)]
    pub username: String,

    /// Secret used to log in
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl Args {
    pub fn allow_list(&self) -> AccountAllowList {
        AccountAllowList::new(self.allow.iter().cloned())
    }

    pub fn chrome_options(&self) -> ChromeOptions {
        ChromeOptions {
            headless: !self.headful,
            wait_timeout: Duration::from_secs(self.wait_timeout_secs),
            ..ChromeOptions::default()
        }
    }
}
