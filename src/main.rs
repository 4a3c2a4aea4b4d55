use clap::Parser;
use timeline2rss::config::Args;
use timeline2rss::page::chrome::ChromeDriver;
use timeline2rss::page::PageDriver;
use timeline2rss::text::preview;
use timeline2rss::{Feed, HarvestReport, Harvester, Pacer};

fn main() {
    // .env is optional; real environment variables take precedence
    let _ = dotenvy::dotenv();
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init_timed();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            log::error!(target: "main", "{e:#}");
            std::process::exit(4);
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let pacer = if args.no_pause { Pacer::none() } else { Pacer::jittered() };

    let previous = if args.fresh { None } else { Feed::import(&args.output) };
    let feed = previous.unwrap_or_else(|| Feed::new(&args.feed_title, &args.feed_link, &args.feed_description));
    let mut harvester = Harvester::new(feed, args.allow_list(), pacer);

    let mut driver = ChromeDriver::launch(&args.chrome_options(), pacer)?;

    let result = harvest(args, &mut driver, &mut harvester);
    harvester.persist(&mut driver, result, &args.output, &args.screenshot)?;
    Ok(())
}

fn harvest(args: &Args, driver: &mut ChromeDriver, harvester: &mut Harvester) -> anyhow::Result<HarvestReport> {
    driver.login(&args.login_url, &args.username, &args.password)?;
    driver.goto(&args.profile_url)?;

    // Capture the listing once; each candidate is found again by its text
    // because the timeline reflows between navigations.
    let excerpts = driver.visible_excerpts()?;
    log::info!(target: "main", "{} elements found", excerpts.len());
    for (i, text) in excerpts.iter().enumerate() {
        log::info!(target: "main", "  - [{i}] {}", preview(text, 20));
    }

    Ok(harvester.run(driver, &excerpts)?)
}
