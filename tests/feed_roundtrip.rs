// tests/feed_roundtrip.rs
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use timeline2rss::Feed;

fn ts(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(h, m, s).unwrap()
}

#[test]
fn export_then_import_preserves_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rss.xml");

    let mut feed = Feed::new("スプラトゥーン3", "https://twitter.com/SplatoonJP", "公式 & more");
    feed.add_item(
        "【更新】Ver.3.0.0...",
        "https://twitter.com/SplatoonJP/status/100/",
        "【更新】Ver.3.0.0\n配信しました <詳細> https://t.co/x",
        Some(ts(1, 10, 0, 5)),
    );
    feed.add_item("  padded  ...", "https://twitter.com/SplatoonJP/status/101/", "  padded  ", None);
    let precise = ts(2, 9, 30, 15).with_nanosecond(123_000_000).unwrap();
    feed.add_item("quote 'it' \"now\"...", "https://twitter.com/Nintendo/status/7/", "quote 'it' \"now\"", Some(precise));
    feed.export(&path).unwrap();

    let back = Feed::import(&path).expect("feed should import");
    assert_eq!(back.title(), "スプラトゥーン3");
    assert_eq!(back.link(), "https://twitter.com/SplatoonJP");
    assert_eq!(back.description(), "公式 & more");
    assert_eq!(back.len(), 3);

    for item in feed.items() {
        let copy = back
            .items()
            .iter()
            .find(|i| i.link == item.link)
            .expect("link survives the round trip");
        assert_eq!(copy.title, item.title);
        assert_eq!(copy.description, item.description);
        assert_eq!(copy.published_at, item.published_at.and_then(|t| t.with_nanosecond(0)));
        assert!(back.is_registered(&item.link));
    }

    // file order is newest first, undated last
    let order: Vec<&str> = back.items().iter().map(|i| i.link.as_str()).collect();
    assert_eq!(
        order,
        [
            "https://twitter.com/Nintendo/status/7/",
            "https://twitter.com/SplatoonJP/status/100/",
            "https://twitter.com/SplatoonJP/status/101/",
        ]
    );
}

#[test]
fn exported_dates_are_non_increasing() {
    let mut feed = Feed::new("t", "l", "d");
    feed.add_item("a", "a", "", Some(ts(3, 0, 0, 0)));
    feed.add_item("b", "b", "", None);
    feed.add_item("c", "c", "", Some(ts(9, 0, 0, 0)));
    feed.add_item("d", "d", "", Some(ts(3, 0, 0, 0)));
    feed.add_item("e", "e", "", Some(ts(1, 0, 0, 0)));

    let dates: Vec<Option<NaiveDateTime>> = feed.sorted_items().iter().map(|i| i.published_at).collect();
    assert!(dates.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(dates.last(), Some(&None));
}

#[test]
fn export_overwrites_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rss.xml");

    let mut big = Feed::new("t", "l", "d");
    for i in 0..20 {
        big.add_item(format!("item {i}"), format!("https://e/a/status/{i}/"), "x".repeat(200), None);
    }
    big.export(&path).unwrap();

    let small = Feed::new("t", "l", "d");
    small.export(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("<item>"));
    assert!(text.trim_end().ends_with("</rss>"));
    assert!(Feed::import(&path).unwrap().is_empty());
}

#[test]
fn item_missing_link_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rss.xml");
    std::fs::write(
        &path,
        r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0">
  <channel>
    <title>feed</title>
    <link>https://twitter.com/SplatoonJP</link>
    <description>desc</description>
    <item>
      <title>good...</title>
      <link>https://twitter.com/SplatoonJP/status/1/</link>
      <description>good</description>
      <pubDate>Wed, 01 May 2024 10:00:05</pubDate>
    </item>
    <item>
      <title>no link...</title>
      <description>broken</description>
      <pubDate>Wed, 01 May 2024 11:00:00</pubDate>
    </item>
  </channel>
</rss>
"#,
    )
    .unwrap();

    let feed = Feed::import(&path).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.items()[0].title, "good...");
    assert_eq!(feed.items()[0].published_at, Some(ts(1, 10, 0, 5)));
}

#[test]
fn bad_pub_date_keeps_item_without_timestamp() {
    let xml = r#"<rss version="2.0"><channel><title>f</title><link>l</link><description>d</description>
        <item><title>t</title><link>https://e/a/status/1/</link><description>x</description><pubDate>2024-05-01 10:00</pubDate></item>
        <item><title>u</title><link>https://e/a/status/2/</link><description/></item>
    </channel></rss>"#;
    let feed = Feed::parse(xml).unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed.items()[0].published_at, None);
    assert_eq!(feed.items()[1].description, "");
}

#[test]
fn duplicate_links_in_file_keep_the_first() {
    let xml = r#"<rss version="2.0"><channel><title>f</title><link>l</link><description>d</description>
        <item><title>first</title><link>https://e/a/status/1/</link><description>1</description></item>
        <item><title>second</title><link>https://e/a/status/1/</link><description>2</description></item>
    </channel></rss>"#;
    let feed = Feed::parse(xml).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.items()[0].title, "first");
}

#[test]
fn unusable_documents_import_as_none() {
    let dir = tempfile::tempdir().unwrap();

    assert!(Feed::import(dir.path().join("absent.xml")).is_none());

    let cases = [
        ("garbage.xml", "this is not xml <<<"),
        ("mismatched.xml", "<rss version=\"2.0\"><channel></item></rss>"),
        ("atom.xml", "<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>"),
        ("old.xml", "<rss version=\"0.92\"><channel></channel></rss>"),
        ("nochannel.xml", "<rss version=\"2.0\"></rss>"),
        ("empty.xml", ""),
    ];
    for (name, body) in cases {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        assert!(Feed::import(&path).is_none(), "{name} should not import");
    }
}
