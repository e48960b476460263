//! Appcast scanning for Sparkle-updated apps
//!
//! This is a pattern scan, not an XML parser. Vendor feeds are frequently
//! not well-formed, so each `<item>` is searched independently for:
//! - `sparkle:shortVersionString` (release)
//! - `sparkle:version` (build)
//! - the enclosure `url`
//!
//! Both attribute (`sparkle:version="12"`) and element
//! (`<sparkle:version>12</sparkle:version>`) spellings are recognised.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Error;
use crate::version::Version;

/// Best candidate found in a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub version: Version,
    pub download_url: Option<String>,
}

struct Patterns {
    item: Regex,
    release: Regex,
    build: Regex,
    enclosure_url: Regex,
    any_url: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        item: Regex::new(r"<item[\s>]").expect("valid item pattern"),
        release: Regex::new(
            r#"sparkle:shortVersionString\s*=\s*"([^"]+)"|<sparkle:shortVersionString>\s*([^<]+?)\s*</sparkle:shortVersionString>"#,
        )
        .expect("valid release pattern"),
        build: Regex::new(
            r#"sparkle:version\s*=\s*"([^"]+)"|<sparkle:version>\s*([^<]+?)\s*</sparkle:version>"#,
        )
        .expect("valid build pattern"),
        enclosure_url: Regex::new(r#"<enclosure\b[^>]*?\burl\s*=\s*"([^"]+)""#)
            .expect("valid enclosure pattern"),
        any_url: Regex::new(r#"\burl\s*=\s*"([^"]+)""#).expect("valid url pattern"),
    })
}

/// Scan a feed payload and return the entry with the highest version.
///
/// Ties keep the entry encountered first. Returns `None` when no entry
/// carries a version token.
pub fn parse_feed(payload: &str) -> Option<FeedItem> {
    let patterns = patterns();
    let mut best: Option<FeedItem> = None;

    for entry in patterns.item.split(payload) {
        let Some(candidate) = scan_entry(patterns, entry) else {
            continue;
        };

        match &best {
            Some(current) if current.version >= candidate.version => {}
            _ => best = Some(candidate),
        }
    }

    best
}

/// Like [`parse_feed`], reporting an empty result as an error for `app_id`.
pub fn best_feed_item(app_id: &str, payload: &str) -> Result<FeedItem, Error> {
    parse_feed(payload).ok_or_else(|| Error::UpdateInfoUnavailable {
        id: app_id.to_string(),
    })
}

fn scan_entry(patterns: &Patterns, entry: &str) -> Option<FeedItem> {
    let release = first_capture(&patterns.release, entry);
    let build = first_capture(&patterns.build, entry);

    if release.is_none() && build.is_none() {
        return None;
    }

    let download_url = first_capture(&patterns.enclosure_url, entry)
        .or_else(|| first_capture(&patterns.any_url, entry))
        .map(|url| unescape_entities(&url));

    Some(FeedItem {
        version: Version::new(release.as_deref(), build.as_deref()),
        download_url,
    })
}

fn first_capture(regex: &Regex, haystack: &str) -> Option<String> {
    let captures = regex.captures(haystack)?;
    captures
        .iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str().trim().to_string())
}

fn unescape_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(release: &str, build: &str, url: &str) -> String {
        format!(
            r#"<item>
                <title>Version {release}</title>
                <enclosure url="{url}" sparkle:version="{build}" sparkle:shortVersionString="{release}" length="1024" type="application/octet-stream"/>
            </item>"#
        )
    }

    fn feed(items: &[String]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:sparkle="http://www.andymatuschak.org/xml-namespaces/sparkle">
  <channel>
    <title>Example Changelog</title>
    {}
  </channel>
</rss>"#,
            items.join("\n")
        )
    }

    #[test]
    fn picks_highest_release() {
        let payload = feed(&[
            item("1.0", "100", "https://example.com/Example-1.0.zip"),
            item("2.0", "200", "https://example.com/Example-2.0.zip"),
        ]);

        let best = parse_feed(&payload).unwrap();
        assert_eq!(best.version.release_version(), Some("2.0"));
        assert_eq!(best.version.build_version(), Some("200"));
        assert_eq!(best.download_url.as_deref(), Some("https://example.com/Example-2.0.zip"));
    }

    #[test]
    fn order_of_entries_does_not_matter() {
        let payload = feed(&[
            item("2.0", "200", "https://example.com/new.zip"),
            item("1.0", "100", "https://example.com/old.zip"),
        ]);

        let best = parse_feed(&payload).unwrap();
        assert_eq!(best.download_url.as_deref(), Some("https://example.com/new.zip"));
    }

    #[test]
    fn ties_keep_first_entry() {
        let payload = feed(&[
            item("2.0", "200", "https://example.com/first.zip"),
            item("2.0", "200", "https://example.com/second.zip"),
        ]);

        let best = parse_feed(&payload).unwrap();
        assert_eq!(best.download_url.as_deref(), Some("https://example.com/first.zip"));
    }

    #[test]
    fn no_version_tokens_is_unavailable() {
        let payload = feed(&["<item><title>Nothing here</title></item>".to_string()]);

        assert_eq!(parse_feed(&payload), None);
        assert_eq!(
            best_feed_item("com.example.app", &payload),
            Err(Error::UpdateInfoUnavailable {
                id: "com.example.app".to_string()
            })
        );
    }

    #[test]
    fn build_only_entries_are_usable() {
        let payload = r#"<item><enclosure url="https://example.com/a.zip" sparkle:version="4521"/></item>"#;

        let best = parse_feed(payload).unwrap();
        assert_eq!(best.version, Version::build("4521"));
    }

    #[test]
    fn element_form_is_recognised() {
        let payload = r#"<item>
            <sparkle:version>310</sparkle:version>
            <sparkle:shortVersionString>3.1</sparkle:shortVersionString>
            <enclosure url="https://example.com/App-3.1.tar.gz" length="10"/>
        </item>"#;

        let best = parse_feed(payload).unwrap();
        assert_eq!(best.version, Version::new(Some("3.1"), Some("310")));
        assert_eq!(best.download_url.as_deref(), Some("https://example.com/App-3.1.tar.gz"));
    }

    #[test]
    fn entities_in_url_are_decoded() {
        let payload = r#"<item><enclosure url="https://example.com/get?v=2&amp;os=mac" sparkle:version="2"/></item>"#;

        let best = parse_feed(payload).unwrap();
        assert_eq!(best.download_url.as_deref(), Some("https://example.com/get?v=2&os=mac"));
    }

    #[test]
    fn missing_url_is_tolerated() {
        let payload = r#"<item sparkle:shortVersionString="5.0"></item>"#;

        let best = parse_feed(payload).unwrap();
        assert_eq!(best.version.release_version(), Some("5.0"));
        assert_eq!(best.download_url, None);
    }

    #[test]
    fn malformed_input_never_panics() {
        for payload in [
            "",
            "<item>",
            "<item><item><item>",
            r#"<item sparkle:version=""#,
            "\u{0}\u{fffd}<rss",
            r#"<item><enclosure url="unterminated sparkle:version="1"></item>"#,
        ] {
            let _ = parse_feed(payload);
        }
    }

    #[test]
    fn payload_without_item_tags_is_scanned_whole() {
        let payload = r#"<enclosure url="https://example.com/x.zip" sparkle:shortVersionString="1.5"/>"#;

        let best = parse_feed(payload).unwrap();
        assert_eq!(best.version.release_version(), Some("1.5"));
    }
}
