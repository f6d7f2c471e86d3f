//! Scan a statistics landing page for downloadable data-file links.
//!
//! The ABS pages wrap anchor text in decorative span tags and mix relative
//! with absolute hrefs; scanning strips the markup noise, classifies each
//! link by its file suffix and resolves everything to absolute URLs.

use crate::fetch::Fetcher;
use scraper::Html;
use scraper::Selector;
use std::collections::BTreeMap;
use tracing::debug;
use tracing::warn;

/// Canonical scheme and host re-prepended to every discovered link.
pub const ABS_SITE_PREFIX: &str = "https://www.abs.gov.au";

/// Recognised download-link kinds, in classification order (first match
/// wins) and in processing order (archives before standalone spreadsheets).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkType {
    Zip,
    Xlsx,
    Xls,
}

impl LinkType {
    pub const ALL: [LinkType; 3] = [LinkType::Zip, LinkType::Xlsx, LinkType::Xls];

    /// Canonical lower-case suffix for this link kind.
    pub fn suffix(self) -> &'static str {
        match self {
            LinkType::Zip => ".zip",
            LinkType::Xlsx => ".xlsx",
            LinkType::Xls => ".xls",
        }
    }
}

/// Classified download links scanned from one landing page.
/// URLs are absolute; per-type order reflects page scan order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkSet {
    links: BTreeMap<LinkType, Vec<String>>,
}

impl LinkSet {
    pub fn is_empty(&self) -> bool {
        self.links.values().all(Vec::is_empty)
    }

    /// Total link count across every type.
    pub fn len(&self) -> usize {
        self.links.values().map(Vec::len).sum()
    }

    pub fn get(&self, kind: LinkType) -> &[String] {
        self.links.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (LinkType, &[String])> {
        self.links.iter().map(|(kind, urls)| (*kind, urls.as_slice()))
    }

    fn push(&mut self, kind: LinkType, url: String) {
        self.links.entry(kind).or_default().push(url);
    }

    /// Ages every link so it points at a dated release: the history tag
    /// replaces the second-to-last path segment, keeping the filename.
    /// A heuristic string transform; URLs with fewer than two path
    /// separators are left untouched.
    pub fn historicise(&self, history: &str) -> LinkSet {
        let mut aged = LinkSet::default();
        for (kind, urls) in self.iter() {
            for url in urls {
                aged.push(kind, historicise_url(url, history));
            }
        }
        aged
    }
}

fn historicise_url(url: &str, history: &str) -> String {
    let parts: Vec<&str> = url.rsplitn(3, '/').collect(); // [tail, second-last, head]
    if parts.len() == 3 {
        format!("{}/{}/{}", parts[2], history, parts[0])
    } else {
        url.to_string()
    }
}

/// Converts a relative URL found on the ABS site to an absolute one.
/// Any existing scheme+host prefix (http or https) is stripped first, so
/// accidentally absolute links are normalised rather than doubled.
pub fn make_absolute_url(url: &str, prefix: &str) -> String {
    let insecure = prefix.replacen("https://", "http://", 1);
    let url = url.replace(prefix, "").replace(&insecure, "");
    format!("{prefix}{url}")
}

/// The table name embedded in a data-file URL: the final path segment up
/// to its first period.
pub fn table_name(url: &str) -> String {
    let tail = url.rsplit('/').next().unwrap_or(url);
    tail.split('.').next().unwrap_or(tail).to_string()
}

/// Scans HTML bytes for recognised download links.
/// With `ignore_pivot` set, links whose filename mentions "pivot" (non
/// time-series companion files) are skipped.
pub fn scan(html: &[u8], ignore_pivot: bool) -> LinkSet {
    // Drop span wrappers and collapse whitespace before parsing; the
    // decorative markup otherwise corrupts some anchor runs.
    let span_tags = regex::bytes::Regex::new(r"(?i)<span[^>]*>|</span>").expect("span pattern");
    let whitespace = regex::bytes::Regex::new(r"\s+").expect("whitespace pattern");
    let page = span_tags.replace_all(html, b" ".as_slice());
    let page = whitespace.replace_all(&page, b" ".as_slice());
    let page = String::from_utf8_lossy(&page);

    let document = Html::parse_document(&page);
    let anchors = Selector::parse("a").expect("anchor selector");

    let mut links = LinkSet::default();
    for anchor in document.select(&anchors) {
        let href = match anchor.value().attr("href") {
            Some(href) => href,
            None => continue,
        };
        let filename = href.rsplit('/').next().unwrap_or(href).to_lowercase();
        if ignore_pivot && filename.contains("pivot") {
            continue;
        }
        for kind in LinkType::ALL {
            if filename.ends_with(kind.suffix()) {
                links.push(kind, make_absolute_url(href, ABS_SITE_PREFIX));
                break;
            }
        }
    }
    links
}

/// Fetches a landing page and scans it for data links.
/// Fetch failures are non-fatal: the error is logged and an empty LinkSet
/// returned so the caller can carry on.
pub fn get_data_links(
    fetcher: &dyn Fetcher,
    url: &str,
    ignore_pivot: bool,
    history: Option<&str>,
) -> LinkSet {
    let page = match fetcher.get_file(url) {
        Ok(page) => page,
        Err(error) => {
            warn!(url, %error, "could not fetch landing page for link scan");
            return LinkSet::default();
        }
    };

    let mut links = scan(&page, ignore_pivot);
    if let Some(history) = history {
        links = links.historicise(history);
    }

    for (kind, urls) in links.iter() {
        let tables: Vec<String> = urls.iter().map(|url| table_name(url)).collect();
        debug!(?kind, count = urls.len(), ?tables, "found data links");
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &[u8] = br#"<html><body>
        <a href="/statistics/labour/6202.0/jun-2024/6202001.xlsx"><span class="f">Table 1</span></a>
        <a href="https://www.abs.gov.au/statistics/labour/6202.0/jun-2024/6202002.XLSX">Table 2</a>
        <a href="http://www.abs.gov.au/statistics/labour/6202.0/jun-2024/all_tables.zip">All</a>
        <a href="/statistics/labour/6202.0/jun-2024/pivot_table.xlsx">Pivot</a>
        <a href="/statistics/labour/6202.0/jun-2024/legacy.xls">Legacy</a>
        <a href="/statistics/labour/6202.0/about.pdf">About</a>
        <a name="no-href">anchor</a>
    </body></html>"#;

    #[test]
    fn test_scan_classifies_and_absolutises() {
        let links = scan(PAGE, true);
        assert_eq!(links.len(), 4);
        assert_eq!(
            links.get(LinkType::Xlsx),
            &[
                "https://www.abs.gov.au/statistics/labour/6202.0/jun-2024/6202001.xlsx",
                "https://www.abs.gov.au/statistics/labour/6202.0/jun-2024/6202002.XLSX",
            ]
        );
        assert_eq!(
            links.get(LinkType::Zip),
            &["https://www.abs.gov.au/statistics/labour/6202.0/jun-2024/all_tables.zip"]
        );
        assert_eq!(
            links.get(LinkType::Xls),
            &["https://www.abs.gov.au/statistics/labour/6202.0/jun-2024/legacy.xls"]
        );

        // Every URL is absolute and carries the suffix of its classification
        for (kind, urls) in links.iter() {
            for url in urls {
                assert!(url.starts_with(ABS_SITE_PREFIX), "not absolute: {url}");
                assert!(
                    url.to_lowercase().ends_with(kind.suffix()),
                    "wrong suffix: {url}"
                );
            }
        }
    }

    #[test]
    fn test_pivot_filter_is_optional() {
        assert_eq!(scan(PAGE, true).get(LinkType::Xlsx).len(), 2);
        assert_eq!(scan(PAGE, false).get(LinkType::Xlsx).len(), 3);
    }

    #[test]
    fn test_make_absolute_url_strips_existing_prefixes() {
        let prefix = ABS_SITE_PREFIX;
        assert_eq!(
            make_absolute_url("/statistics/a.zip", prefix),
            "https://www.abs.gov.au/statistics/a.zip"
        );
        assert_eq!(
            make_absolute_url("https://www.abs.gov.au/statistics/a.zip", prefix),
            "https://www.abs.gov.au/statistics/a.zip"
        );
        assert_eq!(
            make_absolute_url("http://www.abs.gov.au/statistics/a.zip", prefix),
            "https://www.abs.gov.au/statistics/a.zip"
        );
    }

    #[test]
    fn test_historicise_places_tag_before_filename() {
        let links = scan(PAGE, true).historicise("dec-2021");
        for (_, urls) in links.iter() {
            for url in urls {
                let segments: Vec<&str> = url.rsplitn(3, '/').collect();
                assert_eq!(segments[1], "dec-2021");
            }
        }
        assert_eq!(
            links.get(LinkType::Zip),
            &["https://www.abs.gov.au/statistics/labour/6202.0/dec-2021/all_tables.zip"]
        );
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("https://x/y/6202001.xlsx"), "6202001");
        assert_eq!(table_name("6202005_trend.xlsx"), "6202005_trend");
        assert_eq!(table_name("https://x/y/1364015003.zip"), "1364015003");
    }

    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn get_file(&self, url: &str) -> Result<Vec<u8>, crate::fetch::FetchError> {
            Err(crate::fetch::FetchError::Http {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[test]
    fn test_fetch_failure_yields_empty_link_set() {
        let links = get_data_links(&FailingFetcher, "https://www.abs.gov.au/x", true, None);
        assert!(links.is_empty());
    }
}
