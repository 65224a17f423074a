//! Link classification.
//!
//! Every `href`/`src` value found on a page is resolved against the page's
//! URL and sorted into a static asset, a same-domain page or something we
//! ignore. Query strings and fragments are dropped *before* the extension
//! and host checks so query variants collapse into one node.

use crate::error::{Result, ScanError};
use crate::page::StatPage;
use tracing::trace;
use url::Url;

/// Extensions treated as static assets: images, audio, video, scripts,
/// styles and feeds.
pub const STATIC_EXTENSIONS: &[&str] = &[
    "jpg", "gif", "bmp", "jpeg", "png", "svg", "mp3", "mp4", "flv", "js", "css", "webm", "ogg",
    "flac", "wav", "ico", "atom", "rss", "xml",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClass {
    Static(StatPage),
    SamePage(Url),
    Skip,
}

/// Classifies one attribute value found on the page at `base`.
///
/// Returns an error when the value cannot be resolved into a URL; callers
/// treat that as a reason to distrust the whole page.
pub fn classify(raw: &str, base: &Url) -> Result<LinkClass> {
    let link = raw.trim();

    if is_data_uri(link) {
        trace!("Skipping data uri on {}", base);
        return Ok(LinkClass::Skip);
    }

    let mut resolved = base.join(link).map_err(|e| ScanError::MalformedLink {
        page: base.to_string(),
        link: link.to_string(),
        reason: e.to_string(),
    })?;
    resolved.set_query(None);
    resolved.set_fragment(None);

    if !matches!(resolved.scheme(), "http" | "https") {
        trace!("Skipping non-http link {}", resolved);
        return Ok(LinkClass::Skip);
    }

    if is_static(&resolved) {
        return Ok(LinkClass::Static(StatPage::from_url(&resolved)));
    }

    if same_host(&resolved, base) {
        Ok(LinkClass::SamePage(resolved))
    } else {
        trace!("Skipping cross-domain link {}", resolved);
        Ok(LinkClass::Skip)
    }
}

fn is_data_uri(link: &str) -> bool {
    link.get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

/// Whether the URL's path ends in one of [`STATIC_EXTENSIONS`].
pub fn is_static(url: &Url) -> bool {
    let segment = url.path().rsplit('/').next().unwrap_or_default();
    let Some((stem, extension)) = segment.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() {
        return false;
    }
    STATIC_EXTENSIONS
        .iter()
        .any(|candidate| extension.eq_ignore_ascii_case(candidate))
}

fn same_host(url: &Url, base: &Url) -> bool {
    url.host_str().is_some() && url.host_str() == base.host_str() && url.port() == base.port()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://ex.com/docs/index.html").unwrap()
    }

    #[test]
    fn test_data_uri_is_skipped() {
        let class = classify("data:image/png;base64,AAAA", &base()).unwrap();
        assert_eq!(class, LinkClass::Skip);
        let class = classify("  DATA:text/plain,hi", &base()).unwrap();
        assert_eq!(class, LinkClass::Skip);
    }

    #[test]
    fn test_relative_link_resolves_against_base() {
        let class = classify("guide.html", &base()).unwrap();
        assert_eq!(
            class,
            LinkClass::SamePage(Url::parse("http://ex.com/docs/guide.html").unwrap())
        );
        let class = classify("/a", &base()).unwrap();
        assert_eq!(class, LinkClass::SamePage(Url::parse("http://ex.com/a").unwrap()));
    }

    #[test]
    fn test_query_and_fragment_are_stripped() {
        let first = classify("/a?page=1#top", &base()).unwrap();
        let second = classify("/a?page=2", &base()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, LinkClass::SamePage(Url::parse("http://ex.com/a").unwrap()));
    }

    #[test]
    fn test_static_extensions() {
        for link in ["/logo.png", "/img/x.svg", "/s.css", "/app.js", "/v.mp4", "/feed.rss", "/F.PNG"] {
            match classify(link, &base()).unwrap() {
                LinkClass::Static(stat) => assert!(stat.url.starts_with("http://ex.com/")),
                other => panic!("{link} classified as {other:?}"),
            }
        }
    }

    #[test]
    fn test_static_check_runs_after_query_strip() {
        let class = classify("/style.css?v=42", &base()).unwrap();
        assert_eq!(
            class,
            LinkClass::Static(StatPage {
                title: "style.css".to_string(),
                url: "http://ex.com/style.css".to_string(),
            })
        );
    }

    #[test]
    fn test_cross_domain_assets_are_still_static() {
        let class = classify("https://cdn.other.com/lib.js", &base()).unwrap();
        assert!(matches!(class, LinkClass::Static(_)));
    }

    #[test]
    fn test_cross_domain_page_is_skipped() {
        let class = classify("https://other.com/a", &base()).unwrap();
        assert_eq!(class, LinkClass::Skip);
        let class = classify("http://sub.ex.com/a", &base()).unwrap();
        assert_eq!(class, LinkClass::Skip);
    }

    #[test]
    fn test_https_variant_of_same_host_is_same_page() {
        let class = classify("https://ex.com/secure", &base()).unwrap();
        assert_eq!(
            class,
            LinkClass::SamePage(Url::parse("https://ex.com/secure").unwrap())
        );
    }

    #[test]
    fn test_different_port_is_skipped() {
        let class = classify("http://ex.com:8080/a", &base()).unwrap();
        assert_eq!(class, LinkClass::Skip);
    }

    #[test]
    fn test_non_http_schemes_are_skipped() {
        assert_eq!(classify("mailto:me@ex.com", &base()).unwrap(), LinkClass::Skip);
        assert_eq!(classify("javascript:void(0)", &base()).unwrap(), LinkClass::Skip);
        assert_eq!(classify("tel:+123", &base()).unwrap(), LinkClass::Skip);
    }

    #[test]
    fn test_unresolvable_link_is_an_error() {
        let result = classify("http://[::1", &base());
        assert!(matches!(result, Err(ScanError::MalformedLink { .. })));
    }

    #[test]
    fn test_is_static_ignores_dotted_directories() {
        assert!(!is_static(&Url::parse("http://ex.com/v1.js/page").unwrap()));
        assert!(!is_static(&Url::parse("http://ex.com/about").unwrap()));
        assert!(!is_static(&Url::parse("http://ex.com/.css").unwrap()));
    }
}
