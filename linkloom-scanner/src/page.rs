//! Page records moved through the crawl pipeline.
//!
//! A [`Page`] is owned by exactly one party at a time: the work queue, then
//! the crawl task that claimed it, then the graph recorder. Other pages only
//! ever hold its shared identity ([`PageRef`]), which never changes after
//! creation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Shared, immutable identity of a page.
pub type PageRef = Arc<CanonicalUrl>;

/// An absolute URL with query string and fragment removed.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CanonicalUrl {
    url: Url,
    key: String,
}

impl CanonicalUrl {
    pub fn new(mut url: Url) -> Self {
        url.set_query(None);
        url.set_fragment(None);
        let key = dedup_key(url.as_str());
        Self { url, key }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Scheme-stripped key shared by the dedup map and the graph.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Strip the scheme and `//` so `http://h/p` and `https://h/p` collide.
pub fn dedup_key(url: &str) -> String {
    match url.split_once("//") {
        Some((_, rest)) => rest.to_string(),
        None => url.to_string(),
    }
}

/// Outbound link to another page with the number of times it occurs.
#[derive(Debug, Clone)]
pub struct PageWithCard {
    pub page: PageRef,
    pub card: u32,
}

/// A static asset referenced by a page. Assets are graph leaves and are
/// never crawled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatPage {
    pub title: String,
    pub url: String,
}

impl StatPage {
    pub fn from_url(url: &Url) -> Self {
        Self {
            title: stat_title(url),
            url: url.to_string(),
        }
    }
}

/// Last path segment, e.g. `qq.js` for `http://abcd.com/static/qq.js`.
pub fn stat_title(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug)]
pub struct Page {
    id: PageRef,
    out_links: BTreeMap<String, PageWithCard>,
    statics: BTreeMap<String, StatPage>,
    fail_count: u32,
}

impl Page {
    pub fn new(url: Url) -> Self {
        Self::from_ref(Arc::new(CanonicalUrl::new(url)))
    }

    pub fn parse(raw: &str) -> crate::Result<Self> {
        let url = Url::parse(raw).map_err(|e| crate::ScanError::InvalidUrl(format!("{raw}: {e}")))?;
        if url.host_str().is_none() {
            return Err(crate::ScanError::InvalidUrl(format!("{raw}: missing host")));
        }
        Ok(Self::new(url))
    }

    pub fn from_ref(id: PageRef) -> Self {
        Self {
            id,
            out_links: BTreeMap::new(),
            statics: BTreeMap::new(),
            fail_count: 0,
        }
    }

    pub fn id(&self) -> &PageRef {
        &self.id
    }

    pub fn url(&self) -> &Url {
        self.id.url()
    }

    pub fn key(&self) -> &str {
        self.id.key()
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    /// Records one more failed fetch and returns the new total.
    pub fn record_failure(&mut self) -> u32 {
        self.fail_count += 1;
        self.fail_count
    }

    /// Outbound links keyed by [`dedup_key`].
    pub fn out_links(&self) -> &BTreeMap<String, PageWithCard> {
        &self.out_links
    }

    /// The link towards `url`, matched on the scheme-stripped key.
    pub fn link(&self, url: &str) -> Option<&PageWithCard> {
        self.out_links.get(&dedup_key(url))
    }

    pub fn statics(&self) -> &BTreeMap<String, StatPage> {
        &self.statics
    }

    /// Bumps the cardinality of an existing link. Returns `false` when the
    /// page does not link to `url` yet.
    pub fn bump_link(&mut self, url: &str) -> bool {
        match self.out_links.get_mut(&dedup_key(url)) {
            Some(link) => {
                link.card += 1;
                true
            }
            None => false,
        }
    }

    /// Adds a link occurrence towards `target`, creating the edge with
    /// cardinality 1 on first sight.
    pub fn link_to(&mut self, target: PageRef) {
        match self.out_links.get_mut(target.key()) {
            Some(link) => link.card += 1,
            None => {
                let key = target.key().to_string();
                self.out_links.insert(key, PageWithCard { page: target, card: 1 });
            }
        }
    }

    /// Records a static asset once per page.
    pub fn add_static(&mut self, asset: StatPage) {
        self.statics.entry(asset.url.clone()).or_insert(asset);
    }
}
