//! Site graph and the recorder that builds it.
//!
//! The recorder is the only writer of the graph. Crawl tasks hand it
//! finished pages over a channel and never see the graph itself. Nodes are
//! keyed by the scheme-stripped URL, so `http://` and `https://` variants of
//! a page collapse into one node, and the graph is strict: at most one edge
//! per ordered pair of nodes.

use crate::error::Result;
use linkloom_scanner::page::dedup_key;
use linkloom_scanner::{Page, PageSink};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Buffer between crawl tasks and the recorder.
pub const RECORDER_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteNode {
    Page { url: String },
    Static { url: String, title: String },
}

impl SiteNode {
    pub fn url(&self) -> &str {
        match self {
            SiteNode::Page { url } | SiteNode::Static { url, .. } => url,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, SiteNode::Static { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteEdge {
    /// Page-to-page link and the number of times it occurs on the source.
    Link { card: u32 },
    /// Page-to-asset reference.
    Asset,
}

#[derive(Debug, Default)]
pub struct SiteGraph {
    graph: DiGraph<SiteNode, SiteEdge>,
    index: HashMap<String, NodeIndex>,
    recorded: HashSet<String>,
}

impl SiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a crawled page, its outbound links and its assets.
    pub fn add_page(&mut self, page: &Page) {
        let source = self.page_node(page.url().as_str());
        self.recorded.insert(page.key().to_string());

        for link in page.out_links().values() {
            let target = self.page_node(link.page.as_str());
            match self.graph.find_edge(source, target) {
                Some(edge) => {
                    if let Some(SiteEdge::Link { card }) = self.graph.edge_weight_mut(edge) {
                        *card += link.card;
                    }
                }
                None => {
                    self.graph.add_edge(source, target, SiteEdge::Link { card: link.card });
                }
            }
        }

        for asset in page.statics().values() {
            let target = self.static_node(&asset.url, &asset.title);
            self.graph.update_edge(source, target, SiteEdge::Asset);
        }

        trace!(
            "Recorded {} ({} links, {} assets)",
            page.url(),
            page.out_links().len(),
            page.statics().len()
        );
    }

    fn page_node(&mut self, url: &str) -> NodeIndex {
        let key = dedup_key(url);
        if let Some(idx) = self.index.get(&key) {
            return *idx;
        }
        let idx = self.graph.add_node(SiteNode::Page {
            url: url.to_string(),
        });
        self.index.insert(key, idx);
        idx
    }

    fn static_node(&mut self, url: &str, title: &str) -> NodeIndex {
        let key = dedup_key(url);
        if let Some(idx) = self.index.get(&key) {
            return *idx;
        }
        let idx = self.graph.add_node(SiteNode::Static {
            url: url.to_string(),
            title: title.to_string(),
        });
        self.index.insert(key, idx);
        idx
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of pages whose own links made it into the graph.
    pub fn page_count(&self) -> usize {
        self.recorded.len()
    }

    pub fn static_count(&self) -> usize {
        self.graph.node_weights().filter(|n| n.is_static()).count()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(&dedup_key(url))
    }

    /// Whether `url` was recorded as a crawled page, as opposed to only
    /// appearing as a link target.
    pub fn is_recorded(&self, url: &str) -> bool {
        self.recorded.contains(&dedup_key(url))
    }

    pub fn node(&self, url: &str) -> Option<&SiteNode> {
        self.index
            .get(&dedup_key(url))
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<SiteEdge> {
        let from = self.index.get(&dedup_key(from))?;
        let to = self.index.get(&dedup_key(to))?;
        let edge = self.graph.find_edge(*from, *to)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Cardinality of the link `from -> to`, if there is one.
    pub fn link_card(&self, from: &str, to: &str) -> Option<u32> {
        match self.edge(from, to)? {
            SiteEdge::Link { card } => Some(card),
            SiteEdge::Asset => None,
        }
    }

    pub fn out_degree(&self, url: &str) -> usize {
        self.index
            .get(&dedup_key(url))
            .map(|idx| self.graph.edges_directed(*idx, Direction::Outgoing).count())
            .unwrap_or(0)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &SiteNode> {
        self.graph.node_weights()
    }

    /// Edges as `(source, target, edge)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&SiteNode, &SiteNode, SiteEdge)> {
        self.graph
            .edge_references()
            .map(move |e| (&self.graph[e.source()], &self.graph[e.target()], *e.weight()))
    }

    pub fn inner(&self) -> &DiGraph<SiteNode, SiteEdge> {
        &self.graph
    }
}

/// Handle on a running recorder.
pub struct RecorderHandle {
    pub(crate) stop: CancellationToken,
    pub(crate) task: JoinHandle<SiteGraph>,
}

impl RecorderHandle {
    /// Stops the recorder once it has drained every page already sent and
    /// returns the finished graph.
    pub async fn finish(self) -> Result<SiteGraph> {
        self.stop.cancel();
        Ok(self.task.await?)
    }
}

pub struct GraphRecorder;

impl GraphRecorder {
    /// Starts the recorder loop. Pages sent on the returned sink end up in
    /// the graph returned by [`RecorderHandle::finish`].
    pub fn spawn(capacity: usize) -> (PageSink, RecorderHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        let stop = CancellationToken::new();
        let task = tokio::spawn(record_loop(rx, stop.clone()));
        (tx, RecorderHandle { stop, task })
    }
}

async fn record_loop(mut rx: mpsc::Receiver<Page>, stop: CancellationToken) -> SiteGraph {
    info!("Starting the graph recorder");
    let mut graph = SiteGraph::new();

    loop {
        tokio::select! {
            page = rx.recv() => match page {
                Some(page) => graph.add_page(&page),
                None => {
                    debug!("Every page sink dropped");
                    break;
                }
            },
            _ = stop.cancelled() => {
                rx.close();
                let mut late = 0;
                while let Ok(page) = rx.try_recv() {
                    graph.add_page(&page);
                    late += 1;
                }
                debug!("Recorded {} buffered pages on stop", late);
                break;
            }
        }
    }

    info!(
        "Halting the graph recorder with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkloom_scanner::StatPage;
    use url::Url;

    fn page_with_links(url: &str, links: &[(&str, u32)], assets: &[&str]) -> Page {
        let mut page = Page::parse(url).unwrap();
        for (target, card) in links {
            let id = Page::parse(target).unwrap().id().clone();
            for _ in 0..*card {
                page.link_to(id.clone());
            }
        }
        for asset in assets {
            page.add_static(StatPage::from_url(&Url::parse(asset).unwrap()));
        }
        page
    }

    #[test]
    fn test_add_page_creates_link_and_asset_edges() {
        let mut graph = SiteGraph::new();
        graph.add_page(&page_with_links(
            "http://ex.com/",
            &[("http://ex.com/a", 2), ("http://ex.com/b", 1)],
            &["http://ex.com/logo.png"],
        ));

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.link_card("http://ex.com/", "http://ex.com/a"), Some(2));
        assert_eq!(graph.link_card("http://ex.com/", "http://ex.com/b"), Some(1));
        assert_eq!(
            graph.edge("http://ex.com/", "http://ex.com/logo.png"),
            Some(SiteEdge::Asset)
        );
        assert_eq!(
            graph.node("http://ex.com/logo.png"),
            Some(&SiteNode::Static {
                url: "http://ex.com/logo.png".to_string(),
                title: "logo.png".to_string(),
            })
        );
        assert!(graph.is_recorded("http://ex.com/"));
        assert!(!graph.is_recorded("http://ex.com/a"));
    }

    #[test]
    fn test_scheme_variants_share_a_node() {
        let mut graph = SiteGraph::new();
        graph.add_page(&page_with_links("http://ex.com/", &[("http://ex.com/a", 1)], &[]));
        graph.add_page(&page_with_links("https://ex.com/a", &[("https://ex.com/", 1)], &[]));

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.page_count(), 2);
        assert_eq!(graph.link_card("https://ex.com/", "http://ex.com/a"), Some(1));
        assert_eq!(graph.link_card("http://ex.com/a", "http://ex.com/"), Some(1));
        assert_eq!(graph.node("https://ex.com/").unwrap().url(), "http://ex.com/");
    }

    #[test]
    fn test_static_shared_between_pages_is_one_node() {
        let mut graph = SiteGraph::new();
        graph.add_page(&page_with_links("http://ex.com/", &[], &["http://ex.com/app.js"]));
        graph.add_page(&page_with_links("http://ex.com/a", &[], &["http://ex.com/app.js"]));

        assert_eq!(graph.static_count(), 1);
        assert_eq!(graph.edge_count(), 2);
    }

    #[tokio::test]
    async fn test_recorder_drains_buffered_pages_on_finish() {
        let (sink, handle) = GraphRecorder::spawn(16);
        for i in 0..10 {
            let url = format!("http://ex.com/{i}");
            sink.send(page_with_links(&url, &[("http://ex.com/", 1)], &[]))
                .await
                .unwrap();
        }

        let graph = handle.finish().await.unwrap();
        assert_eq!(graph.page_count(), 10);
        assert_eq!(graph.node_count(), 11);
        assert!(sink.send(Page::parse("http://ex.com/late").unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn test_recorder_stops_when_sinks_drop() {
        let (sink, handle) = GraphRecorder::spawn(4);
        sink.send(page_with_links("http://ex.com/", &[], &[])).await.unwrap();
        drop(sink);

        let graph = handle.finish().await.unwrap();
        assert_eq!(graph.page_count(), 1);
    }
}
