use crate::error::{CoreError, Result};
use crate::graph::{GraphRecorder, RECORDER_CAPACITY, RecorderHandle, SiteGraph};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use linkloom_scanner::dedup::DEDUP_CAPACITY;
use linkloom_scanner::queue::QUEUE_CAPACITY;
use linkloom_scanner::{
    CrawlContext, CrawlCounters, CrawlStats, DedupMap, Fetcher, Page, Scheduler, SchedulerExit,
    TaskSettings, WorkQueue,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub root_url: String,
    /// Timeout applied by the HTTP client to each request.
    pub network_timeout: Duration,
    /// Upper bound on crawling a single page.
    pub crawl_timeout: Duration,
    pub max_fetch_fail: u32,
    /// 0 leaves the number of concurrently crawled pages unbounded.
    pub max_in_flight: usize,
    pub gen_graph: bool,
    pub show_progress: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        let task = TaskSettings::default();
        Self {
            root_url: String::new(),
            network_timeout: Duration::from_secs(60),
            crawl_timeout: task.crawl_timeout,
            max_fetch_fail: task.max_fetch_fail,
            max_in_flight: 0,
            gen_graph: true,
            show_progress: false,
        }
    }
}

impl CrawlOptions {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            ..Self::default()
        }
    }

    /// Checks the options and returns the parsed root URL.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.root_url)
            .map_err(|e| CoreError::Config(format!("cannot parse root url {:?}: {}", self.root_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "root url must be http or https, got {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(CoreError::Config(format!("root url {} has no host", url)));
        }
        if self.network_timeout.is_zero() || self.crawl_timeout.is_zero() {
            return Err(CoreError::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(url)
    }

    pub fn task_settings(&self) -> TaskSettings {
        TaskSettings {
            crawl_timeout: self.crawl_timeout,
            max_fetch_fail: self.max_fetch_fail,
        }
    }
}

/// Root cancellation signal plus a latch so shutdown runs once no matter
/// how many parties ask for it.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fires the root token. Returns `false` if shutdown was already
    /// triggered.
    pub fn trigger(&self, reason: &str) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress, ignoring: {}", reason);
            return false;
        }
        info!("Time to leave and cleanup: {}", reason);
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Everything a finished crawl produced.
#[derive(Debug)]
pub struct CrawlReport {
    pub root: Url,
    pub exit: SchedulerExit,
    pub stats: CrawlStats,
    /// `None` when graph generation was turned off.
    pub graph: Option<SiteGraph>,
    /// Distinct URLs claimed in the dedup map.
    pub pages_claimed: usize,
    /// Tasks launched, retries included.
    pub tasks_launched: u64,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub root: String,
    pub completed: bool,
    pub started_at: String,
    pub duration_secs: f64,
    pub pages_claimed: usize,
    pub tasks_launched: u64,
    #[serde(flatten)]
    pub stats: CrawlStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_nodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_edges: Option<usize>,
}

impl CrawlReport {
    pub fn completed(&self) -> bool {
        self.exit == SchedulerExit::Completed
    }

    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            root: self.root.to_string(),
            completed: self.completed(),
            started_at: self.started_at.to_rfc3339(),
            duration_secs: self.duration.as_secs_f64(),
            pages_claimed: self.pages_claimed,
            tasks_launched: self.tasks_launched,
            stats: self.stats,
            graph_nodes: self.graph.as_ref().map(SiteGraph::node_count),
            graph_edges: self.graph.as_ref().map(SiteGraph::edge_count),
        }
    }
}

/// Live spinner fed from the crawl counters.
struct CrawlProgress {
    bar: ProgressBar,
    stop: CancellationToken,
    ticker: JoinHandle<()>,
}

impl CrawlProgress {
    fn start(counters: Arc<CrawlCounters>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Starting crawl...");
        bar.enable_steady_tick(Duration::from_millis(100));

        let stop = CancellationToken::new();
        let ticker = tokio::spawn({
            let bar = bar.clone();
            let stop = stop.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(250)) => {
                            bar.set_message(progress_message(&counters.snapshot()));
                        }
                    }
                }
            }
        });

        Self { bar, stop, ticker }
    }

    async fn finish(self, stats: &CrawlStats) {
        self.stop.cancel();
        let _ = self.ticker.await;
        self.bar
            .finish_with_message(format!("Crawl complete! {} pages processed", stats.total()));
    }
}

fn progress_message(stats: &CrawlStats) -> String {
    format!(
        "Crawling... {} ok, {} failed, {} skipped, {} cancelled",
        stats.succeeded, stats.failed, stats.skipped, stats.cancelled
    )
}

/// Crawls everything reachable from `options.root_url`.
///
/// Returns when the frontier is exhausted or `shutdown` fires. Either way
/// the run is wound down in one order: the root token is fired, in-flight
/// tasks are awaited, and only then is the graph recorder stopped, so every
/// page counted as succeeded is in the returned graph.
pub async fn execute_crawl(
    options: CrawlOptions,
    fetcher: Arc<dyn Fetcher>,
    shutdown: Shutdown,
) -> Result<CrawlReport> {
    let root_url = options.validate()?;
    let root = Page::new(root_url.clone());

    let started_at = Local::now();
    let clock = Instant::now();
    info!("Starting crawl for {} at {}", root_url, started_at);

    // The dedup store outlives the crawl tasks so it can still be counted.
    let store_stop = CancellationToken::new();
    let (dedup, dedup_task) = DedupMap::spawn(DEDUP_CAPACITY, store_stop.clone());
    let (queue, rx) = WorkQueue::new(QUEUE_CAPACITY, shutdown.token().clone());

    let (sink, recorder) = if options.gen_graph {
        let (sink, recorder) = GraphRecorder::spawn(RECORDER_CAPACITY);
        (Some(sink), Some(recorder))
    } else {
        (None, None)
    };

    let counters = Arc::new(CrawlCounters::new());
    if !queue.offer(root).await {
        warn!("Shutdown requested before the crawl started");
    }

    let ctx = Arc::new(CrawlContext {
        dedup: dedup.clone(),
        fetcher,
        queue,
        sink,
        counters: counters.clone(),
        settings: options.task_settings(),
    });

    let progress = options
        .show_progress
        .then(|| CrawlProgress::start(counters.clone()));

    let mut scheduler = Scheduler::new(ctx, rx, shutdown.token().clone())
        .with_max_in_flight(options.max_in_flight);
    let exit = scheduler.run().await;

    match exit {
        SchedulerExit::Completed => {
            info!("Crawling {} took {:?}", root_url, clock.elapsed());
            shutdown.trigger("crawl complete");
        }
        SchedulerExit::Cancelled => {
            shutdown.trigger("crawl interrupted");
        }
    }

    let drained = scheduler.drain().await;
    debug!("Drained {} in-flight tasks", drained);
    let tasks_launched = scheduler.launched();

    let closed = close_stores(recorder, &dedup, &store_stop, dedup_task).await;

    let stats = counters.snapshot();
    if let Some(progress) = progress {
        progress.finish(&stats).await;
    }
    let (graph, pages_claimed) = closed?;

    info!(
        "Crawl statistics: {} succeeded, {} failed, {} skipped, {} cancelled",
        stats.succeeded, stats.failed, stats.skipped, stats.cancelled
    );

    Ok(CrawlReport {
        root: root_url,
        exit,
        stats,
        graph,
        pages_claimed,
        tasks_launched,
        started_at,
        duration: clock.elapsed(),
    })
}

/// Stops the recorder, counts the dedup map, then stops the dedup store.
/// The store is stopped and awaited even when an earlier step fails.
async fn close_stores(
    recorder: Option<RecorderHandle>,
    dedup: &DedupMap,
    store_stop: &CancellationToken,
    dedup_task: JoinHandle<()>,
) -> Result<(Option<SiteGraph>, usize)> {
    let graph = match recorder {
        Some(recorder) => Some(recorder.finish().await),
        None => None,
    }
    .transpose();
    let pages_claimed = dedup.len().await;

    store_stop.cancel();
    let stopped = dedup_task.await;

    let graph = graph?;
    let pages_claimed = pages_claimed?;
    stopped?;
    Ok((graph, pages_claimed))
}

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Generate an end-of-run summary from a crawl report
pub fn generate_crawl_summary(report: &CrawlReport) -> String {
    let mut summary = String::new();
    summary.push_str(RULE);
    summary.push_str("\n\n# Summary:\n");
    summary.push_str(&format!("  Root: {}\n", report.root));
    summary.push_str(&format!(
        "  Started: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    ));
    summary.push_str(&format!("  Took: {:.2}s\n", report.duration.as_secs_f64()));
    if !report.completed() {
        summary.push_str("  Status: interrupted\n");
    }

    summary.push_str("\n# Crawl statistics:\n");
    summary.push_str(&format!("  Successfully crawled URLs: {}\n", report.stats.succeeded));
    summary.push_str(&format!("  Failed URLs: {}\n", report.stats.failed));
    summary.push_str(&format!("  Skipped URLs: {}\n", report.stats.skipped));
    summary.push_str(&format!("  Cancelled URLs: {}\n", report.stats.cancelled));
    summary.push_str(&format!("  Distinct URLs seen: {}\n", report.pages_claimed));

    if let Some(graph) = &report.graph {
        summary.push_str("\n# Graph:\n");
        summary.push_str(&format!(
            "  {} nodes ({} assets), {} edges\n",
            graph.node_count(),
            graph.static_count(),
            graph.edge_count()
        ));
    }

    summary.push('\n');
    summary.push_str(RULE);
    summary.push('\n');
    summary
}
