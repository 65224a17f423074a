pub mod classify;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod markup;
pub mod page;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod task;

pub use classify::{LinkClass, classify};
pub use dedup::DedupMap;
pub use error::{Result, ScanError};
pub use fetch::{Fetcher, HttpFetcher};
pub use page::{CanonicalUrl, Page, PageRef, PageWithCard, StatPage};
pub use queue::WorkQueue;
pub use scheduler::{Scheduler, SchedulerExit};
pub use stats::{CrawlCounters, CrawlOutcome, CrawlStats};
pub use task::{CrawlContext, PageSink, TaskSettings, crawl_page};
