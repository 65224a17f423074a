pub mod crawl;
pub mod error;
pub mod graph;
pub mod render;

use colored::Colorize;

pub use crawl::{
    CrawlOptions, CrawlReport, CrawlSummary, Shutdown, execute_crawl, generate_crawl_summary,
};
pub use error::{CoreError, Result};
pub use graph::{GraphRecorder, RecorderHandle, SiteEdge, SiteGraph, SiteNode};
pub use render::{OutputPaths, render_dot, render_json, write_outputs};

pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("{}", "  ╷  ╶┬╴ ┌┐╷ ╷┌  ╷  ┌─┐ ┌─┐ ┌┬┐".bright_cyan());
    eprintln!("{}", "  │   │  │└┤ ├┴┐ │  │ │ │ │ │││".bright_cyan());
    eprintln!("{}", "  └─╴╶┴╴ ╵ ╵ ╵ ╵ └─╴└─┘ └─┘ ╵ ╵".cyan());
    eprintln!("  {} {}\n", "weaving link graphs".dimmed(), format!("v{version}").dimmed());
}
