use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use linkloom_core::render::{display_image, find_in_path, render_image};
use linkloom_core::{
    CoreError, CrawlOptions, CrawlReport, Shutdown, execute_crawl, generate_crawl_summary,
    render_dot, write_outputs,
};
use linkloom_scanner::HttpFetcher;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Level, error, info, warn};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_TOOL_MISSING: i32 = 2;

/// Everything one invocation needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub options: CrawlOptions,
    /// Runtime worker threads, 0 for available parallelism.
    pub threads: usize,
    pub gen_image: bool,
    pub image_format: String,
    pub display_prog: Option<String>,
    pub output_dir: PathBuf,
    pub json: bool,
    pub verbosity: u8,
    pub quiet: bool,
}

impl RunConfig {
    pub fn from_matches(args: &ArgMatches) -> Self {
        let url = args.get_one::<String>("url").cloned().unwrap_or_default();
        let display_prog = args.get_one::<String>("display-prog").cloned();
        // A display program needs an image, and an image needs the graph.
        let gen_image = args.get_flag("gen-image") || display_prog.is_some();
        let gen_graph = !args.get_flag("no-graph") || gen_image;
        let quiet = args.get_flag("quiet");

        let output_dir = args
            .get_one::<String>("output-dir")
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()))
            .unwrap_or_else(|| PathBuf::from("."));

        let options = CrawlOptions {
            root_url: url,
            network_timeout: Duration::from_secs(*args.get_one::<u64>("timeout").unwrap_or(&60)),
            crawl_timeout: Duration::from_secs(*args.get_one::<u64>("crawl-timeout").unwrap_or(&10)),
            max_fetch_fail: *args.get_one::<u32>("retry").unwrap_or(&2),
            max_in_flight: *args.get_one::<usize>("max-in-flight").unwrap_or(&0),
            gen_graph,
            show_progress: args.get_flag("progress") && !quiet,
        };

        Self {
            options,
            threads: *args.get_one::<usize>("threads").unwrap_or(&0),
            gen_image,
            image_format: args
                .get_one::<String>("format")
                .cloned()
                .unwrap_or_else(|| "svg".to_string()),
            display_prog,
            output_dir,
            json: args.get_flag("json"),
            verbosity: args.get_count("verbose"),
            quiet,
        }
    }

    /// Whether progress lines go to stdout. `--json` keeps stdout for the
    /// summary document alone.
    pub fn human_output(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Worker threads for the runtime.
    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}

/// Maps `-v` occurrences to a log level. `--quiet` wins.
pub fn log_level(verbosity: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub fn init_logging(verbosity: u8, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbosity, quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn build_runtime(config: &RunConfig) -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
}

/// Exit status for a failed run.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let tool_missing = err
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<CoreError>(), Some(CoreError::ToolMissing(_))));
    if tool_missing {
        EXIT_TOOL_MISSING
    } else {
        EXIT_FAILURE
    }
}

/// Resolves when the process receives Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}

/// Fires `shutdown` on the first interrupt.
pub fn spawn_signal_listener(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger("interrupt signal");
    })
}

/// Looks up `dot` when an image was asked for.
pub fn check_tools(config: &RunConfig) -> Result<Option<PathBuf>, CoreError> {
    if !config.gen_image {
        return Ok(None);
    }
    find_in_path("dot")
        .map(Some)
        .ok_or_else(|| CoreError::ToolMissing("dot (from graphviz)".to_string()))
}

/// Runs one crawl end to end: checks, crawl, persistence, image.
pub async fn run(config: RunConfig) -> Result<()> {
    config
        .options
        .validate()
        .context("Invalid crawl configuration")?;
    let dot = check_tools(&config)?;

    let fetcher = HttpFetcher::with_timeout(config.options.network_timeout)
        .context("Failed to build HTTP client")?;

    if config.human_output() {
        println!(
            "{} Crawling {}",
            "→".blue(),
            config.options.root_url.bright_white()
        );
    }

    let shutdown = Shutdown::new();
    let listener = spawn_signal_listener(shutdown.clone());
    let report = execute_crawl(config.options.clone(), Arc::new(fetcher), shutdown).await;
    listener.abort();
    let report = report.context("Crawl failed")?;

    print_report(&config, &report)?;

    let Some(graph) = &report.graph else {
        return Ok(());
    };

    let paths = match write_outputs(graph, &config.output_dir, config.json) {
        Ok(paths) => paths,
        Err(e) => {
            error!("Failed to persist graph: {}", e);
            return Err(e).context(format!(
                "Could not write the graph to {}",
                config.output_dir.display()
            ));
        }
    };
    if config.human_output() {
        println!("{} Graph written to {}", "✓".green().bold(), paths.dot.display());
        if let Some(json) = &paths.json {
            println!("{} Graph written to {}", "✓".green().bold(), json.display());
        }
    }

    if let Some(dot) = dot {
        let image = render_image(&dot, &render_dot(graph), &config.image_format, &config.output_dir)
            .context("Image generation failed")?;
        if config.human_output() {
            println!("{} Image written to {}", "✓".green().bold(), image.display());
        }
        if let Some(program) = &config.display_prog {
            display_image(program, &image).context("Could not display the image")?;
        }
    }

    Ok(())
}

fn print_report(config: &RunConfig, report: &CrawlReport) -> Result<()> {
    if config.json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
        return Ok(());
    }
    if config.quiet {
        return Ok(());
    }

    println!();
    print!("{}", generate_crawl_summary(report));
    if report.completed() {
        println!("{} Crawl complete", "✓".green().bold());
    } else {
        println!("{} Crawl interrupted, graph holds the pages finished so far", "⚠".yellow().bold());
    }
    if report.stats.failed > 0 {
        println!(
            "{} {} pages could not be fetched",
            "✗".red().bold(),
            report.stats.failed
        );
    }
    Ok(())
}

/// Reports a failed run on stderr.
pub fn report_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "✗".red().bold(), err);
    if exit_code(err) == EXIT_TOOL_MISSING {
        eprintln!(
            "  {} install graphviz or drop --gen-image/--display-prog",
            "→".blue()
        );
    }
}
