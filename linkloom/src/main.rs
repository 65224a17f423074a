use colored::Colorize;
use linkloom::command_argument_builder;
use linkloom::handlers::{
    EXIT_FAILURE, EXIT_OK, RunConfig, build_runtime, exit_code, init_logging, report_error, run,
};
use linkloom_core::print_banner;

fn main() {
    let matches = command_argument_builder().get_matches();
    let config = RunConfig::from_matches(&matches);

    // Show banner unless --quiet flag is set
    if !config.quiet && !config.json {
        print_banner();
    }
    init_logging(config.verbosity, config.quiet);

    let runtime = match build_runtime(&config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} Failed to start the async runtime: {}", "✗".red().bold(), e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let code = runtime.block_on(async move {
        match run(config).await {
            Ok(()) => EXIT_OK,
            Err(e) => {
                report_error(&e);
                exit_code(&e)
            }
        }
    });

    std::process::exit(code);
}
