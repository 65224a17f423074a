use crate::CLAP_STYLING;
use clap::{ArgAction, arg, command, value_parser};
use linkloom_core::render::IMAGE_FORMATS;

pub fn command_argument_builder() -> clap::Command {
    command!()
        .name("linkloom")
        .bin_name("linkloom")
        .about("Crawl a site from a root URL and weave its pages into a link graph")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-u --"url" <URL>)
                .required(true)
                .help("The root URL to crawl"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Network timeout for each request, in seconds")
                .value_parser(value_parser!(u64))
                .default_value("60"),
        )
        .arg(
            arg!(--"crawl-timeout" <SECONDS>)
                .required(false)
                .help("Give up on a page that takes longer than this to crawl, in seconds")
                .value_parser(value_parser!(u64))
                .default_value("10"),
        )
        .arg(
            arg!(-r --"retry" <COUNT>)
                .required(false)
                .help("How many times a failed fetch is retried")
                .value_parser(value_parser!(u32))
                .default_value("2"),
        )
        .arg(
            arg!(-t --"threads" <NUM>)
                .required(false)
                .help("Runtime worker threads (0 = available parallelism)")
                .value_parser(value_parser!(usize))
                .default_value("0"),
        )
        .arg(
            arg!(--"max-in-flight" <NUM>)
                .required(false)
                .help("Cap on pages crawled at once (0 = unbounded)")
                .value_parser(value_parser!(usize))
                .default_value("0"),
        )
        .arg(
            arg!(--"no-graph")
                .required(false)
                .help("Do not build the link graph")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["gen-image", "display-prog"]),
        )
        .arg(
            arg!(--"gen-image")
                .required(false)
                .help("Render the graph to an image with dot (graphviz)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(-f --"format" <FORMAT>)
                .required(false)
                .help("Image format passed to dot")
                .value_parser(IMAGE_FORMATS.to_vec())
                .default_value("svg"),
        )
        .arg(
            arg!(--"display-prog" <PROGRAM>)
                .required(false)
                .help("Open the rendered image with this program (implies --gen-image)"),
        )
        .arg(
            arg!(-o --"output-dir" <PATH>)
                .required(false)
                .help("Directory for linkloom.dot and other outputs")
                .default_value("."),
        )
        .arg(
            arg!(--"json")
                .required(false)
                .help("Also export the graph as JSON and print the summary as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(--"progress")
                .required(false)
                .help("Show a live progress spinner")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(-v --"verbose" ...)
                .required(false)
                .help("More logging; repeat for more detail"),
        )
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
}
