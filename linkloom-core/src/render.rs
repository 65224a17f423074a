// Graph serialization and image rendering

use crate::error::{CoreError, Result};
use crate::graph::{SiteEdge, SiteGraph, SiteNode};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

pub const GRAPH_NAME: &str = "linkloom";
pub const DOT_FILE: &str = "linkloom.dot";
pub const JSON_FILE: &str = "linkloom.json";

/// Image formats accepted by `dot -T`.
pub const IMAGE_FORMATS: &[&str] = &["svg", "png", "pdf", "jpg", "gif", "ps"];

/// Where the outputs of a run were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPaths {
    pub dot: PathBuf,
    pub json: Option<PathBuf>,
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders the graph as a strict Graphviz digraph.
pub fn render_dot(graph: &SiteGraph) -> String {
    let mut dot = String::new();
    let _ = writeln!(dot, "strict digraph {GRAPH_NAME} {{");

    for node in graph.nodes() {
        let id = quote(node.url());
        let _ = match node {
            SiteNode::Page { url } => writeln!(dot, "  {id} [URL={}];", quote(url)),
            SiteNode::Static { url, title } => writeln!(
                dot,
                "  {id} [URL={}, tooltip={}, style=dashed];",
                quote(title),
                quote(url)
            ),
        };
    }

    for (source, target, edge) in graph.edges() {
        let (from, to) = (quote(source.url()), quote(target.url()));
        let _ = match edge {
            SiteEdge::Link { card } => writeln!(dot, "  {from} -> {to} [label=\"{card}\"];"),
            SiteEdge::Asset => writeln!(dot, "  {from} -> {to} [style=dashed, color=blue];"),
        };
    }

    dot.push_str("}\n");
    dot
}

#[derive(Serialize)]
struct JsonNode<'a> {
    id: usize,
    #[serde(flatten)]
    node: &'a SiteNode,
}

#[derive(Serialize)]
struct JsonEdge {
    source: usize,
    target: usize,
    #[serde(flatten)]
    edge: SiteEdge,
}

#[derive(Serialize)]
struct JsonGraph<'a> {
    name: &'static str,
    pages: usize,
    nodes: Vec<JsonNode<'a>>,
    edges: Vec<JsonEdge>,
}

/// Renders the graph as a JSON node/edge list.
pub fn render_json(graph: &SiteGraph) -> Result<String> {
    let inner = graph.inner();
    let document = JsonGraph {
        name: GRAPH_NAME,
        pages: graph.page_count(),
        nodes: inner
            .node_indices()
            .map(|idx| JsonNode {
                id: idx.index(),
                node: &inner[idx],
            })
            .collect(),
        edges: inner
            .edge_indices()
            .filter_map(|idx| {
                let (source, target) = inner.edge_endpoints(idx)?;
                Some(JsonEdge {
                    source: source.index(),
                    target: target.index(),
                    edge: inner[idx],
                })
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn save_output(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Writes `linkloom.dot`, and `linkloom.json` when asked, into `out_dir`.
pub fn write_outputs(graph: &SiteGraph, out_dir: &Path, json: bool) -> Result<OutputPaths> {
    fs::create_dir_all(out_dir)?;

    let dot = out_dir.join(DOT_FILE);
    save_output(&render_dot(graph), &dot)?;
    info!("Persisted graph to {}", dot.display());

    let json = if json {
        let path = out_dir.join(JSON_FILE);
        save_output(&render_json(graph)?, &path)?;
        info!("Persisted graph to {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(OutputPaths { dot, json })
}

/// Looks `program` up on `PATH`.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Pipes `dot_text` through `dot -T<format>` and writes
/// `linkloom.<format>` into `out_dir`.
pub fn render_image(dot_program: &Path, dot_text: &str, format: &str, out_dir: &Path) -> Result<PathBuf> {
    let file_name = format!("{GRAPH_NAME}.{format}");
    debug!("Running {} -T{} -o {}", dot_program.display(), format, file_name);

    let mut child = Command::new(dot_program)
        .arg(format!("-T{format}"))
        .arg("-o")
        .arg(&file_name)
        .current_dir(out_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CoreError::Render(format!("failed to start {}: {}", dot_program.display(), e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(dot_text.as_bytes())
            .map_err(|e| CoreError::Render(format!("failed to feed graph to dot: {e}")))?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(CoreError::Render(format!(
            "dot exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let image = out_dir.join(file_name);
    info!("Generated image {}", image.display());
    Ok(image)
}

/// Opens `image` with the user's display program.
pub fn display_image(program: &str, image: &Path) -> Result<()> {
    let status = Command::new(program)
        .arg(image)
        .status()
        .map_err(|e| CoreError::Render(format!("failed to run {program}: {e}")))?;
    if !status.success() {
        return Err(CoreError::Render(format!("{program} exited with {status}")));
    }
    Ok(())
}
