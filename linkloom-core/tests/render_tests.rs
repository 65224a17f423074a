// Tests for graph serialization and output persistence

use linkloom_core::render::{DOT_FILE, JSON_FILE, find_in_path, render_image, write_outputs};
use linkloom_core::{CoreError, SiteGraph, render_dot, render_json};
use linkloom_scanner::{Page, StatPage};
use std::fs;
use tempfile::TempDir;
use url::Url;

fn sample_graph() -> SiteGraph {
    let a = Page::parse("http://ex.com/a").unwrap();
    let b = Page::parse("http://ex.com/b").unwrap();

    let mut root = Page::parse("http://ex.com/").unwrap();
    root.link_to(a.id().clone());
    root.link_to(a.id().clone());
    root.link_to(b.id().clone());
    root.add_static(StatPage::from_url(&Url::parse("http://ex.com/img/logo.png").unwrap()));

    let mut graph = SiteGraph::new();
    graph.add_page(&root);
    graph
}

// ============================================================================
// DOT
// ============================================================================

#[test]
fn test_render_dot_is_strict_digraph() {
    let dot = render_dot(&sample_graph());
    assert!(dot.starts_with("strict digraph linkloom {\n"));
    assert!(dot.ends_with("}\n"));
}

#[test]
fn test_render_dot_page_nodes_carry_url() {
    let dot = render_dot(&sample_graph());
    assert!(dot.contains(r#"  "http://ex.com/" [URL="http://ex.com/"];"#));
    assert!(dot.contains(r#"  "http://ex.com/a" [URL="http://ex.com/a"];"#));
}

#[test]
fn test_render_dot_static_nodes_are_dashed() {
    let dot = render_dot(&sample_graph());
    assert!(dot.contains(
        r#"  "http://ex.com/img/logo.png" [URL="logo.png", tooltip="http://ex.com/img/logo.png", style=dashed];"#
    ));
}

#[test]
fn test_render_dot_edges() {
    let dot = render_dot(&sample_graph());
    assert!(dot.contains(r#"  "http://ex.com/" -> "http://ex.com/a" [label="2"];"#));
    assert!(dot.contains(r#"  "http://ex.com/" -> "http://ex.com/b" [label="1"];"#));
    assert!(dot.contains(
        r#"  "http://ex.com/" -> "http://ex.com/img/logo.png" [style=dashed, color=blue];"#
    ));
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn test_render_json_lists_nodes_and_edges() {
    let json: serde_json::Value = serde_json::from_str(&render_json(&sample_graph()).unwrap()).unwrap();

    assert_eq!(json["name"], "linkloom");
    assert_eq!(json["pages"], 1);
    let nodes = json["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[0]["kind"], "page");
    assert_eq!(nodes[0]["url"], "http://ex.com/");

    let logo = nodes.iter().find(|n| n["kind"] == "static").unwrap();
    assert_eq!(logo["title"], "logo.png");

    let edges = json["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 3);
    let to_a = edges.iter().find(|e| e["kind"] == "link" && e["card"] == 2).unwrap();
    assert_eq!(to_a["source"], 0);
    assert!(edges.iter().any(|e| e["kind"] == "asset"));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_write_outputs_creates_dot_only_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("nested/out");

    let paths = write_outputs(&sample_graph(), &out_dir, false).unwrap();

    assert_eq!(paths.dot, out_dir.join(DOT_FILE));
    assert!(paths.json.is_none());
    let written = fs::read_to_string(&paths.dot).unwrap();
    assert_eq!(written, render_dot(&sample_graph()));
    assert!(!out_dir.join(JSON_FILE).exists());
}

#[test]
fn test_write_outputs_with_json() {
    let temp_dir = TempDir::new().unwrap();
    let paths = write_outputs(&sample_graph(), temp_dir.path(), true).unwrap();

    let json_path = paths.json.unwrap();
    assert_eq!(json_path, temp_dir.path().join(JSON_FILE));
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
    assert_eq!(value["nodes"].as_array().unwrap().len(), 4);
}

#[test]
fn test_write_outputs_fails_when_dir_is_a_file() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("taken");
    fs::write(&blocker, "not a directory").unwrap();

    let result = write_outputs(&sample_graph(), &blocker, false);
    assert!(matches!(result, Err(CoreError::Io(_))));
}

// ============================================================================
// Image rendering
// ============================================================================

#[test]
fn test_render_image_with_missing_program_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = render_image(
        &temp_dir.path().join("no-such-dot"),
        "strict digraph linkloom {\n}\n",
        "svg",
        temp_dir.path(),
    );
    assert!(matches!(result, Err(CoreError::Render(_))));
}

#[test]
fn test_render_image_with_dot_when_available() {
    let Some(dot) = find_in_path("dot") else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let image = render_image(&dot, &render_dot(&sample_graph()), "svg", temp_dir.path()).unwrap();

    assert_eq!(image, temp_dir.path().join("linkloom.svg"));
    assert!(fs::read_to_string(image).unwrap().contains("<svg"));
}
