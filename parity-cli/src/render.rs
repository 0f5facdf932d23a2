use std::collections::HashMap;

use parity_core::{CanonicalResult, Target};
use parity_replay::{DiffKind, DiffNode, DiffResult, DiffSummary};
use serde_json::Value;

pub fn print_results(targets: &[Target], results: &[CanonicalResult]) {
    let names: HashMap<&str, &str> = targets
        .iter()
        .map(|target| (target.base_url.as_str(), target.name.as_str()))
        .collect();
    let width = names.values().map(|name| name.len()).max().unwrap_or(0);

    for result in results {
        let name = names
            .get(result.target.as_str())
            .copied()
            .unwrap_or(result.target.as_str());
        match &result.error {
            Some(error) => println!(
                "  {name:<width$}  {:<10}  {:>6} ms  {}",
                error.kind, result.duration_ms, error.message
            ),
            None => println!(
                "  {name:<width$}  {:<10}  {:>6} ms  {} bytes",
                result.status,
                result.duration_ms,
                result.body.len()
            ),
        }
    }
}

pub fn print_diff(diff: &DiffResult) {
    let summary = diff.summary();
    println!();
    println!("{}", summary_line(&summary));
    if diff.status_diff.changed {
        println!(
            "  status    {} -> {}",
            diff.status_diff.left, diff.status_diff.right
        );
    }
    for node in diff.header_changes() {
        println!("  header    {}", node_line(node));
    }
    for node in diff.body_changes() {
        println!("  body      {}", node_line(node));
    }
    if let Some(text_diff) = diff.text_diff.as_deref() {
        if diff.body_changes().next().is_some() {
            println!();
            print!("{text_diff}");
        }
    }
}

pub fn print_body_diff(nodes: &[DiffNode], summary: &DiffSummary, text_diff: Option<&str>) {
    println!("{}", summary_line(summary));
    for node in nodes.iter().filter(|node| node.is_change()) {
        println!("  {}", node_line(node));
    }
    if let Some(text_diff) = text_diff {
        if summary.has_diff {
            println!();
            print!("{text_diff}");
        }
    }
}

fn summary_line(summary: &DiffSummary) -> String {
    if !summary.has_diff {
        return "No differences".to_string();
    }
    format!(
        "{} difference(s): {} changed, {} added, {} removed",
        summary.total, summary.changed, summary.added, summary.removed
    )
}

fn node_line(node: &DiffNode) -> String {
    let left = node.left_value.as_ref().map(compact);
    let right = node.right_value.as_ref().map(compact);
    match node.kind {
        DiffKind::Added => format!("+ {}  {}", node.path, right.unwrap_or_default()),
        DiffKind::Removed => format!("- {}  {}", node.path, left.unwrap_or_default()),
        DiffKind::Changed => format!(
            "~ {}  {} -> {}",
            node.path,
            left.unwrap_or_default(),
            right.unwrap_or_default()
        ),
        DiffKind::Unchanged => format!("  {}", node.path),
    }
}

fn compact(value: &Value) -> String {
    const MAX: usize = 80;
    let text = value.to_string();
    if text.chars().count() <= MAX {
        return text;
    }
    let mut shortened: String = text.chars().take(MAX).collect();
    shortened.push_str("...");
    shortened
}
