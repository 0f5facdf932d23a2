use std::path::Path;

use anyhow::Context;
use parity_extract::{parse_all_blocks, parse_har};
use parity_replay::{DiffOptions, diff_bodies, render_text_diff, summarize};
use parity_storage::SqliteHistoryStore;
use serde_json::json;

use crate::input::{load_config, read_file, resolve_request};
use crate::render::print_body_diff;
use crate::{DiffArgs, HistoryArgs, InputArgs};

pub fn extract(args: &InputArgs) -> anyhow::Result<()> {
    let (request, format) = resolve_request(args)?;
    tracing::info!(%format, method = %request.method, path = %request.path, "request extracted");
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

pub fn blocks(file: &Path) -> anyhow::Result<()> {
    let blocks = parse_all_blocks(&read_file(file)?);
    if blocks.is_empty() {
        println!("No requests found in {}", file.display());
        return Ok(());
    }
    for (index, block) in blocks.iter().enumerate() {
        println!(
            "{index:>3}  {:<12} lines {}-{}  {} {}",
            block.name,
            block.start_line + 1,
            block.end_line + 1,
            block.request.method,
            block.request.path
        );
    }
    Ok(())
}

pub fn har(file: &Path) -> anyhow::Result<()> {
    let entries = parse_har(&read_file(file)?);
    if entries.is_empty() {
        println!("No HAR entries found in {}", file.display());
        return Ok(());
    }
    for entry in &entries {
        println!("{:>3}  {}", entry.index, entry.summary);
    }
    Ok(())
}

pub fn diff(args: &DiffArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let left = read_file(&args.left)?;
    let right = read_file(&args.right)?;
    let options = DiffOptions::new(
        config
            .ignore_diff_paths
            .iter()
            .chain(&args.ignore)
            .cloned(),
    );

    let body = diff_bodies(&left, &right, &options);
    let summary = summarize(&body.nodes);
    let text_diff = (!body.is_json).then(|| render_text_diff(&left, &right));

    if args.json {
        let output = json!({
            "bodyDiff": body.nodes,
            "isJsonDiff": body.is_json,
            "summary": summary,
            "textDiff": text_diff,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_body_diff(&body.nodes, &summary, text_diff.as_deref());
    }
    Ok(())
}

pub fn history(args: &HistoryArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let path = &config.history.path;
    if !path.exists() {
        println!("No history recorded yet");
        return Ok(());
    }
    let store = SqliteHistoryStore::open(path)
        .with_context(|| format!("failed to open history at {}", path.display()))?;

    if args.clear {
        let removed = store.clear()?;
        println!("Removed {removed} history entries");
        return Ok(());
    }

    let entries = store.list(Some(args.limit))?;
    if entries.is_empty() {
        println!("No history recorded yet");
    }
    for entry in entries {
        let statuses: Vec<String> = entry
            .targets
            .iter()
            .map(|target| {
                let status = entry
                    .status_summary
                    .get(target)
                    .map(String::as_str)
                    .unwrap_or("-");
                format!("{target}={status}")
            })
            .collect();
        println!(
            "{}  {:<7} {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.method,
            entry.path,
            statuses.join(" ")
        );
    }
    Ok(())
}
