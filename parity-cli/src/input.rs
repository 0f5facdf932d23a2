use std::io::Read;
use std::path::Path;

use anyhow::{Context, bail};
use parity_core::CanonicalRequest;
use parity_extract::{extract_har_entry, extract_request, parse_all_blocks};
use parity_storage::{DEFAULT_CONFIG_FILE, ParityConfig};
use tracing::debug;

use crate::{ConfigArgs, InputArgs};

pub fn read_source(args: &InputArgs) -> anyhow::Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    if let Some(path) = &args.file {
        return read_file(path);
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read request from stdin")?;
    Ok(text)
}

pub fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Extracts the request selected by `args`, with a label for the source
/// format it was read as.
pub fn resolve_request(args: &InputArgs) -> anyhow::Result<(CanonicalRequest, String)> {
    let text = read_source(args)?;

    if let Some(index) = args.har_entry {
        let request = extract_har_entry(&text, index)
            .with_context(|| format!("HAR entry {index} not found or has no request"))?;
        return Ok((request, "har".to_string()));
    }

    if let Some(index) = args.block {
        let blocks = parse_all_blocks(&text);
        let Some(block) = blocks.into_iter().nth(index) else {
            bail!("request block {index} not found");
        };
        debug!(name = %block.name, start = block.start_line, end = block.end_line, "selected block");
        return Ok((block.request, "blocks".to_string()));
    }

    let extraction = extract_request(&text);
    match extraction.request {
        Some(request) => Ok((request, extraction.format.to_string())),
        None => bail!(
            "{}",
            extraction
                .reason
                .unwrap_or_else(|| "no request found".to_string())
        ),
    }
}

/// Loads the settings file, falling back to defaults when it does not exist.
pub fn load_config(args: &ConfigArgs) -> anyhow::Result<ParityConfig> {
    let path = args
        .path
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
    let config = ParityConfig::load_or_default(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    debug!(path = %path.display(), targets = config.targets.len(), "settings loaded");
    Ok(config)
}
