//! JSON message dataset loading
//!
//! Each data file holds a JSON array of message records. A directory is
//! scanned for `*.json` files in name order; unreadable files are skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::fraud_detection::{MessageRecord, Result};

/// Load messages from one JSON file
pub fn load_file(path: &Path) -> Result<Vec<MessageRecord>> {
    let content = std::fs::read_to_string(path)?;
    let messages: Vec<MessageRecord> = serde_json::from_str(&content)?;
    Ok(messages)
}

/// Load messages from every `*.json` file in `dir`. A missing directory yields no messages.
pub fn load_dir(dir: &Path) -> Result<Vec<MessageRecord>> {
    if !dir.exists() {
        warn!("data directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut messages = Vec::new();
    for file in &files {
        match load_file(file) {
            Ok(batch) => messages.extend(batch),
            Err(e) => warn!("skipping {}: {}", file.display(), e),
        }
    }

    info!("📂 loaded {} messages from {} files", messages.len(), files.len());
    Ok(messages)
}

/// Load from a file or a directory
pub fn load(path: &Path) -> Result<Vec<MessageRecord>> {
    if path.is_dir() {
        load_dir(path)
    } else {
        load_file(path)
    }
}

/// Group messages by channel, preserving input order within each channel
pub fn group_messages(messages: &[MessageRecord]) -> BTreeMap<String, Vec<MessageRecord>> {
    let mut grouped: BTreeMap<String, Vec<MessageRecord>> = BTreeMap::new();
    for message in messages {
        grouped.entry(message.channel.clone()).or_default().push(message.clone());
    }
    grouped
}
