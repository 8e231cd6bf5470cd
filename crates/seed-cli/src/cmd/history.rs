use crate::output::{print_json, print_table};
use anyhow::Context;
use seed_core::artifact::ArtifactEntry;
use seed_core::session::Session;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct HistoryItem {
    timestamp: String,
    sequence: u32,
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

/// Recorded artifacts of `category`, oldest first. `limit` keeps the newest N.
pub fn run(root: &Path, category: &str, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let session = Session::load(root).context("failed to load config")?;
    let mut entries = session
        .artifacts
        .list(category)
        .with_context(|| format!("failed to list '{category}' artifacts"))?;
    if let Some(n) = limit {
        entries = entries.split_off(entries.len().saturating_sub(n));
    }

    let items: Vec<HistoryItem> = entries
        .iter()
        .map(|e| HistoryItem {
            timestamp: e.timestamp.to_rfc3339(),
            sequence: e.sequence,
            path: e.path.clone(),
            status: status_of(&session, e),
        })
        .collect();

    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No '{category}' artifacts recorded.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|i| {
            vec![
                i.timestamp.clone(),
                i.status.clone().unwrap_or_else(|| "-".to_string()),
                i.path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["TIMESTAMP", "STATUS", "PATH"], &rows);
    Ok(())
}

/// `status` (or workflow `outcome`) of a JSON artifact; unreadable files
/// are listed without one.
fn status_of(session: &Session, entry: &ArtifactEntry) -> Option<String> {
    if !entry.is_json() {
        return None;
    }
    let artifact = match session.artifacts.read(&entry.path) {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(path = %entry.path.display(), error = %e, "unreadable artifact");
            return None;
        }
    };
    artifact
        .payload
        .get("status")
        .or_else(|| artifact.payload.get("outcome"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
