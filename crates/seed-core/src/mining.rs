//! Keyword pattern mining over a source tree.
//!
//! `scan` walks a directory and counts regex matches line by line; `analyze`
//! ranks the result; `render_markdown` turns an analysis into a report.

use crate::config::{MineConfig, PatternConfig};
use crate::error::{Result, SeedError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];
const MAX_HIT_TEXT: usize = 200;
const TOP_FILES: usize = 5;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    pub regex: Regex,
}

pub fn compile(patterns: &[PatternConfig]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&p.regex)
                .map(|regex| Pattern {
                    name: p.name.clone(),
                    regex,
                })
                .map_err(|e| SeedError::Failed(format!("invalid pattern '{}': {e}", p.name)))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub file: String,
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatches {
    pub name: String,
    pub regex: String,
    pub count: usize,
    /// Match counts per file, relative to the scanned directory.
    pub files: BTreeMap<String, usize>,
    /// First hits only; see `MineConfig::max_hits_per_pattern`.
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub source_dir: String,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub patterns: Vec<PatternMatches>,
}

pub fn scan(dir: &Path, cfg: &MineConfig) -> Result<ScanReport> {
    if !dir.is_dir() {
        return Err(SeedError::Failed(format!(
            "source directory not found: {}",
            dir.display()
        )));
    }
    let patterns = compile(&cfg.patterns)?;

    let mut report = ScanReport {
        source_dir: dir.display().to_string(),
        files_scanned: 0,
        files_skipped: 0,
        patterns: patterns
            .iter()
            .map(|p| PatternMatches {
                name: p.name.clone(),
                regex: p.regex.as_str().to_string(),
                count: 0,
                files: BTreeMap::new(),
                hits: Vec::new(),
            })
            .collect(),
    };

    let mut files = Vec::new();
    collect_files(dir, &cfg.extensions, &mut files)?;

    for file in files {
        let size = std::fs::metadata(&file)?.len();
        if size > cfg.max_file_bytes {
            report.files_skipped += 1;
            continue;
        }
        // Binary or non-UTF-8 content is skipped, not an error.
        let Ok(content) = std::fs::read_to_string(&file) else {
            report.files_skipped += 1;
            continue;
        };
        report.files_scanned += 1;

        let rel = file
            .strip_prefix(dir)
            .unwrap_or(&file)
            .display()
            .to_string();

        for (line_no, line) in content.lines().enumerate() {
            for (pattern, matches) in patterns.iter().zip(report.patterns.iter_mut()) {
                let n = pattern.regex.find_iter(line).count();
                if n == 0 {
                    continue;
                }
                matches.count += n;
                *matches.files.entry(rel.clone()).or_insert(0) += n;
                if matches.hits.len() < cfg.max_hits_per_pattern {
                    matches.hits.push(Hit {
                        file: rel.clone(),
                        line: line_no + 1,
                        text: truncate(line.trim(), MAX_HIT_TEXT),
                    });
                }
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        files = report.files_scanned,
        skipped = report.files_skipped,
        "scan complete"
    );
    Ok(report)
}

/// Files under `dir` with one of `extensions`, in name order.
/// Hidden entries and build/dependency directories are skipped.
fn collect_files(
    dir: &Path,
    extensions: &[String],
    out: &mut Vec<std::path::PathBuf>,
) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_str()) {
                continue;
            }
            collect_files(&entry.path(), extensions, out)?;
        } else if file_type.is_file() {
            let path = entry.path();
            let matches_ext = path
                .extension()
                .map(|e| e.to_string_lossy())
                .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(&e)));
            if matches_ext {
                out.push(path);
            }
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCount {
    pub file: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub name: String,
    pub count: usize,
    /// Share of all hits, in percent.
    pub share_pct: f64,
    pub files_matched: usize,
    pub top_files: Vec<FileCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub source_dir: String,
    pub files_scanned: usize,
    pub total_hits: usize,
    /// Patterns with at least one hit, most frequent first.
    pub patterns: Vec<PatternSummary>,
    pub silent_patterns: Vec<String>,
}

pub fn analyze(scan: &ScanReport) -> Analysis {
    let total_hits: usize = scan.patterns.iter().map(|p| p.count).sum();

    let mut patterns: Vec<PatternSummary> = scan
        .patterns
        .iter()
        .filter(|p| p.count > 0)
        .map(|p| {
            let mut top: Vec<FileCount> = p
                .files
                .iter()
                .map(|(file, count)| FileCount {
                    file: file.clone(),
                    count: *count,
                })
                .collect();
            top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.file.cmp(&b.file)));
            let files_matched = top.len();
            top.truncate(TOP_FILES);
            PatternSummary {
                name: p.name.clone(),
                count: p.count,
                share_pct: p.count as f64 / total_hits as f64 * 100.0,
                files_matched,
                top_files: top,
            }
        })
        .collect();
    patterns.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    let silent_patterns = scan
        .patterns
        .iter()
        .filter(|p| p.count == 0)
        .map(|p| p.name.clone())
        .collect();

    Analysis {
        source_dir: scan.source_dir.clone(),
        files_scanned: scan.files_scanned,
        total_hits,
        patterns,
        silent_patterns,
    }
}

pub fn render_markdown(analysis: &Analysis, source_artifact: &str) -> String {
    let mut md = String::new();
    md.push_str("# Pattern mining report\n\n");
    md.push_str(&format!("- Source directory: `{}`\n", analysis.source_dir));
    md.push_str(&format!("- Files scanned: {}\n", analysis.files_scanned));
    md.push_str(&format!("- Total matches: {}\n", analysis.total_hits));
    md.push_str(&format!("- Analysis artifact: `{source_artifact}`\n\n"));

    if analysis.patterns.is_empty() {
        md.push_str("No pattern matched.\n");
    } else {
        md.push_str("| Pattern | Matches | Share | Files |\n");
        md.push_str("|---|---:|---:|---:|\n");
        for p in &analysis.patterns {
            md.push_str(&format!(
                "| {} | {} | {:.1}% | {} |\n",
                p.name, p.count, p.share_pct, p.files_matched
            ));
        }
        for p in &analysis.patterns {
            md.push_str(&format!("\n## {}\n\n", p.name));
            for f in &p.top_files {
                md.push_str(&format!("- `{}`: {}\n", f.file, f.count));
            }
        }
    }

    if !analysis.silent_patterns.is_empty() {
        md.push_str(&format!(
            "\nNo matches for: {}\n",
            analysis.silent_patterns.join(", ")
        ));
    }
    md
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
