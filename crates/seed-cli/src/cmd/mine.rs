use super::{dispatch, open_session, say};
use seed_core::mining::{self, Analysis, ScanReport};
use seed_core::router::{CommandRouter, StepReport};
use seed_core::session::Session;
use seed_core::{Result, SeedError};
use serde::Serialize;
use std::path::{Path, PathBuf};

const SCAN: &str = "scan";
const ANALYSIS: &str = "analysis";
const EXPORT: &str = "export";

pub fn router() -> CommandRouter {
    CommandRouter::new("mine", "help")
        .command("scan", "Scan source files for the configured patterns", scan)
        .command("analyze", "Summarize the latest scan", analyze)
        .command("export", "Write the latest analysis as Markdown", export)
        .workflow("all", "scan, analyze, export", &["scan", "analyze", "export"])
        .with_help()
}

pub fn run(root: &Path, args: &[String], json: bool, timeout: Option<u64>) -> anyhow::Result<()> {
    let session = open_session(root, json, timeout)?;
    dispatch(&router(), &session, args)
}

fn scan(session: &Session, args: &[String]) -> Result<StepReport> {
    let dir = match args.first() {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(&session.config.mine.source_dir),
    };
    let dir = if dir.is_absolute() {
        dir
    } else {
        session.root.join(dir)
    };

    let report = mining::scan(&dir, &session.config.mine)?;
    let path = session.artifacts.write(SCAN, &report)?;

    say(
        session,
        format!(
            "scan: {} files scanned, {} skipped, {} matches",
            report.files_scanned,
            report.files_skipped,
            report.patterns.iter().map(|p| p.count).sum::<usize>()
        ),
    );
    say(session, format!("  record: {}", path.display()));
    Ok(StepReport::artifact(path))
}

#[derive(Serialize)]
struct AnalysisRecord<'a> {
    source_artifact: String,
    #[serde(flatten)]
    analysis: &'a Analysis,
}

fn analyze(session: &Session, _args: &[String]) -> Result<StepReport> {
    let entry = session.artifacts.latest(SCAN)?.ok_or_else(|| {
        SeedError::Failed("no scan artifact; run 'seed mine scan' first".to_string())
    })?;
    let artifact = session.artifacts.read(&entry.path)?;
    let report: ScanReport = serde_json::from_value(artifact.payload.into()).map_err(|source| {
        SeedError::InvalidArtifact {
            path: entry.path.clone(),
            source,
        }
    })?;

    let analysis = mining::analyze(&report);
    let path = session.artifacts.write(
        ANALYSIS,
        &AnalysisRecord {
            source_artifact: entry.path.display().to_string(),
            analysis: &analysis,
        },
    )?;

    say(
        session,
        format!(
            "analyze: {} matches across {} patterns",
            analysis.total_hits,
            analysis.patterns.len()
        ),
    );
    for p in &analysis.patterns {
        say(session, format!("  {:<12} {:>5}  {:>5.1}%", p.name, p.count, p.share_pct));
    }
    if !analysis.silent_patterns.is_empty() {
        say(session, format!("  no matches: {}", analysis.silent_patterns.join(", ")));
    }
    say(session, format!("  record: {}", path.display()));
    Ok(StepReport::artifact(path))
}

fn export(session: &Session, _args: &[String]) -> Result<StepReport> {
    let entry = session.artifacts.latest(ANALYSIS)?.ok_or_else(|| {
        SeedError::Failed("no analysis artifact; run 'seed mine analyze' first".to_string())
    })?;
    let artifact = session.artifacts.read(&entry.path)?;
    let analysis: Analysis = serde_json::from_value(artifact.payload.into()).map_err(|source| {
        SeedError::InvalidArtifact {
            path: entry.path.clone(),
            source,
        }
    })?;

    let markdown = mining::render_markdown(&analysis, &entry.path.display().to_string());
    let target = session.artifacts.summary_path(EXPORT, "md")?;
    let path = session.artifacts.write_summary(&target, &markdown)?;

    say(session, format!("export: {}", path.display()));
    Ok(StepReport::artifact(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use seed_core::config::Config;
    use tempfile::TempDir;

    fn project() -> (TempDir, Session) {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("notes.md"),
            "an error here\nTODO: fix\nsuccess!\n",
        )
        .unwrap();
        let session = Session::new(dir.path(), Config::default()).with_json(true);
        (dir, session)
    }

    #[test]
    fn analyze_without_scan_fails() {
        let (_dir, session) = project();
        let err = analyze(&session, &[]).unwrap_err();
        assert_eq!(err.kind(), "failed");
        assert!(err.to_string().contains("seed mine scan"));
    }

    #[test]
    fn export_without_analysis_fails() {
        let (_dir, session) = project();
        let err = export(&session, &[]).unwrap_err();
        assert!(err.to_string().contains("seed mine analyze"));
    }

    #[test]
    fn scan_analyze_export_chain() {
        let (_dir, session) = project();
        scan(&session, &[]).unwrap();
        let analysis = analyze(&session, &[]).unwrap();
        let record = session.artifacts.read(&analysis.artifacts[0]).unwrap();
        assert!(record.payload["source_artifact"]
            .as_str()
            .unwrap()
            .contains("scan_"));
        assert_eq!(record.payload["total_hits"], 3);

        let exported = export(&session, &[]).unwrap();
        let md = std::fs::read_to_string(&exported.artifacts[0]).unwrap();
        assert!(md.starts_with("# Pattern mining report"));
        assert_eq!(exported.artifacts[0].extension().unwrap(), "md");
    }

    #[test]
    fn scan_accepts_directory_argument() {
        let (dir, session) = project();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/a.txt"), "error\n").unwrap();

        let step = scan(&session, &["docs".to_string()]).unwrap();
        let record = session.artifacts.read(&step.artifacts[0]).unwrap();
        assert_eq!(record.payload["files_scanned"], 1);
    }

    #[test]
    fn scan_missing_directory_fails() {
        let (_dir, session) = project();
        let err = scan(&session, &["nope".to_string()]).unwrap_err();
        assert_eq!(err.kind(), "failed");
    }
}
