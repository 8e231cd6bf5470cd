use super::bootstrap::{api_key_presence, verified_tools};
use crate::output::{print_json, print_table};
use anyhow::Context;
use seed_core::paths;
use seed_core::probe::ToolAvailability;
use seed_core::session::Session;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct StatusReport {
    root: PathBuf,
    /// `None` when running on built-in defaults.
    config_file: Option<PathBuf>,
    artifacts_dir: PathBuf,
    strict_collaborators: bool,
    collaborator_timeout_seconds: Option<u64>,
    tools: Vec<ToolAvailability>,
    api_keys: BTreeMap<String, bool>,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let session = Session::load(root).context("failed to load config")?;
    let config_path = paths::config_path(root);

    let report = StatusReport {
        root: root.to_path_buf(),
        config_file: config_path.is_file().then_some(config_path),
        artifacts_dir: session.artifacts.dir().to_path_buf(),
        strict_collaborators: session.config.strict_collaborators,
        collaborator_timeout_seconds: session.timeout.map(|t| t.as_secs()),
        tools: session.probe.probe_all(verified_tools(&session.config)),
        api_keys: api_key_presence(&session.config.bootstrap.api_key_env),
    };

    if json {
        return print_json(&report);
    }

    println!("root:       {}", report.root.display());
    match &report.config_file {
        Some(p) => println!("config:     {}", p.display()),
        None => println!("config:     defaults (no {})", paths::CONFIG_FILE),
    }
    println!("artifacts:  {}", report.artifacts_dir.display());
    println!();

    let rows: Vec<Vec<String>> = report
        .tools
        .iter()
        .map(|t| {
            vec![
                t.tool.clone(),
                if t.present { "yes" } else { "no" }.to_string(),
                t.path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["TOOL", "PRESENT", "PATH"], &rows);
    println!();

    let rows: Vec<Vec<String>> = report
        .api_keys
        .iter()
        .map(|(name, set)| vec![name.clone(), if *set { "set" } else { "not set" }.to_string()])
        .collect();
    print_table(&["API KEY", "STATE"], &rows);
    Ok(())
}
