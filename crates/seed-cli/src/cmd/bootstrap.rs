use super::{dispatch, open_session, record_failure, record_skipped, say};
use seed_core::collaborator::{self, CollaboratorOutput};
use seed_core::config::Config;
use seed_core::io;
use seed_core::paths;
use seed_core::probe::ToolAvailability;
use seed_core::router::{CommandRouter, StepReport, Warning};
use seed_core::session::Session;
use seed_core::{Result, SeedError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const INSTALL: &str = "install";
const CONFIGURE: &str = "configure";
const START: &str = "start";
const VERIFY: &str = "verify";

pub fn router() -> CommandRouter {
    CommandRouter::new("bootstrap", "all")
        .command("install", "Probe required tools and run install recipes", install)
        .command(
            "configure",
            "Write the default config and check provider keys",
            configure,
        )
        .command("start", "Start the engine", start)
        .command("verify", "Check tools, config and the engine version", verify)
        .workflow(
            "all",
            "install, configure, start, verify",
            &["install", "configure", "start", "verify"],
        )
        .with_help()
}

pub fn run(root: &Path, args: &[String], json: bool, timeout: Option<u64>) -> anyhow::Result<()> {
    let session = open_session(root, json, timeout)?;
    dispatch(&router(), &session, args)
}

/// `status` for a step that finished, given the warnings it raised.
fn completion(warnings: &[Warning]) -> &'static str {
    if warnings.is_empty() {
        "completed"
    } else {
        "completed_with_warnings"
    }
}

// ---------------------------------------------------------------------------
// install
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum InstallState {
    AlreadyPresent,
    Installed,
    /// The recipe ran but the tool is still not found.
    StillMissing,
    /// The recipe's own executable is absent.
    InstallerMissing,
    InstallFailed,
    Missing,
}

#[derive(Debug, Serialize)]
struct ToolInstall {
    tool: String,
    state: InstallState,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipe: Option<Vec<String>>,
}

#[derive(Serialize)]
struct InstallRecord<'a> {
    status: &'static str,
    tools: &'a [ToolInstall],
    collaborator_unavailable: Vec<&'a str>,
}

fn install(session: &Session, _args: &[String]) -> Result<StepReport> {
    let mut tools = Vec::new();
    let mut warnings = Vec::new();
    let mut failure = None;

    for tool in &session.config.bootstrap.tools {
        let found = session.probe.probe(tool);
        if found.present {
            tools.push(ToolInstall {
                tool: tool.clone(),
                state: InstallState::AlreadyPresent,
                path: found.path,
                recipe: None,
            });
            continue;
        }

        let Some(recipe) = session.config.bootstrap.install.get(tool) else {
            warnings.push(session.unavailable(&found)?);
            tools.push(ToolInstall {
                tool: tool.clone(),
                state: InstallState::Missing,
                path: None,
                recipe: None,
            });
            continue;
        };

        let (state, path) = match run_recipe(session, recipe)? {
            RecipeOutcome::InstallerMissing(installer) => {
                warnings.push(session.unavailable(&installer)?);
                warnings.push(session.unavailable(&found)?);
                (InstallState::InstallerMissing, None)
            }
            RecipeOutcome::Failed(output) => {
                failure = Some(output);
                (InstallState::InstallFailed, None)
            }
            RecipeOutcome::Ran => {
                let reprobed = session.probe.probe(tool);
                if reprobed.present {
                    (InstallState::Installed, reprobed.path)
                } else {
                    warnings.push(session.unavailable(&reprobed)?);
                    (InstallState::StillMissing, None)
                }
            }
        };
        tools.push(ToolInstall {
            tool: tool.clone(),
            state,
            path,
            recipe: Some(recipe.clone()),
        });
        if failure.is_some() {
            break;
        }
    }

    if let Some(output) = failure {
        // The failed run is recorded on its own; the partial tool table too.
        session.artifacts.write(
            INSTALL,
            &InstallRecord {
                status: "failed",
                tools: &tools,
                collaborator_unavailable: warnings.iter().map(|w| w.tool.as_str()).collect(),
            },
        )?;
        return Err(record_failure(session, INSTALL, &output));
    }

    let path = session.artifacts.write(
        INSTALL,
        &InstallRecord {
            status: completion(&warnings),
            tools: &tools,
            collaborator_unavailable: warnings.iter().map(|w| w.tool.as_str()).collect(),
        },
    )?;

    for t in &tools {
        say(session, format!("  {:<12} {:?}", t.tool, t.state));
    }
    say(session, format!("install: {}", path.display()));
    Ok(StepReport {
        artifacts: vec![path],
        warnings,
    })
}

enum RecipeOutcome {
    Ran,
    InstallerMissing(ToolAvailability),
    Failed(CollaboratorOutput),
}

/// Run an install recipe: `[program, args...]`, with `program` probed first.
fn run_recipe(session: &Session, recipe: &[String]) -> Result<RecipeOutcome> {
    let Some((program, args)) = recipe.split_first() else {
        return Err(SeedError::Failed("empty install recipe".to_string()));
    };
    let installer = session.probe.probe(program);
    if !installer.present {
        return Ok(RecipeOutcome::InstallerMissing(installer));
    }
    let output = collaborator::run(&installer, args, &session.root, session.timeout)?;
    if output.success {
        Ok(RecipeOutcome::Ran)
    } else {
        Ok(RecipeOutcome::Failed(output))
    }
}

// ---------------------------------------------------------------------------
// configure
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ConfigureRecord {
    status: &'static str,
    config_path: PathBuf,
    config_created: bool,
    /// Whether each provider key variable is set. Values are never read
    /// into the record.
    api_keys: BTreeMap<String, bool>,
}

/// Presence of each variable in `names`; empty values count as unset.
pub(crate) fn api_key_presence(names: &[String]) -> BTreeMap<String, bool> {
    names
        .iter()
        .map(|name| {
            let set = std::env::var_os(name).is_some_and(|v| !v.is_empty());
            (name.clone(), set)
        })
        .collect()
}

fn configure(session: &Session, _args: &[String]) -> Result<StepReport> {
    let config_path = paths::config_path(&session.root);
    let data = serde_json::to_string_pretty(&Config::default())
        .map_err(|e| SeedError::Serialization(e.to_string()))?;
    let created = io::write_if_missing(&config_path, data.as_bytes())?;
    io::ensure_dir(session.artifacts.dir())?;

    let api_keys = api_key_presence(&session.config.bootstrap.api_key_env);
    let path = session.artifacts.write(
        CONFIGURE,
        &ConfigureRecord {
            status: "completed",
            config_path: config_path.clone(),
            config_created: created,
            api_keys: api_keys.clone(),
        },
    )?;

    if created {
        say(session, format!("configure: wrote {}", config_path.display()));
    } else {
        say(session, format!("configure: kept existing {}", config_path.display()));
    }
    for (name, set) in &api_keys {
        say(session, format!("  {name}: {}", if *set { "set" } else { "not set" }));
    }
    say(session, format!("  record: {}", path.display()));
    Ok(StepReport::artifact(path))
}

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StartRecord<'a> {
    status: &'static str,
    tool: &'a str,
    args: &'a [String],
    exit_code: Option<i32>,
    duration_ms: u64,
    stdout_tail: &'a str,
}

fn start(session: &Session, _args: &[String]) -> Result<StepReport> {
    let engine = session.probe.probe(&session.config.engine.tool);
    if !engine.present {
        return record_skipped(session, START, &engine);
    }

    let args = &session.config.engine.start_args;
    let output = collaborator::run(&engine, args, &session.root, session.timeout)?;
    if !output.success {
        return Err(record_failure(session, START, &output));
    }
    let path = session.artifacts.write(
        START,
        &StartRecord {
            status: "completed",
            tool: &engine.tool,
            args,
            exit_code: output.exit_code,
            duration_ms: output.duration_ms,
            stdout_tail: &output.stdout,
        },
    )?;
    say(session, format!("start: {} {}", engine.tool, args.join(" ")));
    say(session, format!("  record: {}", path.display()));
    Ok(StepReport::artifact(path))
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ConfigCheck {
    path: PathBuf,
    present: bool,
}

#[derive(Serialize)]
struct VerifyRecord<'a> {
    status: &'static str,
    tools: &'a [ToolAvailability],
    config: ConfigCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine_version: Option<&'a str>,
    collaborator_unavailable: Vec<&'a str>,
}

/// Engine first, then every bootstrap tool not already listed.
pub(crate) fn verified_tools(config: &Config) -> Vec<&str> {
    let mut names = vec![config.engine.tool.as_str()];
    for tool in &config.bootstrap.tools {
        if !names.contains(&tool.as_str()) {
            names.push(tool);
        }
    }
    names
}

fn verify(session: &Session, _args: &[String]) -> Result<StepReport> {
    let tools = session.probe.probe_all(verified_tools(&session.config));
    let mut warnings = Vec::new();
    for t in tools.iter().filter(|t| !t.present) {
        warnings.push(session.unavailable(t)?);
    }

    let engine = &tools[0];
    let version = if engine.present {
        let output = collaborator::run(
            engine,
            &session.config.engine.verify_args,
            &session.root,
            session.timeout,
        )?;
        if !output.success {
            return Err(record_failure(session, VERIFY, &output));
        }
        Some(output.stdout)
    } else {
        None
    };

    let config_path = paths::config_path(&session.root);
    let config = ConfigCheck {
        present: config_path.is_file(),
        path: config_path,
    };
    let path = session.artifacts.write(
        VERIFY,
        &VerifyRecord {
            status: completion(&warnings),
            tools: &tools,
            config,
            engine_version: version.as_deref(),
            collaborator_unavailable: warnings.iter().map(|w| w.tool.as_str()).collect(),
        },
    )?;

    for t in &tools {
        let state = match &t.path {
            Some(p) => p.display().to_string(),
            None => "missing".to_string(),
        };
        say(session, format!("  {:<12} {state}", t.tool));
    }
    if let Some(v) = &version {
        say(session, format!("  engine version: {v}"));
    }
    say(session, format!("verify: {}", path.display()));
    Ok(StepReport {
        artifacts: vec![path],
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
