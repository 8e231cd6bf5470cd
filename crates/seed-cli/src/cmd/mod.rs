pub mod bootstrap;
pub mod ci;
pub mod history;
pub mod mine;
pub mod status;

use crate::output::print_json;
use anyhow::Context;
use seed_core::collaborator::CollaboratorOutput;
use seed_core::probe::ToolAvailability;
use seed_core::router::{CommandRouter, StepReport};
use seed_core::session::Session;
use seed_core::{Result, SeedError};
use serde::Serialize;
use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

/// Build the session for one invocation. `--timeout` overrides the
/// configured collaborator timeout; `0` disables it.
pub fn open_session(root: &Path, json: bool, timeout: Option<u64>) -> anyhow::Result<Session> {
    let mut session = Session::load(root)
        .with_context(|| format!("failed to load config under {}", root.display()))?
        .with_json(json);
    if let Some(secs) = timeout {
        session = session.with_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    Ok(session)
}

/// Route `args` through `router`. Single commands print their step report
/// in JSON mode; workflows and `help` print their own output.
pub fn dispatch(router: &CommandRouter, session: &Session, args: &[String]) -> anyhow::Result<()> {
    let name = args.first().map(String::as_str).unwrap_or(router.fallback());
    let report = router.dispatch(session, args)?;
    let prints_itself = router
        .find(name)
        .map(|c| c.steps().is_some() || c.name == "help")
        .unwrap_or(true);
    if session.json && !prints_itself {
        print_json(&report)?;
    }
    Ok(())
}

/// Human-readable progress line, suppressed in JSON mode.
pub(crate) fn say(session: &Session, message: impl Display) {
    if !session.json {
        println!("{message}");
    }
}

#[derive(Serialize)]
struct Skipped<'a> {
    status: &'static str,
    skipped: bool,
    tool: &'a str,
    reason: String,
}

/// Record that `tool` was absent and this step did nothing. Fails instead
/// when collaborators are strict.
pub(crate) fn record_skipped(
    session: &Session,
    category: &str,
    tool: &ToolAvailability,
) -> Result<StepReport> {
    let warning = session.unavailable(tool)?;
    let path = session.artifacts.write(
        category,
        &Skipped {
            status: "skipped",
            skipped: true,
            tool: &tool.tool,
            reason: warning.reason.clone(),
        },
    )?;
    say(session, format!("{category}: skipped, {}", warning.reason));
    Ok(StepReport::artifact(path).with_warning(warning))
}

#[derive(Serialize)]
struct FailedRun<'a> {
    status: &'static str,
    #[serde(flatten)]
    output: &'a CollaboratorOutput,
}

/// Record a failed collaborator run under `category` and return the error
/// the step should fail with.
pub(crate) fn record_failure(session: &Session, category: &str, output: &CollaboratorOutput) -> SeedError {
    let record = FailedRun {
        status: "failed",
        output,
    };
    match session.artifacts.write(category, &record) {
        Ok(path) => {
            tracing::warn!(category, path = %path.display(), "collaborator run failed");
            output.to_error()
        }
        Err(e) => e,
    }
}
