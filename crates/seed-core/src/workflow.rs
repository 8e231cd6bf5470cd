//! Linear, non-branching command sequences.
//!
//! State machine:
//!
//! ```text
//! Pending ──▶ Running(0) ──▶ Running(1) ──▶ … ──▶ Completed
//!                 │               │
//!                 └───────────────┴──────▶ Aborted(i, cause)
//! ```
//!
//! A failed step ends the run; later steps are reported as `not_run`.
//! Artifacts written by earlier steps stay on disk. There is no resume: a
//! new run starts again from step 0.

use crate::error::{Result, SeedError};
use crate::paths::WORKFLOW_CATEGORY;
use crate::router::{CommandRouter, Warning};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Pending,
    Running {
        step: usize,
    },
    Completed,
    Aborted {
        step: usize,
        name: String,
        kind: String,
        cause: String,
        exit_code: i32,
    },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Aborted { .. })
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition(&self, next: &WorkflowState) -> bool {
        match (self, next) {
            (WorkflowState::Pending, WorkflowState::Running { step: 0 }) => true,
            (WorkflowState::Pending, WorkflowState::Completed) => true,
            (WorkflowState::Running { step: a }, WorkflowState::Running { step: b }) => *b == a + 1,
            (WorkflowState::Running { .. }, WorkflowState::Completed) => true,
            (WorkflowState::Running { step: a }, WorkflowState::Aborted { step: b, .. }) => a == b,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Step outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    NotRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub kind: String,
    pub message: String,
    pub exit_code: i32,
}

impl From<&SeedError> for StepError {
    fn from(e: &SeedError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: format!("{e:#}"),
            exit_code: e.exit_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

// ---------------------------------------------------------------------------
// WorkflowReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub program: String,
    pub workflow: String,
    pub outcome: String,
    pub state: WorkflowState,
    pub steps: Vec<StepOutcome>,
    /// Every warning raised by any step, in order.
    pub warnings: Vec<Warning>,
    /// The final `workflow` artifact.
    pub artifact: PathBuf,
}

impl WorkflowReport {
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }

    /// One-paragraph human summary.
    pub fn summary(&self) -> String {
        let mut out = format!("{} {}: {}", self.program, self.workflow, self.outcome.replace('_', " "));
        if let Some(failed) = self.failed_step() {
            if let Some(err) = &failed.error {
                out.push_str(&format!(
                    "\n  failed at step {} ({}): {}",
                    failed.index, failed.name, err.message
                ));
            }
        }
        for w in &self.warnings {
            out.push_str(&format!("\n  warning: {} ({})", w.reason, w.kind));
        }
        out.push_str(&format!("\n  record: {}", self.artifact.display()));
        out
    }
}

fn outcome_label(state: &WorkflowState, warnings: &[Warning]) -> &'static str {
    match state {
        WorkflowState::Aborted { .. } => "aborted",
        WorkflowState::Completed if !warnings.is_empty() => "completed_with_warnings",
        WorkflowState::Completed => "completed",
        WorkflowState::Pending | WorkflowState::Running { .. } => "incomplete",
    }
}

/// Payload of the final `workflow` artifact.
#[derive(Serialize)]
struct WorkflowRecord<'a> {
    program: &'a str,
    workflow: &'a str,
    steps: Vec<&'a str>,
    outcome: &'a str,
    state: &'a WorkflowState,
    step_outcomes: &'a [StepOutcome],
    collaborator_unavailable: Vec<&'a Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_step: Option<FailedStep<'a>>,
}

#[derive(Serialize)]
struct FailedStep<'a> {
    index: usize,
    name: &'a str,
    kind: &'a str,
    message: &'a str,
    exit_code: i32,
}

/// Unavailable-collaborator warnings, one per tool, in first-seen order.
fn unavailable_tools(warnings: &[Warning]) -> Vec<&Warning> {
    let mut seen = BTreeSet::new();
    warnings
        .iter()
        .filter(|w| w.kind == Warning::UNAVAILABLE && seen.insert(w.tool.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    steps: Vec<String>,
    state: WorkflowState,
}

impl Workflow {
    pub fn new(name: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            name: name.into(),
            steps,
            state: WorkflowState::Pending,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    fn transition(&mut self, next: WorkflowState) {
        debug_assert!(
            self.state.can_transition(&next),
            "illegal workflow transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(workflow = %self.name, from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    /// Run every step through `router`, then record the outcome.
    ///
    /// Step failures do not make this an `Err`; they end the run and are
    /// reported in the returned state. Only a failure to write the final
    /// record is an error.
    pub fn run(mut self, router: &CommandRouter, session: &Session) -> Result<WorkflowReport> {
        let total = self.steps.len();
        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(total);
        let mut warnings: Vec<Warning> = Vec::new();
        tracing::info!(program = router.program(), workflow = %self.name, total, "workflow started");

        for (index, name) in self.steps.clone().into_iter().enumerate() {
            self.transition(WorkflowState::Running { step: index });
            if !session.json {
                println!("==> [{}/{}] {} {}", index + 1, total, router.program(), name);
            }

            match router.invoke(&name, session, &[]) {
                Ok(report) => {
                    warnings.extend(report.warnings.iter().cloned());
                    outcomes.push(StepOutcome {
                        index,
                        name,
                        status: StepStatus::Succeeded,
                        artifacts: report.artifacts,
                        warnings: report.warnings,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(workflow = %self.name, step = %name, error = %e, "step failed");
                    let error = StepError::from(&e);
                    self.transition(WorkflowState::Aborted {
                        step: index,
                        name: name.clone(),
                        kind: error.kind.clone(),
                        cause: error.message.clone(),
                        exit_code: error.exit_code,
                    });
                    outcomes.push(StepOutcome {
                        index,
                        name,
                        status: StepStatus::Failed,
                        artifacts: Vec::new(),
                        warnings: Vec::new(),
                        error: Some(error),
                    });
                    break;
                }
            }
        }

        if !self.state.is_terminal() {
            self.transition(WorkflowState::Completed);
        }
        for (index, name) in self.steps.iter().enumerate().skip(outcomes.len()) {
            outcomes.push(StepOutcome {
                index,
                name: name.clone(),
                status: StepStatus::NotRun,
                artifacts: Vec::new(),
                warnings: Vec::new(),
                error: None,
            });
        }

        let outcome = outcome_label(&self.state, &warnings);
        let failed_step = outcomes
            .iter()
            .find(|s| s.status == StepStatus::Failed)
            .and_then(|s| {
                s.error.as_ref().map(|e| FailedStep {
                    index: s.index,
                    name: &s.name,
                    kind: &e.kind,
                    message: &e.message,
                    exit_code: e.exit_code,
                })
            });
        let record = WorkflowRecord {
            program: router.program(),
            workflow: &self.name,
            steps: self.steps.iter().map(|s| s.as_str()).collect(),
            outcome,
            state: &self.state,
            step_outcomes: &outcomes,
            collaborator_unavailable: unavailable_tools(&warnings),
            failed_step,
        };
        let artifact = session.artifacts.write(WORKFLOW_CATEGORY, &record)?;
        tracing::info!(workflow = %self.name, outcome, "workflow finished");

        Ok(WorkflowReport {
            program: router.program().to_string(),
            workflow: self.name,
            outcome: outcome.to_string(),
            state: self.state,
            steps: outcomes,
            warnings,
            artifact,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
