use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid category '{0}': must be lowercase alphanumeric with hyphens or underscores")]
    InvalidCategory(String),

    #[error("cannot serialize payload: {0}")]
    Serialization(String),

    #[error("collaborator '{0}' is not available")]
    CollaboratorUnavailable(String),

    #[error("collaborator '{tool}' failed ({}): {stderr}", exit_display(.exit_code))]
    CollaboratorFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("workflow '{workflow}' aborted at step {index} ({step}): {cause}")]
    WorkflowAborted {
        workflow: String,
        index: usize,
        step: String,
        cause: String,
        exit_code: i32,
    },

    #[error("{0}")]
    Failed(String),

    #[error("invalid config {path}: {source}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact {path}: {source}")]
    InvalidArtifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_display(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "terminated".to_string(),
    }
}

impl SeedError {
    /// Stable snake_case name recorded in artifacts and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            SeedError::UnknownCommand(_) => "unknown_command",
            SeedError::InvalidCategory(_) => "invalid_category",
            SeedError::Serialization(_) => "serialization_error",
            SeedError::CollaboratorUnavailable(_) => "collaborator_unavailable",
            SeedError::CollaboratorFailed { .. } => "collaborator_failed",
            SeedError::WorkflowAborted { .. } => "workflow_aborted",
            SeedError::Failed(_) => "failed",
            SeedError::InvalidConfig { .. } => "invalid_config",
            SeedError::InvalidArtifact { .. } => "invalid_artifact",
            SeedError::Io(_) => "io",
        }
    }

    /// Process exit status for this error. A failed collaborator's own
    /// non-zero code passes through verbatim; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            SeedError::CollaboratorFailed {
                exit_code: Some(code),
                ..
            } if *code != 0 => *code,
            SeedError::WorkflowAborted { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, SeedError>;
