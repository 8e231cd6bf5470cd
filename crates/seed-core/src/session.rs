use crate::artifact::ArtifactWriter;
use crate::config::Config;
use crate::error::{Result, SeedError};
use crate::paths;
use crate::probe::{ToolAvailability, ToolProbe};
use crate::router::Warning;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a handler needs for one invocation. Built once in `main` and
/// passed down explicitly.
#[derive(Debug)]
pub struct Session {
    pub root: PathBuf,
    pub config: Config,
    pub artifacts: ArtifactWriter,
    pub probe: ToolProbe,
    /// Limit for each collaborator run; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub json: bool,
}

impl Session {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        let root = root.into();
        let artifacts = ArtifactWriter::new(paths::artifacts_dir(&root, &config.artifacts_dir));
        let probe = ToolProbe::new(&config.tool_paths);
        let timeout = config.collaborator_timeout();
        Self {
            root,
            config,
            artifacts,
            probe,
            timeout,
            json: false,
        }
    }

    /// Load `.seed/config.json` under `root` (defaults when absent).
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = Config::load(&root)?;
        Ok(Self::new(root, config))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_probe(mut self, probe: ToolProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactWriter) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Classify an absent collaborator: a warning normally, a hard
    /// `CollaboratorUnavailable` when `strict_collaborators` is set.
    pub fn unavailable(&self, tool: &ToolAvailability) -> Result<Warning> {
        tracing::warn!(tool = %tool.tool, "collaborator unavailable");
        if self.config.strict_collaborators {
            return Err(SeedError::CollaboratorUnavailable(tool.tool.clone()));
        }
        Ok(Warning::unavailable(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn session_uses_config_paths() {
        let dir = TempDir::new().unwrap();
        let session = Session::load(dir.path()).unwrap();
        assert_eq!(session.artifacts.dir(), dir.path().join(".seed/artifacts"));
        assert!(session.timeout.is_none());
        assert!(!session.json);
    }

    #[test]
    fn unavailable_is_warning_unless_strict() {
        let dir = TempDir::new().unwrap();
        let missing = ToolAvailability {
            tool: "one-engine".to_string(),
            present: false,
            path: None,
        };

        let lenient = Session::new(dir.path(), Config::default());
        let warning = lenient.unavailable(&missing).unwrap();
        assert_eq!(warning.tool, "one-engine");

        let strict = Session::new(
            dir.path(),
            Config {
                strict_collaborators: true,
                ..Config::default()
            },
        );
        let err = strict.unavailable(&missing).unwrap_err();
        assert_eq!(err.kind(), "collaborator_unavailable");
    }
}
