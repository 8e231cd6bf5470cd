//! Availability checks for collaborator executables.
//!
//! A probe never fails: absence is an expected outcome that callers branch
//! on. Results are computed fresh every time; nothing is cached.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAvailability {
    pub tool: String,
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ToolAvailability {
    fn absent(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            present: false,
            path: None,
        }
    }

    /// Human-readable reason used in skip records.
    pub fn reason(&self) -> String {
        if self.present {
            format!("'{}' found", self.tool)
        } else {
            format!("'{}' not found on PATH or in tool_paths", self.tool)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolProbe {
    /// Explicit executable paths, consulted before the search path.
    explicit: BTreeMap<String, PathBuf>,
    /// Search path override; `None` means the process `PATH`.
    search_path: Option<OsString>,
}

impl ToolProbe {
    pub fn new(explicit: &BTreeMap<String, String>) -> Self {
        Self {
            explicit: explicit
                .iter()
                .map(|(k, v)| (k.clone(), PathBuf::from(v)))
                .collect(),
            search_path: None,
        }
    }

    /// Look tools up in `paths` instead of the process `PATH`.
    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.search_path = Some(paths.into());
        self
    }

    pub fn probe(&self, tool: &str) -> ToolAvailability {
        if let Some(path) = self.explicit.get(tool) {
            // A path with a separator is checked in place: it must be an
            // executable file.
            let present = which::which(path).is_ok();
            tracing::debug!(tool, path = %path.display(), present, "probed explicit path");
            return ToolAvailability {
                tool: tool.to_string(),
                present,
                path: present.then(|| path.clone()),
            };
        }

        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(tool, Some(paths), cwd)
            }
            None => which::which(tool),
        };

        match found {
            Ok(path) => {
                tracing::debug!(tool, path = %path.display(), "tool found");
                ToolAvailability {
                    tool: tool.to_string(),
                    present: true,
                    path: Some(path),
                }
            }
            Err(e) => {
                tracing::debug!(tool, error = %e, "tool not found");
                ToolAvailability::absent(tool)
            }
        }
    }

    pub fn probe_all<'a>(&self, tools: impl IntoIterator<Item = &'a str>) -> Vec<ToolAvailability> {
        tools.into_iter().map(|t| self.probe(t)).collect()
    }
}
