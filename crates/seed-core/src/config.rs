use crate::error::{Result, SeedError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// How to invoke the external engine collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_tool")]
    pub tool: String,
    #[serde(default = "default_improve_args")]
    pub improve_args: Vec<String>,
    #[serde(default = "default_benchmark_args")]
    pub benchmark_args: Vec<String>,
    #[serde(default = "default_start_args")]
    pub start_args: Vec<String>,
    #[serde(default = "default_verify_args")]
    pub verify_args: Vec<String>,
}

fn default_engine_tool() -> String {
    "one-engine".to_string()
}

fn default_improve_args() -> Vec<String> {
    vec!["improve".to_string()]
}

fn default_benchmark_args() -> Vec<String> {
    vec!["benchmark".to_string()]
}

fn default_start_args() -> Vec<String> {
    vec!["start".to_string(), "--port".to_string(), "5000".to_string()]
}

fn default_verify_args() -> Vec<String> {
    vec!["--version".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tool: default_engine_tool(),
            improve_args: default_improve_args(),
            benchmark_args: default_benchmark_args(),
            start_args: default_start_args(),
            verify_args: default_verify_args(),
        }
    }
}

// ---------------------------------------------------------------------------
// CiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiConfig {
    /// Timed runs per baseline/benchmark measurement.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_iterations() -> u32 {
    3
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
        }
    }
}

// ---------------------------------------------------------------------------
// MineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub regex: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_hits")]
    pub max_hits_per_pattern: usize,
    #[serde(default = "default_patterns")]
    pub patterns: Vec<PatternConfig>,
}

fn default_source_dir() -> String {
    ".".to_string()
}

fn default_extensions() -> Vec<String> {
    [
        "md", "sh", "js", "ts", "py", "rs", "txt", "json", "html", "toml", "yaml", "yml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_max_hits() -> usize {
    50
}

fn default_patterns() -> Vec<PatternConfig> {
    [
        ("error", r"(?i)\berror(s)?\b"),
        ("failure", r"(?i)\bfail(ed|ure|ures|s)?\b"),
        ("success", r"(?i)\b(success|succeeded|passed)\b"),
        ("todo", r"\b(TODO|FIXME|XXX)\b"),
        ("improvement", r"(?i)\bimprov(e|ed|es|ement|ements)\b"),
    ]
    .iter()
    .map(|(name, regex)| PatternConfig {
        name: name.to_string(),
        regex: regex.to_string(),
    })
    .collect()
}

impl Default for MineConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            extensions: default_extensions(),
            max_file_bytes: default_max_file_bytes(),
            max_hits_per_pattern: default_max_hits(),
            patterns: default_patterns(),
        }
    }
}

// ---------------------------------------------------------------------------
// BootstrapConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_bootstrap_tools")]
    pub tools: Vec<String>,
    /// Install recipe per tool: argv whose first element is the installer.
    #[serde(default)]
    pub install: BTreeMap<String, Vec<String>>,
    /// Provider key variables whose presence (never value) is recorded.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Vec<String>,
}

fn default_bootstrap_tools() -> Vec<String> {
    ["one-engine", "git", "node", "npm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_api_key_env() -> Vec<String> {
    ["OPENROUTER_API_KEY", "ANTHROPIC_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            tools: default_bootstrap_tools(),
            install: BTreeMap::new(),
            api_key_env: default_api_key_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
    /// No timeout when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborator_timeout_seconds: Option<u64>,
    /// Treat a missing collaborator as a hard failure instead of a skip.
    #[serde(default)]
    pub strict_collaborators: bool,
    /// Explicit executable paths, overriding the search path lookup.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_paths: BTreeMap<String, String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub ci: CiConfig,
    #[serde(default)]
    pub mine: MineConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

fn default_version() -> u32 {
    1
}

fn default_artifacts_dir() -> String {
    paths::DEFAULT_ARTIFACTS_DIR.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            artifacts_dir: default_artifacts_dir(),
            collaborator_timeout_seconds: None,
            strict_collaborators: false,
            tool_paths: BTreeMap::new(),
            engine: EngineConfig::default(),
            ci: CiConfig::default(),
            mine: MineConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Config {
    /// Load `.seed/config.json`. A missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        serde_json::from_str(&data).map_err(|source| SeedError::InvalidConfig { path, source })
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| SeedError::Serialization(e.to_string()))?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn collaborator_timeout(&self) -> Option<Duration> {
        match self.collaborator_timeout_seconds {
            None | Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.engine.tool, "one-engine");
        assert_eq!(cfg.ci.iterations, 3);
        assert!(cfg.collaborator_timeout().is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".seed")).unwrap();
        std::fs::write(
            dir.path().join(".seed/config.json"),
            r#"{"engine": {"tool": "my-engine"}, "collaborator_timeout_seconds": 30}"#,
        )
        .unwrap();

        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.engine.tool, "my-engine");
        assert_eq!(cfg.engine.improve_args, vec!["improve".to_string()]);
        assert_eq!(cfg.artifacts_dir, ".seed/artifacts");
        assert_eq!(cfg.collaborator_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.mine.patterns.len(), 5);
    }

    #[test]
    fn malformed_file_is_invalid_config() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".seed")).unwrap();
        std::fs::write(dir.path().join(".seed/config.json"), "{ not json").unwrap();

        let err = Config::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.tool_paths
            .insert("one-engine".to_string(), "/opt/engine/bin/one-engine".to_string());
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn zero_timeout_means_none() {
        let cfg = Config {
            collaborator_timeout_seconds: Some(0),
            ..Config::default()
        };
        assert!(cfg.collaborator_timeout().is_none());
    }
}
